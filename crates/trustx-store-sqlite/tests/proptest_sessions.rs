// crates/trustx-store-sqlite/tests/proptest_sessions.rs
// ============================================================================
// Module: SQLite Session Property-Based Tests
// Description: Property tests for append ordering and aggregated statistics.
// Purpose: Ensure append order never leaks into reads and SQL counts agree.
// ============================================================================

//! Property-based tests for session ordering and verdict statistics.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use proptest::prelude::*;
use tempfile::TempDir;
use trustx_core::AggregationEngine;
use trustx_core::AggregationPolicy;
use trustx_core::Fingerprint;
use trustx_core::InputKind;
use trustx_core::RequestId;
use trustx_core::SessionId;
use trustx_core::SessionStore;
use trustx_core::Signal;
use trustx_core::SignalSource;
use trustx_core::Timestamp;
use trustx_core::Verdict;
use trustx_core::VerdictContext;
use trustx_core::VerdictStatsBuilder;
use trustx_store_sqlite::SqliteStore;
use trustx_store_sqlite::SqliteStoreConfig;

const INDICATORS: [&str; 4] = ["guarantee language", "unrealistic returns", "urgency language", "url shortener"];
const KINDS: [InputKind; 3] = [InputKind::Text, InputKind::Url, InputKind::Announcement];

fn sample_verdict(index: usize, score: Option<f64>, kind: InputKind, indicators: &[usize]) -> Verdict {
    let engine = AggregationEngine::new(AggregationPolicy::default()).unwrap();
    let signals: Vec<Signal> = score
        .map(|score| {
            let indicators = indicators.iter().map(|slot| INDICATORS[*slot].to_string()).collect();
            vec![Signal::ok(SignalSource::TextPattern, score, indicators, 1).unwrap()]
        })
        .unwrap_or_default();
    engine.aggregate(
        VerdictContext {
            request_id: RequestId::new(format!("req-{index}")),
            input_fingerprint: Fingerprint::new(format!("fp-{index}")),
            input_kind: kind,
            created_at: Timestamp::from_unix_millis(0),
        },
        &signals,
    )
}

fn verdict_strategy() -> impl Strategy<Value = (Option<f64>, InputKind, Vec<usize>)> {
    (
        prop::option::weighted(0.9, 0.0f64 ..= 1.0),
        prop::sample::select(KINDS.to_vec()),
        prop::collection::vec(0 .. INDICATORS.len(), 0 .. 4),
    )
}

fn open(dir: &TempDir) -> SqliteStore {
    SqliteStore::open(SqliteStoreConfig::new(dir.path().join("trustx.db"))).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn appends_in_any_order_read_back_by_sequence(order in Just((0 .. 8).collect::<Vec<usize>>()).prop_shuffle()) {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        let session = SessionId::new("s-prop");
        store.ensure_session(&session, Timestamp::from_unix_millis(0)).unwrap();
        let sequences: Vec<u64> = order.iter().map(|_| store.reserve_sequence(&session).unwrap()).collect();
        for slot in &order {
            let verdict = sample_verdict(*slot, Some(0.5), InputKind::Text, &[]);
            store.append(&session, sequences[*slot], &verdict).unwrap();
        }
        let read: Vec<String> = store
            .session_verdicts(&session)
            .unwrap()
            .unwrap()
            .iter()
            .map(|verdict| verdict.request_id.as_str().to_string())
            .collect();
        let expected: Vec<String> = (0 .. order.len()).map(|slot| format!("req-{slot}")).collect();
        prop_assert_eq!(read, expected);
    }

    #[test]
    fn sql_statistics_match_per_verdict_counting(samples in prop::collection::vec(verdict_strategy(), 0 .. 12)) {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        let session = SessionId::new("s-stats");
        store.ensure_session(&session, Timestamp::from_unix_millis(0)).unwrap();
        let mut builder = VerdictStatsBuilder::new();
        for (index, (score, kind, indicators)) in samples.iter().enumerate() {
            let verdict = sample_verdict(index, *score, *kind, indicators);
            let sequence = store.reserve_sequence(&session).unwrap();
            store.append(&session, sequence, &verdict).unwrap();
            builder.record(&verdict);
        }
        prop_assert_eq!(SessionStore::stats(&store).unwrap(), builder.finish());
    }
}
