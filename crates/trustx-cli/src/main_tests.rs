// crates/trustx-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing, input building, and bounded reads.
// Purpose: Ensure CLI inputs fail closed and offline output renders predictably.
// Dependencies: trustx-cli main helpers
// ============================================================================

//! ## Overview
//! Validates argument parsing, `analyze` input construction, size-limited
//! reads, and store resolution for `ledger failed`.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use clap::Parser;
use trustx_core::AggregationEngine;
use trustx_core::AggregationPolicy;
use trustx_core::AnalysisInput;
use trustx_core::Fingerprint;
use trustx_core::InputKind;
use trustx_core::LedgerStatus;
use trustx_core::LedgerStore;
use trustx_core::RequestId;
use trustx_core::Timestamp;
use trustx_core::VerdictContext;

use super::AnalyzeCommand;
use super::Cli;
use super::Commands;
use super::InputKindArg;
use super::LedgerFailedOutput;
use super::OutputFormat;
use super::ReadLimitError;
use super::StoreLocationArgs;
use super::build_input;
use super::content_type_for;
use super::open_sqlite_store;
use super::read_bytes_with_limit;
use super::render_ledger_failed_text;
use super::render_verdict_text;
use super::resolve_sqlite_store_config;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn analyze_command(kind: InputKindArg) -> AnalyzeCommand {
    AnalyzeCommand {
        kind,
        content: None,
        file: None,
        name: None,
        registration_id: None,
        company: None,
        config: None,
        format: OutputFormat::Json,
        fail_on_high: false,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn analyze_arguments_parse() {
    let cli = Cli::try_parse_from([
        "trustx",
        "analyze",
        "--type",
        "advisor",
        "--name",
        "Wealth Advisory Services",
        "--registration-id",
        "ina000005678",
        "--format",
        "text",
        "--fail-on-high",
    ])
    .unwrap();
    let Commands::Analyze(command) = cli.command else {
        panic!("expected analyze command");
    };
    assert_eq!(command.kind, InputKindArg::Advisor);
    assert_eq!(command.format, OutputFormat::Text);
    assert!(command.fail_on_high);
    assert_eq!(command.registration_id.as_deref(), Some("ina000005678"));
}

#[test]
fn unknown_input_kind_is_rejected_by_parser() {
    assert!(Cli::try_parse_from(["trustx", "analyze", "--type", "fax"]).is_err());
}

#[test]
fn text_input_requires_content_or_file() {
    let err = build_input(&analyze_command(InputKindArg::Text)).unwrap_err();
    assert!(err.to_string().contains("--content or --file"));

    let mut command = analyze_command(InputKindArg::Text);
    command.content = Some("hello".to_string());
    assert!(matches!(build_input(&command).unwrap(), AnalysisInput::Text { content } if content == "hello"));
}

#[test]
fn text_input_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("message.txt");
    fs::write(&path, "send money now").unwrap();
    let mut command = analyze_command(InputKindArg::Announcement);
    command.file = Some(path);
    command.company = Some("Acme".to_string());
    let input = build_input(&command).unwrap();
    assert!(matches!(
        input,
        AnalysisInput::Announcement { company, text } if company == "Acme" && text == "send money now"
    ));
}

#[test]
fn media_and_advisor_inputs_require_their_fields() {
    let err = build_input(&analyze_command(InputKindArg::Qr)).unwrap_err();
    assert!(err.to_string().contains("--file"));
    let err = build_input(&analyze_command(InputKindArg::Advisor)).unwrap_err();
    assert!(err.to_string().contains("--name"));
    let err = build_input(&analyze_command(InputKindArg::Url)).unwrap_err();
    assert!(err.to_string().contains("--content"));
}

#[test]
fn qr_input_carries_content_type() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("code.PNG");
    fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();
    let mut command = analyze_command(InputKindArg::Qr);
    command.file = Some(path);
    let input = build_input(&command).unwrap();
    assert!(matches!(
        input,
        AnalysisInput::Qr { data, content_type } if data.len() == 4 && content_type.as_deref() == Some("image/png")
    ));
    assert_eq!(content_type_for(Path::new("scan.bmp")), None);
}

#[test]
fn read_bytes_with_limit_rejects_oversized_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.bin");
    fs::write(&path, vec![0_u8; 32]).unwrap();
    let result = read_bytes_with_limit(&path, 16);
    assert!(matches!(result, Err(ReadLimitError::TooLarge { size: 32, limit: 16 })));
    assert_eq!(read_bytes_with_limit(&path, 32).unwrap().len(), 32);
    let missing = read_bytes_with_limit(&dir.path().join("missing.bin"), 16);
    assert!(matches!(missing, Err(ReadLimitError::Io(_))));
}

#[test]
fn verdict_text_lists_level_and_unusable_signals() {
    let engine = AggregationEngine::new(AggregationPolicy::default()).unwrap();
    let verdict = engine.aggregate(
        VerdictContext {
            request_id: RequestId::new("req-1"),
            input_fingerprint: Fingerprint::new("fp"),
            input_kind: InputKind::Text,
            created_at: Timestamp::from_unix_millis(0),
        },
        &[],
    );
    let text = render_verdict_text(&verdict);
    assert!(text.contains("request_id: req-1"));
    assert!(text.contains("risk_level: LOW"));
    assert!(text.contains("degraded: true"));
}

#[test]
fn store_path_overrides_config() {
    let location = StoreLocationArgs {
        config: Some("does-not-exist.toml".into()),
        store_path: Some("ledger.db".into()),
    };
    let config = resolve_sqlite_store_config(&location).unwrap();
    assert_eq!(config.path, Path::new("ledger.db"));
}

#[test]
fn failed_listing_on_empty_store_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let location = StoreLocationArgs {
        config: None,
        store_path: Some(dir.path().join("trustx.db")),
    };
    let store = open_sqlite_store(&location).unwrap();
    let records = store.list_by_status(LedgerStatus::FailedAfterRetries, 10).unwrap();
    let output = LedgerFailedOutput {
        count: records.len(),
        records,
    };
    assert_eq!(output.count, 0);
    assert_eq!(render_ledger_failed_text(&output), "no failed ledger records");
}
