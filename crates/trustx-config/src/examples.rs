// crates/trustx-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic example for docs and the CLI.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example `trustx.toml`. Every section is present with its default
//! values except where a production deployment would differ (durable store,
//! audit file).

/// Returns a canonical example `trustx.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[server]
bind = "127.0.0.1:5000"
max_body_bytes = 12582912
request_deadline_ms = 10000

[aggregation.weights]
TEXT_PATTERN = 0.30
URL_REPUTATION = 0.20
REGISTRY = 0.20
IMAGE_QR = 0.10
ANNOUNCEMENT_NLP = 0.20

[aggregation.thresholds]
medium = 0.4
high = 0.7

[aggregation.recommendations.by_indicator]
"guarantee language" = ["No legitimate investment can guarantee returns"]

[adapters.http]
allow_http = false
timeout_ms = 5000
max_response_bytes = 1048576
user_agent = "trustx/0.1"

[adapters.text]
enabled = true
timeout_ms = 5000
extra_phrases = ["multibagger tip"]

[adapters.url]
enabled = true
timeout_ms = 5000
fetch_page = false
suspicious_tlds = ["tk", "ml", "ga", "cf", "click", "download"]
max_domain_len = 30

[adapters.registry]
enabled = true
timeout_ms = 5000
source = "static"
cache_ttl_ms = 86400000
include_sample = true
alert_list = ["Quick Rich Advisors"]

[[adapters.registry.advisors]]
name = "Prudent Capital Advisors"
registration_id = "INA000009012"
status = "ACTIVE"
registered_on = "2018-03-01"
location = "Pune"

[adapters.image_qr]
enabled = true
timeout_ms = 5000
# oracle_endpoint = "https://oracle.example.com/score"

[adapters.announcement]
enabled = true
timeout_ms = 5000

[ledger]
mode = "simulated"
confirmations_required = 1
poll_interval_ms = 1000
outbox_capacity = 1024
# mode = "http"
# endpoint = "https://ledger.example.com/"
# timeout_ms = 5000

[ledger.retry]
max_attempts = 3
backoff_base_ms = 2000
confirmation_timeout_ms = 60000

[store]
type = "sqlite"
path = "trustx.db"
journal_mode = "wal"
sync_mode = "full"
busy_timeout_ms = 5000

[audit]
enabled = true
path = "trustx-audit.jsonl"
"#,
    )
}
