// crates/trustx-cli/src/main.rs
// ============================================================================
// Module: TrustX CLI Entry Point
// Description: Command dispatcher for the TrustX server and offline tooling.
// Purpose: Run the API, validate configuration, analyze inputs, and inspect the ledger store.
// Dependencies: clap, trustx-server, trustx-config, trustx-adapters, serde, thiserror, tokio.
// ============================================================================

//! ## Overview
//! The `trustx` binary starts the HTTP API from `trustx.toml`, validates
//! configuration files, runs a one-shot offline analysis through the same
//! adapters and aggregation engine the server uses, and lists ledger records
//! that exhausted their retries in a `SQLite` store. Inputs are untrusted:
//! file reads are size-bounded and normalization rejects malformed input.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use serde::Serialize;
use thiserror::Error;
use trustx_adapters::SignalFanout;
use trustx_config::TrustxConfig;
use trustx_config::config_toml_example;
use trustx_core::AggregationEngine;
use trustx_core::AnalysisInput;
use trustx_core::LedgerRecord;
use trustx_core::LedgerStatus;
use trustx_core::LedgerStore;
use trustx_core::MAX_MEDIA_BYTES;
use trustx_core::MAX_TEXT_CHARS;
use trustx_core::RequestId;
use trustx_core::RiskLevel;
use trustx_core::Verdict;
use trustx_core::VerdictContext;
use trustx_ledger::system_now;
use trustx_server::TrustxServer;
use trustx_server::build_adapter_registry;
use trustx_store_sqlite::SqliteStore;
use trustx_store_sqlite::SqliteStoreConfig;
use uuid::Uuid;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a text file passed to `analyze`.
const MAX_TEXT_FILE_BYTES: usize = MAX_TEXT_CHARS * 4;
/// Default number of records listed by `ledger failed`.
const DEFAULT_FAILED_LIMIT: usize = 100;
/// Exit code returned by `analyze --fail-on-high` for high-risk verdicts.
const HIGH_RISK_EXIT: u8 = 2;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "trustx", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the TrustX HTTP API.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Analyze one input offline and print the verdict.
    Analyze(AnalyzeCommand),
    /// Ledger store inspection.
    Ledger {
        /// Selected ledger subcommand.
        #[command(subcommand)]
        command: LedgerCommand,
    },
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to trustx.toml or `TRUSTX_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a config file.
    Validate(ConfigValidateCommand),
    /// Print an example config file.
    Example,
}

/// Arguments for config validation.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to trustx.toml or `TRUSTX_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Input kinds accepted by `analyze`.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum InputKindArg {
    /// Free text.
    Text,
    /// URL.
    Url,
    /// Image file.
    Image,
    /// QR code image file.
    Qr,
    /// Advisor identity.
    Advisor,
    /// Corporate announcement.
    Announcement,
}

/// Output formats for structured CLI commands.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Canonical JSON output.
    Json,
    /// Human-readable text output.
    Text,
}

/// Arguments for `analyze`.
#[derive(Args, Debug)]
struct AnalyzeCommand {
    /// Input kind.
    #[arg(long = "type", value_enum, value_name = "KIND")]
    kind: InputKindArg,
    /// Inline content: text, URL, or announcement body.
    #[arg(long, value_name = "TEXT")]
    content: Option<String>,
    /// File holding the content (text kinds) or image bytes (image kinds).
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,
    /// Advisor name.
    #[arg(long, value_name = "NAME")]
    name: Option<String>,
    /// Advisor registration identifier.
    #[arg(long = "registration-id", value_name = "ID")]
    registration_id: Option<String>,
    /// Company name for announcements.
    #[arg(long, value_name = "NAME")]
    company: Option<String>,
    /// Optional config file; built-in defaults are used when omitted.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Output format.
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,
    /// Exit with status 2 when the verdict is HIGH.
    #[arg(long)]
    fail_on_high: bool,
}

/// Ledger subcommands.
#[derive(Subcommand, Debug)]
enum LedgerCommand {
    /// List records that exhausted their retries.
    Failed(LedgerFailedCommand),
}

/// Store location inputs for `SQLite`-backed ledger inspection.
#[derive(Args, Debug, Clone)]
struct StoreLocationArgs {
    /// Optional config file path (defaults to trustx.toml or `TRUSTX_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Optional direct `SQLite` store path (overrides config).
    #[arg(long = "store-path", value_name = "PATH")]
    store_path: Option<PathBuf>,
}

/// Arguments for `ledger failed`.
#[derive(Args, Debug)]
struct LedgerFailedCommand {
    /// Store location settings.
    #[command(flatten)]
    location: StoreLocationArgs,
    /// Maximum records to list.
    #[arg(long, default_value_t = DEFAULT_FAILED_LIMIT)]
    limit: usize,
    /// Output format.
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error carrying a user-facing message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Errors raised by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Config {
            command,
        } => command_config(command),
        Commands::Analyze(command) => command_analyze(command).await,
        Commands::Ledger {
            command,
        } => command_ledger(command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = TrustxConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let bind = config.server.bind.clone();
    let server = tokio::task::spawn_blocking(move || TrustxServer::from_config(config))
        .await
        .map_err(|err| CliError::new(format!("server init failed: init join failed: {err}")))?
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    write_stderr_line(&format!("trustx listening on {bind}"))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    server.serve().await.map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(&command),
        ConfigCommand::Example => {
            write_stdout_line(config_toml_example().trim_end())
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let _config = TrustxConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    write_stdout_line("config valid").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Analyze Command
// ============================================================================

/// Executes a one-shot offline analysis.
async fn command_analyze(command: AnalyzeCommand) -> CliResult<ExitCode> {
    let config = match command.config.as_deref() {
        Some(path) => TrustxConfig::load(Some(path))
            .map_err(|err| CliError::new(format!("failed to load config: {err}")))?,
        None => TrustxConfig::default(),
    };
    let input = build_input(&command)?
        .normalize()
        .map_err(|err| CliError::new(format!("invalid input: {err}")))?;
    let fingerprint =
        input.fingerprint().map_err(|err| CliError::new(format!("fingerprint failed: {err}")))?;
    let engine = AggregationEngine::new(config.aggregation.clone())
        .map_err(|err| CliError::new(format!("invalid aggregation policy: {err}")))?;
    let deadline = config.server.request_deadline();
    let adapters = config.adapters;
    let registry = tokio::task::spawn_blocking(move || build_adapter_registry(&adapters))
        .await
        .map_err(|err| CliError::new(format!("adapter init failed: init join failed: {err}")))?
        .map_err(|err| CliError::new(format!("adapter init failed: {err}")))?;
    let fanout = SignalFanout::new(Arc::new(registry), deadline);

    let input_kind = input.kind();
    let signals = fanout.collect(Arc::new(input)).await;
    let context = VerdictContext {
        request_id: RequestId::new(Uuid::new_v4().to_string()),
        input_fingerprint: fingerprint,
        input_kind,
        created_at: system_now(),
    };
    let verdict = engine.aggregate(context, &signals);
    emit_structured_output(&verdict, command.format, render_verdict_text(&verdict))?;
    if command.fail_on_high && verdict.risk_level == RiskLevel::High {
        return Ok(ExitCode::from(HIGH_RISK_EXIT));
    }
    Ok(ExitCode::SUCCESS)
}

/// Builds the raw analysis input from `analyze` arguments.
fn build_input(command: &AnalyzeCommand) -> CliResult<AnalysisInput> {
    match command.kind {
        InputKindArg::Text => Ok(AnalysisInput::Text {
            content: text_argument(command)?,
        }),
        InputKindArg::Url => {
            let url = command
                .content
                .clone()
                .ok_or_else(|| CliError::new("--content is required for url input".to_string()))?;
            Ok(AnalysisInput::Url {
                url,
            })
        }
        InputKindArg::Image | InputKindArg::Qr => {
            let path = command.file.as_deref().ok_or_else(|| {
                CliError::new("--file is required for image and qr input".to_string())
            })?;
            let data = read_file(path, MAX_MEDIA_BYTES)?;
            let content_type = content_type_for(path);
            if command.kind == InputKindArg::Qr {
                Ok(AnalysisInput::Qr {
                    data,
                    content_type,
                })
            } else {
                Ok(AnalysisInput::Image {
                    data,
                    content_type,
                })
            }
        }
        InputKindArg::Advisor => {
            let name = command
                .name
                .clone()
                .ok_or_else(|| CliError::new("--name is required for advisor input".to_string()))?;
            Ok(AnalysisInput::Advisor {
                name,
                registration_id: command.registration_id.clone(),
            })
        }
        InputKindArg::Announcement => Ok(AnalysisInput::Announcement {
            company: command.company.clone().unwrap_or_default(),
            text: text_argument(command)?,
        }),
    }
}

/// Returns inline content or the UTF-8 contents of `--file`.
fn text_argument(command: &AnalyzeCommand) -> CliResult<String> {
    if let Some(content) = &command.content {
        return Ok(content.clone());
    }
    let Some(path) = command.file.as_deref() else {
        return Err(CliError::new("--content or --file is required".to_string()));
    };
    let bytes = read_file(path, MAX_TEXT_FILE_BYTES)?;
    String::from_utf8(bytes)
        .map_err(|_| CliError::new(format!("{} is not valid utf-8", path.display())))
}

/// Guesses an image content type from the file extension.
fn content_type_for(path: &Path) -> Option<String> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let content_type = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(content_type.to_string())
}

/// Renders a verdict summary for text output.
fn render_verdict_text(verdict: &Verdict) -> String {
    let mut lines = vec![
        format!("request_id: {}", verdict.request_id.as_str()),
        format!("input_kind: {}", verdict.input_kind.as_str()),
        format!("risk_level: {}", verdict.risk_level.as_str()),
        format!("risk_score: {:.3}", verdict.risk_score),
        format!("degraded: {}", verdict.degraded),
    ];
    if !verdict.indicators.is_empty() {
        lines.push("indicators:".to_string());
        lines.extend(verdict.indicators.iter().map(|indicator| format!("  - {indicator}")));
    }
    if !verdict.recommendations.is_empty() {
        lines.push("recommendations:".to_string());
        lines.extend(verdict.recommendations.iter().map(|item| format!("  - {item}")));
    }
    for unusable in &verdict.unusable_signals {
        lines.push(format!(
            "unusable: {} {}",
            unusable.source.as_str(),
            unusable.status.as_str()
        ));
    }
    lines.join("\n")
}

// ============================================================================
// SECTION: Ledger Commands
// ============================================================================

/// Dispatches ledger subcommands.
fn command_ledger(command: LedgerCommand) -> CliResult<ExitCode> {
    match command {
        LedgerCommand::Failed(command) => command_ledger_failed(&command),
    }
}

/// Output for `ledger failed`.
#[derive(Serialize)]
struct LedgerFailedOutput {
    /// Number of records listed.
    count: usize,
    /// Records that exhausted their retries.
    records: Vec<LedgerRecord>,
}

/// Executes `ledger failed`.
fn command_ledger_failed(command: &LedgerFailedCommand) -> CliResult<ExitCode> {
    let store = open_sqlite_store(&command.location)?;
    let records = store
        .list_by_status(LedgerStatus::FailedAfterRetries, command.limit)
        .map_err(|err| CliError::new(format!("ledger listing failed: {err}")))?;
    let output = LedgerFailedOutput {
        count: records.len(),
        records,
    };
    let text = render_ledger_failed_text(&output);
    emit_structured_output(&output, command.format, text)?;
    Ok(ExitCode::SUCCESS)
}

/// Resolves the `SQLite` store configuration from a direct path or config.
fn resolve_sqlite_store_config(location: &StoreLocationArgs) -> CliResult<SqliteStoreConfig> {
    if let Some(store_path) = &location.store_path {
        return Ok(SqliteStoreConfig::new(store_path.clone()));
    }
    let config = TrustxConfig::load(location.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    config
        .store
        .sqlite_config()
        .ok_or_else(|| CliError::new("configured store is not sqlite".to_string()))
}

/// Opens the `SQLite` store for ledger inspection.
fn open_sqlite_store(location: &StoreLocationArgs) -> CliResult<SqliteStore> {
    let config = resolve_sqlite_store_config(location)?;
    SqliteStore::open(config).map_err(|err| CliError::new(format!("failed to open store: {err}")))
}

/// Renders `ledger failed` output as text.
fn render_ledger_failed_text(output: &LedgerFailedOutput) -> String {
    if output.records.is_empty() {
        return "no failed ledger records".to_string();
    }
    output
        .records
        .iter()
        .map(|record| {
            format!(
                "{} request={} attempts={} error={}",
                record.idempotency_key.as_str(),
                record.request_id.as_str(),
                record.attempts,
                record.last_error.as_deref().unwrap_or("-")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Reads a file with a size limit and maps failures to CLI errors.
fn read_file(path: &Path, max_bytes: usize) -> CliResult<Vec<u8>> {
    read_bytes_with_limit(path, max_bytes).map_err(|err| match err {
        ReadLimitError::Io(err) => {
            CliError::new(format!("failed to read {}: {err}", path.display()))
        }
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(format!(
            "{} is too large ({size} bytes, limit {limit})",
            path.display()
        )),
    })
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Emits structured output as canonical JSON or text.
fn emit_structured_output<T: Serialize>(
    value: &T,
    format: OutputFormat,
    text: String,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let mut bytes = serde_jcs::to_vec(value)
                .map_err(|err| CliError::new(format!("failed to encode output: {err}")))?;
            bytes.push(b'\n');
            let mut stdout = std::io::stdout();
            stdout.write_all(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))
        }
        OutputFormat::Text => {
            write_stdout_line(&text).map_err(|err| CliError::new(output_error("stdout", &err)))
        }
    }
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
