//! Command-line runner for settlekit interactions.
//!
//! Loads an HTML fixture into an in-memory document and either fills a single
//! element or replays a JSON script of actions against it.
//!
//! # Usage
//!
//! ```bash
//! # Fill an input by selector and print its snapshot
//! settlekit fill page.html "#email" "ada@example.com"
//!
//! # Fill the control labelled "Name"
//! settlekit fill page.html "Name" "Ada" --label
//!
//! # Replay a script, failing fast on the first error
//! settlekit run page.html script.json
//!
//! # Machine-readable output with a settle timeout
//! settlekit --format json --settle-timeout 2000 run page.html script.json
//! ```
//!
//! Exit codes: `0` success, `1` an action failed, `2` bad input (unreadable
//! fixture or script, invalid config).

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use settlekit_core::action::{ActionLog, ActionResult, ActionType};
use settlekit_core::config::SettlekitConfig;
use settlekit_core::document::Document;
use settlekit_core::element::ElementSnapshot;
use settlekit_core::executor::{ActionExecutor, ExecutionResult};
use settlekit_core::hooks::HookRegistry;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Run settled-aware form interactions against HTML fixtures.
#[derive(Parser)]
#[command(name = "settlekit")]
#[command(about = "Fill form controls in HTML fixtures and wait for the page to settle")]
#[command(version)]
struct Cli {
    /// Output format: text or json
    #[arg(short, long, default_value = "text", global = true)]
    format: OutputFormat,

    /// Config file (defaults to ~/.settlekit/config.json)
    #[arg(short, long, global = true, env = "SETTLEKIT_CONFIG")]
    config: Option<PathBuf>,

    /// Give up waiting for the page to settle after this many milliseconds
    #[arg(long, global = true, env = "SETTLEKIT_SETTLE_TIMEOUT")]
    settle_timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Fill text into one element and print its snapshot
    Fill {
        /// HTML fixture to load
        fixture: PathBuf,
        /// CSS selector (or label text with --label)
        selector: String,
        /// Text to fill
        text: String,
        /// Find the element by its <label> text instead of a selector
        #[arg(short, long)]
        label: bool,
    },

    /// Run a JSON script of actions
    Run {
        /// HTML fixture to load
        fixture: PathBuf,
        /// JSON array of actions
        script: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

#[derive(Debug)]
enum CliError {
    Input(String),
    ActionFailed(String),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::ActionFailed(_) => ExitCode::from(1),
            CliError::Input(_) => ExitCode::from(2),
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Input(msg) => write!(f, "Input error: {}", msg),
            CliError::ActionFailed(msg) => write!(f, "Action failed: {}", msg),
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = match &cli.config {
        Some(path) => SettlekitConfig::load_from(path).map_err(|e| CliError::Input(e.to_string()))?,
        None => SettlekitConfig::load(),
    };
    if let Some(ms) = cli.settle_timeout {
        config.settle.timeout_ms = Some(ms);
    }
    debug!(settle = ?config.settle, "configuration loaded");

    match &cli.command {
        Command::Fill {
            fixture,
            selector,
            text,
            label,
        } => {
            let executor = load_executor(fixture, &config)?;
            let result = executor
                .execute(ActionType::FillText {
                    selector: selector.clone(),
                    text: Some(text.clone()),
                    by_label: *label,
                })
                .await;
            print_fill_result(&result, cli.format)?;
            if result.success {
                Ok(())
            } else {
                Err(CliError::ActionFailed(result.message))
            }
        }

        Command::Run { fixture, script } => {
            let executor = load_executor(fixture, &config)?;
            let actions = load_script(script)?;
            let logs = executor.run_script(actions).await;
            print_logs(&logs, cli.format)?;
            match logs.last().map(|log| &log.result) {
                Some(ActionResult::Failure(message)) => Err(CliError::ActionFailed(message.clone())),
                _ => Ok(()),
            }
        }
    }
}

fn load_executor(fixture: &Path, config: &SettlekitConfig) -> Result<ActionExecutor, CliError> {
    let html = std::fs::read_to_string(fixture)
        .map_err(|e| CliError::Input(format!("Failed to read fixture {}: {}", fixture.display(), e)))?;
    let document = Document::from_html(&html);
    Ok(ActionExecutor::new(
        document,
        Arc::new(HookRegistry::with_logging()),
        config.settle,
    ))
}

fn load_script(path: &Path) -> Result<Vec<ActionType>, CliError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| CliError::Input(format!("Failed to read script {}: {}", path.display(), e)))?;
    serde_json::from_str(&contents)
        .map_err(|e| CliError::Input(format!("Failed to parse script {}: {}", path.display(), e)))
}

fn to_json(value: &serde_json::Value) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::ActionFailed(format!("JSON serialization error: {}", e)))
}

fn print_fill_result(result: &ExecutionResult, format: OutputFormat) -> Result<(), CliError> {
    let snapshot = result
        .data
        .as_deref()
        .and_then(|d| serde_json::from_str::<ElementSnapshot>(d).ok());

    if format == OutputFormat::Json {
        let output = serde_json::json!({
            "success": result.success,
            "message": result.message,
            "element": snapshot,
        });
        println!("{}", to_json(&output)?);
    } else if let Some(snapshot) = snapshot {
        print!("{}", format_snapshot(&snapshot));
    }
    Ok(())
}

fn print_logs(logs: &[ActionLog], format: OutputFormat) -> Result<(), CliError> {
    if format == OutputFormat::Json {
        let value = serde_json::to_value(logs)
            .map_err(|e| CliError::ActionFailed(format!("JSON serialization error: {}", e)))?;
        println!("{}", to_json(&value)?);
        return Ok(());
    }

    for log in logs {
        let duration = log.duration_ms.map(|ms| format!("{}ms", ms)).unwrap_or_default();
        match &log.result {
            ActionResult::Success => println!("ok     {} {}", log.action.name(), duration),
            ActionResult::Failure(message) => println!("FAILED {} {}: {}", log.action.name(), duration, message),
        }
        if matches!(log.action, ActionType::GetValue { .. } | ActionType::GetText { .. }) {
            if let Some(data) = &log.data {
                println!("       {}", data);
            }
        }
    }
    Ok(())
}

fn format_snapshot(snapshot: &ElementSnapshot) -> String {
    let mut out = format!("{}\n", snapshot.description);
    if let Some(value) = &snapshot.value {
        out.push_str(&format!("  value: {}\n", value));
    }
    out.push_str(&format!("  text: {}\n", snapshot.text));
    out.push_str(&format!("  innerHTML: {}\n", snapshot.inner_html));
    out.push_str(&format!("  focused: {}\n", snapshot.focused));
    out
}
