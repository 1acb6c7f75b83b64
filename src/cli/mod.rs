//! CLI subcommand definitions and handlers.
//!
//! Uses clap derive to define the subcommand hierarchy:
//! - `scan` -- scan one input and print the decision report
//! - `history` -- list recent decisions from the store
//! - `rules` -- print the built-in rule catalog
//! - `config show` -- print the loaded configuration (secrets redacted)

use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Palisade input validation security gateway.
#[derive(Parser, Debug)]
#[command(
    name = "palisade",
    version = env!("CARGO_PKG_VERSION"),
    about = "Explainable allow/warn/block decisions for untrusted text"
)]
pub struct Cli {
    /// Path to a JSON/JSON5 config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan input text and produce a decision report.
    Scan {
        /// Inline input text.
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,

        /// Path to an input file (stdin is read when neither flag is given).
        #[arg(long)]
        file: Option<PathBuf>,

        /// Print a human-readable explanation after the report.
        #[arg(long)]
        explain: bool,
    },

    /// Show the most recent decisions.
    History {
        /// Number of decisions to show.
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },

    /// Print the built-in rule catalog.
    Rules,

    /// Read configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the fully loaded configuration (secrets redacted) as JSON.
    Show,
}

// ---------------------------------------------------------------------------
// Subcommand handlers
// ---------------------------------------------------------------------------

use crate::audit::AuditLog;
use crate::config::load_config;
use crate::decision::Decision;
use crate::error::GatewayError;
use crate::pipeline::{run_scan, ScanOutcome};
use crate::report::failsafe_report;
use crate::rules::catalog;

/// Exit codes: 0 allow/warn, 1 block, 2 fail-safe block.
const EXIT_OK: i32 = 0;
const EXIT_BLOCK: i32 = 1;
const EXIT_FAILSAFE: i32 = 2;

/// Dispatch the parsed CLI. Every path returns an exit code; a scan always
/// emits a structured report even when configuration or input loading
/// fails.
pub async fn run(cli: Cli) -> i32 {
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => return emit_failsafe(&err),
    };

    match cli.command {
        Command::Scan {
            text,
            file,
            explain,
        } => {
            let raw_text = match load_scan_text(text, file) {
                Ok(raw) => raw,
                Err(err) => return emit_failsafe(&err),
            };
            let audit = AuditLog::new(&config);
            let outcome = run_scan(&raw_text, &config, &audit).await;
            let report = outcome.report();
            print_json(report);
            if explain {
                println!("\nExplanation: {}", report.explanation.summary);
            }
            match &outcome {
                ScanOutcome::Failed(_) => EXIT_FAILSAFE,
                ScanOutcome::Completed(report) if report.decision == Decision::Block => EXIT_BLOCK,
                ScanOutcome::Completed(_) => EXIT_OK,
            }
        }

        Command::History { limit } => {
            let audit = AuditLog::new(&config);
            match audit.fetch_recent(limit) {
                Ok(rows) => {
                    print_json(&rows);
                    EXIT_OK
                }
                Err(err) => {
                    eprintln!("{}", err.sanitized());
                    EXIT_BLOCK
                }
            }
        }

        Command::Rules => {
            let rules: Vec<_> = catalog().iter().map(|c| c.rule).collect();
            print_json(&rules);
            EXIT_OK
        }

        Command::Config(ConfigCommand::Show) => {
            print_json(&config.redacted());
            EXIT_OK
        }
    }
}

/// Load the text to scan: inline flag, file, or stdin.
fn load_scan_text(text: Option<String>, file: Option<PathBuf>) -> Result<String, GatewayError> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(&path).map_err(|e| {
            GatewayError::Input(format!("cannot read input file {}: {e}", path.display()))
        });
    }
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|e| GatewayError::Input(format!("cannot read stdin: {e}")))?;
    Ok(buffer.trim().to_string())
}

/// Print the fail-safe block artifact for faults outside the scan pipeline
/// (config load, input acquisition) so the caller still gets a parseable
/// decision.
fn emit_failsafe(err: &GatewayError) -> i32 {
    let report = failsafe_report(err.category(), err.sanitized());
    match serde_json::to_string_pretty(&report) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!("{{\"decision\": \"block\"}}"),
    }
    EXIT_FAILSAFE
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("cannot serialize output: {e}"),
    }
}
