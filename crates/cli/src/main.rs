//! `absentia` — absentee-ballot snapshot reconciliation CLI.

mod exit_codes;
mod ingest;
mod prompt;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use absentia_config::Settings;
use absentia_core::CountyFormat;

use crate::exit_codes::{EXIT_ERROR, EXIT_EXTRACT, EXIT_STALE, EXIT_STORE, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(
    name = "absentia",
    version,
    about = "Reconcile absentee-ballot snapshot extracts into a canonical, audit-logged voter store"
)]
struct Cli {
    /// Settings file (defaults to ~/.config/absentia/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store schema and log directories
    Init,

    /// Ingest a snapshot extract
    Ingest {
        #[command(subcommand)]
        command: IngestCommands,
    },

    /// Summarize a state extract without touching the store
    #[command(after_help = "\
Examples:
  absentia report sos/10-26.csv
  absentia report sos/10-26.csv --json")]
    Report {
        /// State extract CSV
        file: PathBuf,

        /// Emit JSON instead of the human summary
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum IngestCommands {
    /// Ingest the daily state-wide extract
    #[command(after_help = "\
Examples:
  absentia ingest state sos/10-26.csv --date 2020-10-26
  absentia ingest state sos/10-26.csv --date 2020-10-26 --workers 8 --json")]
    State {
        /// Extract CSV
        file: PathBuf,

        /// The date this extract represents (YYYY-MM-DD)
        #[arg(long, value_parser = ingest::parse_date)]
        date: NaiveDate,

        /// Override the configured worker count
        #[arg(long)]
        workers: Option<usize>,

        /// Emit JSON instead of the human summary
        #[arg(long)]
        json: bool,
    },

    /// Ingest a county rejection list (interactive on ambiguous identities)
    #[command(after_help = "\
Examples:
  absentia ingest county polk polk/10-26.csv --date 2020-10-26
  absentia ingest county cerro-gordo cg/10-26.csv --date 2020-10-26")]
    County {
        /// County name: polk, cerro-gordo, or des-moines
        #[arg(value_parser = ingest::parse_county)]
        county: CountyFormat,

        /// Rejection list CSV
        file: PathBuf,

        /// The date this list represents (YYYY-MM-DD)
        #[arg(long, value_parser = ingest::parse_date)]
        date: NaiveDate,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };

    let result = match cli.command {
        None => {
            eprintln!("Usage: absentia <command> [options]");
            eprintln!("       absentia --help for more information");
            return ExitCode::from(EXIT_USAGE);
        }
        Some(Commands::Init) => ingest::cmd_init(&settings),
        Some(Commands::Ingest { command }) => match command {
            IngestCommands::State { file, date, workers, json } => {
                ingest::cmd_ingest_state(&settings, file, date, workers, json)
            }
            IngestCommands::County { county, file, date } => {
                ingest::cmd_ingest_county(&settings, county, file, date)
            }
        },
        Some(Commands::Report { file, json }) => report::cmd_report(file, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {message}");
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {hint}");
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn extract(msg: impl Into<String>) -> Self {
        Self { code: EXIT_EXTRACT, message: msg.into(), hint: None }
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self { code: EXIT_STORE, message: msg.into(), hint: None }
    }

    pub fn stale(msg: impl Into<String>) -> Self {
        Self { code: EXIT_STALE, message: msg.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
