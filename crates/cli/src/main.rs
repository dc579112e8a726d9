// spotcheck CLI - ingest comparison reports and inspect the mismatch ledger

mod annotate;
mod domain;
mod exit_codes;
mod ingest;
mod query;
mod report_file;
mod settings;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use serde::Serialize;

use spotcheck_recon::{ReconError, SpotCheckMismatchIgnore};
use spotcheck_store::StoreError;

use exit_codes::{
    store_exit_code, EXIT_CONFIG, EXIT_ERROR, EXIT_REPORT_INVALID, EXIT_REPORT_PARSE,
    EXIT_STORE, EXIT_SUCCESS, EXIT_USAGE,
};
use settings::Settings;

#[derive(Parser)]
#[command(name = "spotcheck")]
#[command(about = "Reconcile spotcheck reports into a mismatch ledger")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Config file (default: <config dir>/spotcheck/spotcheck.toml)
    #[arg(long, global = true, env = "SPOTCHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Ledger database, overriding store.path from the config
    #[arg(long, global = true, env = "SPOTCHECK_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a report file and merge its observations into the ledger
    #[command(after_help = "\
Examples:
  spotcheck ingest daybreak-2025-04-02.json
  spotcheck ingest calendar-alert.json --json
  spotcheck --db /var/lib/spotcheck/ledger.db ingest report.json")]
    Ingest {
        /// Report JSON file
        report: PathBuf,

        /// Print the merge outcome as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// List active mismatches as JSON
    #[command(after_help = "\
Examples:
  spotcheck mismatches --datasource LBDC --content-type BILL
  spotcheck mismatches --datasource LBDC --content-type BILL --content-type BILL_AMENDMENT --status NEW
  spotcheck mismatches --datasource NYSENATE --content-type CALENDAR --date 2025-04-02 --limit 20 --offset 40
  spotcheck mismatches --datasource LBDC --content-type BILL --type BILL_TITLE --order-by first-seen --desc")]
    Mismatches(query::MismatchesArgs),

    /// Show one ledger row as JSON
    #[command(after_help = "\
Examples:
  spotcheck mismatch 42")]
    Mismatch {
        id: i64,
    },

    /// Summarize the active ledger
    #[command(subcommand)]
    Summary(query::SummaryCommands),

    /// Set a mismatch's ignore status
    #[command(after_help = "\
Examples:
  spotcheck ignore 42 IGNORE_PERMANENTLY
  spotcheck ignore 42 IGNORE_ONCE
  spotcheck ignore 42 NOT_IGNORED")]
    Ignore {
        id: i64,

        /// NOT_IGNORED, IGNORE_ONCE, IGNORE_PERMANENTLY or IGNORE_UNTIL_RESOLVED
        #[arg(value_parser = parse_name::<SpotCheckMismatchIgnore>)]
        status: SpotCheckMismatchIgnore,
    },

    /// Link or unlink issue tracker ids
    #[command(subcommand)]
    Issue(annotate::IssueCommands),
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

fn main() -> ExitCode {
    // RUST_LOG=spotcheck_store=debug etc.; stdout stays reserved for JSON
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();

    let cli = Cli::parse();
    let result = Settings::load(cli.config.as_deref(), cli.db.as_deref()).and_then(|settings| {
        match cli.command {
            Commands::Ingest { report, json } => ingest::cmd_ingest(&settings, &report, json),
            Commands::Mismatches(args) => query::cmd_mismatches(&settings, args),
            Commands::Mismatch { id } => query::cmd_mismatch(&settings, id),
            Commands::Summary(cmd) => query::cmd_summary(&settings, cmd),
            Commands::Ignore { id, status } => annotate::cmd_ignore(&settings, id, status),
            Commands::Issue(cmd) => annotate::cmd_issue(&settings, cmd),
        }
    });

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
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
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn report_parse(msg: impl Into<String>) -> Self {
        Self { code: EXIT_REPORT_PARSE, message: msg.into(), hint: None }
    }

    pub fn report_invalid(err: ReconError) -> Self {
        Self { code: EXIT_REPORT_INVALID, message: err.to_string(), hint: None }
    }

    pub fn config(err: ReconError) -> Self {
        Self { code: EXIT_CONFIG, message: err.to_string(), hint: None }
    }

    /// Create error from a store error with its registered exit code.
    pub fn store(err: StoreError) -> Self {
        let code = store_exit_code(&err);
        let hint = match &err {
            StoreError::NotFound { .. } => Some("list mismatch ids with `spotcheck mismatches`".to_string()),
            StoreError::InvalidReport(_) => {
                Some("drop the report \"id\" field to record it as a new report".to_string())
            }
            _ if code == EXIT_STORE => Some("check --db / store.path and file permissions".to_string()),
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Enum arguments are matched on their canonical names, case-insensitively.
pub fn parse_name<T: FromStr<Err = ReconError>>(s: &str) -> Result<T, String> {
    s.trim()
        .to_ascii_uppercase()
        .replace('-', "_")
        .parse()
        .map_err(|e: ReconError| e.to_string())
}

/// Writes exactly one JSON value to stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| CliError::io(e.to_string()))?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", json).map_err(|e| CliError::io(e.to_string()))
}
