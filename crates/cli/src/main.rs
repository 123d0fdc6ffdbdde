// shelfmatch CLI - assign ledger accession numbers to catalog entries

mod exit_codes;
mod logging;
mod reconcile;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, ValueEnum};
use shelfmatch_recon::{AcceptablePolicy, ReconError};

use exit_codes::{recon_exit_code, EXIT_IO, EXIT_SUCCESS, EXIT_USAGE};

const BANNER: &str = "\
========================
       shelfmatch
========================";

#[derive(Parser)]
#[command(name = "shelfmatch")]
#[command(about = "Match a library catalog against the accession ledger of the physical collection")]
#[command(long_version = long_version())]
#[command(version)]
#[command(after_help = "\
Examples:
  shelfmatch ledger.csv
  shelfmatch ledger.csv -c catalog.json -o matched.json --report run.json
  shelfmatch ledger.csv --acceptable-policy accept -vv --log-file shelfmatch.log")]
pub struct Cli {
    /// Ledger CSV exported from the accession spreadsheet
    #[arg(value_name = "LEDGER")]
    pub ledger: PathBuf,

    /// Catalog JSON written by the catalog scraper
    #[arg(short = 'c', long, value_name = "PATH", default_value = "catalog.json")]
    pub catalog: PathBuf,

    /// Where to write the annotated catalog
    #[arg(short = 'o', long, value_name = "PATH", default_value = "matched.json")]
    pub output: PathBuf,

    /// Also write the full run report (matches, residuals, ties, candidates)
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// TOML config (ledger layout, thresholds, passes)
    #[arg(long, value_name = "PATH", env = "SHELFMATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// What to do with unambiguous acceptable-tier candidates (overrides config)
    #[arg(long, value_enum)]
    pub acceptable_policy: Option<PolicyArg>,

    /// Print the token-set tier classification before matching
    #[arg(long)]
    pub tiers: bool,

    /// Write a debug-level log to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress the start banner
    #[arg(long)]
    pub nologo: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PolicyArg {
    /// Report candidates for manual review only
    Surface,
    /// Commit candidates like high-confidence matches
    Accept,
}

impl From<PolicyArg> for AcceptablePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Surface => AcceptablePolicy::Surface,
            PolicyArg::Accept => AcceptablePolicy::Accept,
        }
    }
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  shelfmatch-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  shelfmatch-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if !cli.nologo {
        eprintln!("{BANNER}");
    }

    let result = logging::init(cli.verbose, cli.log_file.as_deref())
        .and_then(|()| reconcile::cmd_reconcile(&cli));

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            // A fatal error always comes with the banner.
            if cli.nologo {
                eprintln!("{BANNER}");
            }
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            eprintln!("usage: shelfmatch [OPTIONS] <LEDGER>  (see --help)");
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
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let code = recon_exit_code(&err);
        let hint = match &err {
            ReconError::Validation(_) => {
                Some("LEDGER must be the accession CSV and --catalog the scraper's JSON array")
            }
            ReconError::CatalogShape { .. } => {
                Some("every catalog record needs a string \"title\" and a \"copies\" array")
            }
            ReconError::LedgerParse { .. } => {
                Some("check [ledger] delimiter and column positions in the config")
            }
            ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => {
                Some("valid sections are [ledger], [thresholds], [passes] and [diagnostics]")
            }
            ReconError::Consistency(_) => {
                Some("this is a bug; rerun with --log-file and report the log")
            }
            ReconError::Serialize(_) => None,
        };
        Self {
            code,
            message: err.to_string(),
            hint: hint.map(str::to_string),
        }
    }
}
