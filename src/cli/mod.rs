//! CLI command implementations

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::ClientConfig;
use crate::output;
use crate::timezone::Timezone;
use crate::DecodedResult;

pub mod catalog;
pub mod download;
pub mod error;
pub mod program;

pub use catalog::{ArchivesArgs, ListArgs, Listing, LookupArgs};
pub use download::DownloadArgs;
pub use error::CliError;
pub use program::{ProgramArgs, UnitOwnersArgs};

/// Output format for command results printed to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Human,
    /// Full result as JSON
    Json,
}

/// ESIOS command line client
#[derive(Debug, Parser)]
#[command(name = "esios")]
#[command(about = "Download and decode ESIOS electricity market data", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// API token (default: ESIOS_TOKEN environment variable)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// API base URL (default: ESIOS_BASE_URL or the public endpoint)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Maximum number of retries for failed requests (default: 5, range: 1-20)
    #[arg(long, global = true, default_value = "5", value_parser = clap::value_parser!(u32).range(1..=20))]
    pub max_retries: u32,

    /// Write results under this directory instead of printing them
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Stdout format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download and decode a resource by name or id
    Download(DownloadArgs),

    /// Download a program report as one table
    Program(ProgramArgs),

    /// List the archives published for a date
    Archives(ArchivesArgs),

    /// Resolve an indicator name to its id (slow)
    Lookup(LookupArgs),

    /// List every indicator or every JSON archive
    List(ListArgs),

    /// Join programming units to the participant owning them
    UnitOwners(UnitOwnersArgs),
}

impl Cli {
    /// Client configuration: environment defaults overridden by flags
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::from_env()
            .with_token(self.token.clone())
            .with_max_retries(self.max_retries);
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url.as_str());
        }
        config
    }
}

/// Parse `YYYY-MM-DD` (local midnight) or an RFC 3339 timestamp; `None` means today
///
/// Timestamps are re-expressed in the local zone so output names and archive
/// days follow the local calendar.
pub fn parse_date(input: Option<&str>, tz: &dyn Timezone) -> Result<DateTime<FixedOffset>, CliError> {
    let day = match input.map(str::trim) {
        None => tz.localize_utc(&Utc::now()).date_naive(),
        Some(raw) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
                return Ok(tz.to_local(&dt));
            }
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
                CliError::InvalidArgument(format!(
                    "Invalid date '{raw}': {e} (expected YYYY-MM-DD or RFC 3339)"
                ))
            })?
        }
    };
    tz.start_of_day(day).ok_or_else(|| {
        CliError::InvalidArgument(format!("{day} has no local midnight in {}", tz.name()))
    })
}

/// Write the result to `output_dir` when set, else print it in `format`
pub(crate) fn emit(
    result: &DecodedResult,
    resource: &str,
    date: &DateTime<FixedOffset>,
    output_dir: Option<&Path>,
    format: OutputFormat,
) -> Result<(), CliError> {
    if let Some(dir) = output_dir {
        for path in output::write_result(dir, resource, date, result)? {
            println!("{}", path.display());
        }
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(result)
                .map_err(|e| CliError::InvalidArgument(format!("Cannot serialize result: {e}")))?;
            println!("{json}");
        }
        OutputFormat::Human => print!("{}", summarize(result)),
    }
    Ok(())
}

/// Short multi-line description of a result
pub fn summarize(result: &DecodedResult) -> String {
    let describe = |table: &crate::Table| {
        format!(
            "{} rows x {} columns [{}]",
            table.len(),
            table.columns().len(),
            table.columns().join(", ")
        )
    };
    match result {
        DecodedResult::Table(table) => format!("{}\n", describe(table)),
        DecodedResult::Tables(tables) => tables
            .iter()
            .map(|(name, table)| format!("{name}: {}\n", describe(table)))
            .collect(),
        DecodedResult::Nested(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("JSON object with keys [{}]\n", keys.join(", "))
        }
    }
}
