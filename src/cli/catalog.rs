//! Catalog, listing and indicator lookup commands

use clap::{Args, ValueEnum};

use super::{parse_date, Cli, CliError, OutputFormat};
use crate::catalog::CatalogEntry;
use crate::lookup::ResourceSummary;
use crate::resolver::EsiosClient;

/// List the archive catalog
#[derive(Debug, Clone, Args)]
pub struct ArchivesArgs {
    /// Listing date (YYYY-MM-DD local day, or RFC 3339; default: today)
    #[arg(long)]
    pub date: Option<String>,

    /// Only show entries available for the date
    #[arg(long, default_value_t = false)]
    pub applicable: bool,
}

impl ArchivesArgs {
    /// Execute the archives command
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let mut client = EsiosClient::new(&cli.client_config())?;
        let date = parse_date(self.date.as_deref(), client.timezone())?;
        client.refresh_catalog(Some(&date)).await?;

        let entries: Vec<&CatalogEntry> = client
            .catalog()
            .entries()
            .iter()
            .filter(|e| !self.applicable || e.applies_to(&date))
            .collect();

        match cli.output_format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&entries).map_err(|e| {
                    CliError::InvalidArgument(format!("Cannot serialize listing: {e}"))
                })?;
                println!("{json}");
            }
            OutputFormat::Human => {
                for entry in entries {
                    println!("{}", format_entry(entry));
                }
            }
        }
        Ok(())
    }
}

/// One listing line: id, name, date, format tag and availability
pub fn format_entry(entry: &CatalogEntry) -> String {
    format!(
        "{:>6}  {:<28} {}  {:<6} {}",
        entry.id,
        entry.name,
        entry.date,
        entry.format_tag,
        if entry.available { "available" } else { "pending" }
    )
}

/// Listing served by the `list` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Listing {
    /// Every indicator (slow)
    Indicators,
    /// Every JSON archive
    JsonArchives,
}

/// List indicators or JSON archives
#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    /// What to list
    #[arg(value_enum)]
    pub listing: Listing,
}

impl ListArgs {
    /// Execute the list command
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let client = EsiosClient::new(&cli.client_config())?;
        let entries = match self.listing {
            Listing::Indicators => client.list_indicators().await?,
            Listing::JsonArchives => client.list_json_archives().await?,
        };

        match cli.output_format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&entries).map_err(|e| {
                    CliError::InvalidArgument(format!("Cannot serialize listing: {e}"))
                })?;
                println!("{json}");
            }
            OutputFormat::Human => {
                for entry in &entries {
                    println!("{}", format_summary(entry));
                }
            }
        }
        Ok(())
    }
}

/// One listing line: id and name, plus the archive type when known
pub fn format_summary(entry: &ResourceSummary) -> String {
    match &entry.archive_type {
        Some(tag) => format!("{:>6}  {:<40} {tag}", entry.id, entry.name),
        None => format!("{:>6}  {}", entry.id, entry.name),
    }
}

/// Resolve an indicator name to its id
#[derive(Debug, Clone, Args)]
pub struct LookupArgs {
    /// Exact indicator name
    #[arg(long)]
    pub name: String,
}

impl LookupArgs {
    /// Execute the lookup command
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let client = EsiosClient::new(&cli.client_config())?;
        let id = client.lookup_id(&self.name).await?;
        match cli.output_format {
            OutputFormat::Json => println!("{}", serde_json::json!({ "name": self.name, "id": id })),
            OutputFormat::Human => println!("{id}"),
        }
        Ok(())
    }
}
