//! Download command implementation

use clap::Args;
use tracing::info;

use super::{emit, parse_date, Cli, CliError};
use crate::resolver::{EsiosClient, IndicatorKey, Query, Resource};
use crate::ResourceKind;

/// Download a resource by name or id
#[derive(Debug, Clone, Args)]
pub struct DownloadArgs {
    /// Resource name (archive, JSON archive, program or indicator name)
    #[arg(long, conflicts_with = "id", required_unless_present = "id")]
    pub name: Option<String>,

    /// Indicator id
    #[arg(long)]
    pub id: Option<u32>,

    /// Target date (YYYY-MM-DD local day, or RFC 3339; default: today)
    #[arg(long)]
    pub date: Option<String>,

    /// Skip classification: archive, archive_json, indicator or program
    #[arg(long)]
    pub kind: Option<ResourceKind>,
}

impl DownloadArgs {
    /// Resource to fetch when the kind is forced
    pub fn resource(&self) -> Result<Option<Resource>, CliError> {
        let Some(kind) = self.kind else {
            return Ok(None);
        };
        let resource = match (kind, &self.name, self.id) {
            (ResourceKind::Indicator, _, Some(id)) => Resource::Indicator(IndicatorKey::Id(id)),
            (ResourceKind::Indicator, Some(name), None) => {
                Resource::Indicator(IndicatorKey::Name(name.clone()))
            }
            (ResourceKind::Archive, Some(name), None) => Resource::Archive(name.clone()),
            (ResourceKind::ArchiveJson, Some(name), None) => Resource::ArchiveJson(name.clone()),
            (ResourceKind::Program, Some(name), None) => Resource::Program(name.clone()),
            (kind, _, _) => {
                return Err(CliError::InvalidArgument(format!(
                    "--kind {kind} requires --name"
                )))
            }
        };
        Ok(Some(resource))
    }

    /// Query for classified downloads
    pub fn query(&self) -> Result<Query, CliError> {
        match (&self.name, self.id) {
            (_, Some(id)) => Ok(Query::Id(id)),
            (Some(name), None) => Ok(Query::Name(name.clone())),
            (None, None) => Err(CliError::InvalidArgument(
                "either --name or --id is required".to_string(),
            )),
        }
    }

    fn label(&self) -> String {
        match (&self.name, self.id) {
            (Some(name), _) => name.clone(),
            (None, Some(id)) => id.to_string(),
            (None, None) => "resource".to_string(),
        }
    }

    /// Execute the download command
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let config = cli.client_config();
        let mut client = EsiosClient::new(&config)?;
        let date = parse_date(self.date.as_deref(), client.timezone())?;

        info!(resource = %self.label(), date = %date.to_rfc3339(), "Starting download");
        let result = match self.resource()? {
            Some(resource) => client.download(resource, &date).await?,
            None => client.download_by(self.query()?, &date).await?,
        };

        emit(
            &result,
            &self.label(),
            &date,
            cli.output_dir.as_deref(),
            cli.output_format,
        )
    }
}
