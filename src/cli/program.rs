//! Program and unit owner command implementations

use clap::Args;

use super::{emit, parse_date, Cli, CliError};
use crate::program::ProgramOptions;
use crate::resolver::EsiosClient;
use crate::DecodedResult;

/// Download a program report
#[derive(Debug, Clone, Args)]
pub struct ProgramArgs {
    /// Report name (e.g. p48cierre, pvpcdesglosehorario)
    #[arg(long)]
    pub name: String,

    /// Target date (YYYY-MM-DD local day, or RFC 3339; default: today)
    #[arg(long)]
    pub date: Option<String>,

    /// Sum values per local day
    #[arg(long, default_value_t = false)]
    pub aggregate_daily: bool,
}

impl ProgramArgs {
    /// Execute the program command
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let client = EsiosClient::new(&cli.client_config())?;
        let date = parse_date(self.date.as_deref(), client.timezone())?;
        let options = ProgramOptions {
            aggregate_daily: self.aggregate_daily,
        };

        let table = client.get_program_with(&self.name, &date, options).await?;
        emit(
            &DecodedResult::Table(table),
            &self.name,
            &date,
            cli.output_dir.as_deref(),
            cli.output_format,
        )
    }
}

/// Programming units with the name of their owning participant
#[derive(Debug, Clone, Args)]
pub struct UnitOwnersArgs {
    /// Target date (YYYY-MM-DD local day, or RFC 3339; default: today)
    #[arg(long)]
    pub date: Option<String>,
}

impl UnitOwnersArgs {
    /// Execute the unit-owners command
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let mut client = EsiosClient::new(&cli.client_config())?;
        let date = parse_date(self.date.as_deref(), client.timezone())?;

        let table = client.programming_unit_owners(&date).await?;
        emit(
            &DecodedResult::Table(table),
            "unit_owners",
            &date,
            cli.output_dir.as_deref(),
            cli.output_format,
        )
    }
}
