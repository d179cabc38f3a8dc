//! CLI error types and conversions

use crate::config::ConfigError;
use crate::output::OutputError;
use crate::resolver::ClientError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Client could not be configured
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// Fetch or decode failed
    #[error("{0}")]
    ClientError(#[from] ClientError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
