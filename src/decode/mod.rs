//! Payload decoders
//!
//! Pure, stateless transforms from raw bytes to a [`DecodedResult`]. Decoding the
//! same payload twice always yields equal results.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::DecodedResult;

pub mod archive;
pub mod delimited;
pub mod json;
pub mod spreadsheet;

pub use archive::{decode_archive, ArchiveLayout};

/// Decoding errors: payload does not have the structure the decoder expects
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormatError {
    /// Compressed container could not be opened or read
    #[error("container error: {0}")]
    Container(String),

    /// No inner file matches the expected naming/extension pattern
    #[error("no inner file matching {expected} (found: {found})")]
    NoMatchingEntry {
        /// Description of the accepted pattern
        expected: String,
        /// Inner file names present in the container
        found: String,
    },

    /// Delimited text could not be parsed
    #[error("delimited text error in {file}: {message}")]
    Delimited {
        /// Inner file name
        file: String,
        /// Parser message
        message: String,
    },

    /// Workbook could not be read
    #[error("workbook error: {0}")]
    Workbook(String),

    /// JSON could not be parsed or has an unexpected shape
    #[error("JSON error: {0}")]
    Json(String),

    /// Timestamps within a series are duplicated or out of order
    #[error("series '{series}': timestamp {current} does not follow {previous}")]
    UnorderedTimestamps {
        /// Series name
        series: String,
        /// Previous timestamp (RFC 3339)
        previous: String,
        /// Offending timestamp (RFC 3339)
        current: String,
    },

    /// XML could not be parsed
    #[error("XML error: {0}")]
    Xml(String),

    /// Required element or attribute is missing
    #[error("missing element: {0}")]
    MissingElement(String),

    /// Value present but unusable
    #[error("invalid value: {0}")]
    InvalidValue(String),
}

/// Result type for decoding
pub type FormatResult<T> = Result<T, FormatError>;

/// Layout of a binary archive's inner files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    /// Delimited text files (CSV and friends)
    Delimited,
    /// One spreadsheet workbook with one or more sheets
    Spreadsheet,
}

impl FileFormat {
    /// Interpret a listing format tag (`archive_type`)
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "csv" | "txt" | "delimited" => Some(FileFormat::Delimited),
            "xls" | "xlsx" | "xlsm" | "excel" | "ods" | "spreadsheet" => {
                Some(FileFormat::Spreadsheet)
            }
            _ => None,
        }
    }

    /// Infer from a file name, looking through a trailing `.zip`
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let stem = lower.strip_suffix(".zip").unwrap_or(&lower);
        let extension = stem.rsplit_once('.').map(|(_, ext)| ext)?;
        Self::from_tag(extension)
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFormat::Delimited => write!(f, "delimited"),
            FileFormat::Spreadsheet => write!(f, "spreadsheet"),
        }
    }
}

/// Decode an `archive_json` payload into a nested mapping
pub fn decode_nested(body: &[u8]) -> FormatResult<DecodedResult> {
    json::parse_nested(body).map(DecodedResult::Nested)
}
