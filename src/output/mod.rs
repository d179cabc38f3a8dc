//! Output writers for decoded results
//!
//! Tables are written as CSV, one file per table; nested JSON results are written
//! as pretty-printed JSON. File names come from [`OutputPathBuilder`].

use chrono::{DateTime, FixedOffset};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::DecodedResult;

pub mod csv;
pub mod path;

pub use self::csv::CsvTableWriter;
pub use path::OutputPathBuilder;

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Write a decoded result under `root_dir` and return the files created
///
/// - `Table` → `{resource}/{resource}_{date}.csv`
/// - `Tables` → `{resource}/{resource}_{date}_{table}.csv`, one per table
/// - `Nested` → `{resource}/{resource}_{date}.json`
///
/// `{date}` is the calendar day in `date`'s own offset, so pass a date already
/// expressed in the local zone (see [`crate::timezone::Timezone::to_local`]).
pub fn write_result(
    root_dir: &Path,
    resource: &str,
    date: &DateTime<FixedOffset>,
    result: &DecodedResult,
) -> OutputResult<Vec<PathBuf>> {
    let builder = OutputPathBuilder::new(root_dir.to_path_buf(), resource, date.date_naive());
    builder.ensure_directories()?;

    let paths = match result {
        DecodedResult::Table(table) => {
            let path = builder.table_path(None);
            let mut writer = CsvTableWriter::new(&path)?;
            writer.write_table(table)?;
            writer.close()?;
            vec![path]
        }
        DecodedResult::Tables(tables) => {
            let mut paths = Vec::with_capacity(tables.len());
            for (name, table) in tables {
                let path = builder.table_path(Some(name));
                let mut writer = CsvTableWriter::new(&path)?;
                writer.write_table(table)?;
                writer.close()?;
                paths.push(path);
            }
            paths
        }
        DecodedResult::Nested(map) => {
            let path = builder.json_path();
            write_json(&path, map)?;
            vec![path]
        }
    };

    info!(resource, files = paths.len(), dir = %builder.directory().display(), "Wrote output");
    Ok(paths)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> OutputResult<()> {
    let file = File::create(path)
        .map_err(|e| OutputError::IoError(format!("Failed to create {}: {e}", path.display())))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .map_err(|e| OutputError::SerializationError(e.to_string()))
}
