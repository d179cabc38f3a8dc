//! Output path generation
//!
//! Files are grouped per resource: `{root}/{resource}/{resource}_{yyyymmdd}[_{table}].{ext}`.
//! Every component is sanitized, since resource and sheet names come from the
//! provider.

use super::{OutputError, OutputResult};
use chrono::NaiveDate;
use std::path::PathBuf;

/// Path builder for one resource and date
#[derive(Debug, Clone)]
pub struct OutputPathBuilder {
    root_dir: PathBuf,
    resource: String,
    date: NaiveDate,
}

impl OutputPathBuilder {
    /// Create a new path builder
    ///
    /// # Security
    ///
    /// The resource name is sanitized to prevent path traversal.
    pub fn new(root_dir: PathBuf, resource: &str, date: NaiveDate) -> Self {
        Self {
            root_dir,
            resource: sanitize_component(resource),
            date,
        }
    }

    /// Directory holding this resource's files
    pub fn directory(&self) -> PathBuf {
        self.root_dir.join(&self.resource)
    }

    /// Ensure the resource directory exists
    pub fn ensure_directories(&self) -> OutputResult<()> {
        let dir_path = self.directory();
        std::fs::create_dir_all(&dir_path).map_err(|e| {
            OutputError::IoError(format!(
                "Failed to create directory {}: {}",
                dir_path.display(),
                e
            ))
        })
    }

    /// CSV path for a table; `table` distinguishes tables of one archive
    pub fn table_path(&self, table: Option<&str>) -> PathBuf {
        let stem = match table {
            Some(name) => format!("{}_{}", self.stem(), sanitize_component(name)),
            None => self.stem(),
        };
        self.directory().join(format!("{stem}.csv"))
    }

    /// JSON path for a nested result
    pub fn json_path(&self) -> PathBuf {
        self.directory().join(format!("{}.json", self.stem()))
    }

    fn stem(&self) -> String {
        format!("{}_{}", self.resource, self.date.format("%Y%m%d"))
    }
}

/// Sanitize a name for use as one path component
///
/// - `/`, `\`, `:` and whitespace → `_`
/// - `..` → `__`
/// - empty → `_`
pub fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .replace("..", "__")
        .chars()
        .map(|c| {
            if matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_whitespace()
            {
                '_'
            } else {
                c
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}
