//! # ESIOS Client Library
//!
//! A client for the ESIOS electricity market API. It resolves a logical resource
//! (an archive, a JSON archive, an indicator or a program report) plus a target
//! date to a concrete endpoint, downloads it and decodes the payload into tables.
//!
//! ## Quick Start
//!
//! ```no_run
//! use esios_client::{ClientConfig, EsiosClient, Query};
//! use esios_client::timezone::{CentralEuropeanTime, Timezone};
//! use chrono::NaiveDate;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env().with_token(Some("my-token".to_string()));
//! let mut client = EsiosClient::new(&config)?;
//!
//! let date = CentralEuropeanTime
//!     .start_of_day(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
//!     .unwrap();
//!
//! // Indicator 600: day-ahead spot price
//! let prices = client.download_by(Query::Id(600), &date).await?;
//! println!("{:?}", prices.as_table().map(|t| t.columns().to_vec()));
//!
//! // I90DIA: zipped workbook, one table per sheet
//! let i90 = client.download_by("I90DIA", &date).await?;
//! println!("{:?}", i90.as_tables().map(|t| t.keys().cloned().collect::<Vec<_>>()));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`decode`] - Pure decoders: zipped delimited text, zipped workbooks, JSON
//! - [`catalog`] - Archive listing cache with explicit refresh, plus the embedded
//!   registry of known resources
//! - [`resolver`] - Resource classification, reference resolution and fetch orchestration
//! - [`program`] - Program report (XML schedule) adapter
//! - [`transport`] - Transport seam and the default reqwest implementation
//! - [`lookup`] - Indicator name to id resolution
//! - [`timezone`] - Local timezone used for every date parameter
//! - [`output`] - CSV/JSON writers for decoded results

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Archive listing cache and known resource registry
pub mod catalog;

/// CLI command implementations
pub mod cli;

/// Client configuration
pub mod config;

/// Payload decoders
pub mod decode;

/// Indicator name lookup
pub mod lookup;

/// Output writers for decoded results
pub mod output;

/// Program report adapter
pub mod program;

/// Resource resolution and fetch orchestration
pub mod resolver;

/// Timezone collaborator
pub mod timezone;

/// Transport seam and HTTP implementation
pub mod transport;

pub use config::ClientConfig;
pub use resolver::{ClientError, ClientResult, EsiosClient, Query, Resource};

/// Kind of a retrievable resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Date-scoped file found through the archive listing
    Archive,
    /// JSON document retrieved directly by name
    ArchiveJson,
    /// Time series served by the indicator endpoint
    Indicator,
    /// Settlement/schedule report, always one table
    Program,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Archive => "archive",
            ResourceKind::ArchiveJson => "archive_json",
            ResourceKind::Indicator => "indicator",
            ResourceKind::Program => "program",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "archive" => Ok(ResourceKind::Archive),
            "archive_json" | "archive-json" => Ok(ResourceKind::ArchiveJson),
            "indicator" => Ok(ResourceKind::Indicator),
            "program" => Ok(ResourceKind::Program),
            _ => Err(format!("Invalid resource kind: {s}")),
        }
    }
}

/// Single decoded cell value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    /// Missing value
    Empty,
    /// Numeric value
    Number(f64),
    /// Free text
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Calendar date
    Date(NaiveDate),
    /// Local date and time without offset
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Numeric value, if this cell holds one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Text value, if this cell holds one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// True for [`Cell::Empty`]
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Text(s) => write!(f, "{s}"),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Cell::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Rows of typed cells under named columns, optionally indexed by timestamp
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    index: Option<Vec<DateTime<FixedOffset>>>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Create an empty table without a timestamp index
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            index: None,
            rows: Vec::new(),
        }
    }

    /// Create a table indexed by timestamp, one row per index entry
    ///
    /// Every row must have exactly one cell per column.
    pub fn with_index(
        columns: Vec<String>,
        index: Vec<DateTime<FixedOffset>>,
        rows: Vec<Vec<Cell>>,
    ) -> Result<Self, String> {
        if index.len() != rows.len() {
            return Err(format!(
                "Index length ({}) does not match row count ({})",
                index.len(),
                rows.len()
            ));
        }
        let mut table = Self {
            columns,
            index: Some(index),
            rows: Vec::with_capacity(rows.len()),
        };
        for row in rows {
            table.check_width(&row)?;
            table.rows.push(row);
        }
        Ok(table)
    }

    /// Append a row to a table without index
    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<(), String> {
        if self.index.is_some() {
            return Err("Cannot push an unindexed row into an indexed table".to_string());
        }
        self.check_width(&row)?;
        self.rows.push(row);
        Ok(())
    }

    fn check_width(&self, row: &[Cell]) -> Result<(), String> {
        if row.len() != self.columns.len() {
            return Err(format!(
                "Row has {} cells, expected {}",
                row.len(),
                self.columns.len()
            ));
        }
        Ok(())
    }

    /// Column names in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Timestamp index, if the table has one
    pub fn index(&self) -> Option<&[DateTime<FixedOffset>]> {
        self.index.as_deref()
    }

    /// All rows
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by exact name
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cells of one column, top to bottom
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let pos = self.column_position(name)?;
        Some(self.rows.iter().map(|row| &row[pos]).collect())
    }

    /// Cell at (row, column name)
    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let pos = self.column_position(column)?;
        self.rows.get(row).map(|r| &r[pos])
    }
}

/// Uniform result of a fetch-and-decode operation
///
/// The shape depends only on the resource kind and the decoder used.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DecodedResult {
    /// One table (indicators, program reports)
    Table(Table),
    /// Table name to table (zipped archives)
    Tables(BTreeMap<String, Table>),
    /// Raw JSON object (JSON archives)
    Nested(serde_json::Map<String, serde_json::Value>),
}

impl DecodedResult {
    /// Borrow as a single table
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            DecodedResult::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Borrow as a table mapping
    pub fn as_tables(&self) -> Option<&BTreeMap<String, Table>> {
        match self {
            DecodedResult::Tables(t) => Some(t),
            _ => None,
        }
    }

    /// Borrow as a nested JSON object
    pub fn as_nested(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        match self {
            DecodedResult::Nested(m) => Some(m),
            _ => None,
        }
    }

    /// Take the single table out of the result
    pub fn into_table(self) -> Option<Table> {
        match self {
            DecodedResult::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Short name of the result shape, for logs
    pub fn shape(&self) -> &'static str {
        match self {
            DecodedResult::Table(_) => "table",
            DecodedResult::Tables(_) => "tables",
            DecodedResult::Nested(_) => "nested",
        }
    }
}

/// What a reference points at: a logical name or a numeric id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceTarget {
    /// Numeric id
    Id(u32),
    /// Logical name
    Name(String),
}

impl fmt::Display for ResourceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceTarget::Id(id) => write!(f, "#{id}"),
            ResourceTarget::Name(name) => write!(f, "'{name}'"),
        }
    }
}

/// Concrete, date-bound location of a retrievable unit
///
/// A reference is only valid for the date it was resolved against and is
/// never reused for another call.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceReference {
    /// Resource kind
    pub kind: ResourceKind,
    /// Name or id the caller asked for
    pub target: ResourceTarget,
    /// Endpoint path, relative to the API base URL
    pub location: String,
    /// Date the reference was resolved for
    pub date: DateTime<FixedOffset>,
    /// Declared container format (archives only)
    pub format: Option<decode::FileFormat>,
}
