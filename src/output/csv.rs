//! CSV output writer for tables

use csv::Writer;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, info};

use super::{OutputError, OutputResult};
use crate::Table;

const DEFAULT_BUFFER_SIZE: usize = 8192; // 8KB buffer

/// Name of the leading column holding the timestamp index
pub const INDEX_COLUMN: &str = "datetime";

/// CSV writer for decoded tables
pub struct CsvTableWriter {
    writer: Writer<BufWriter<File>>,
    rows_written: u64,
}

impl CsvTableWriter {
    /// Create a new CSV writer
    pub fn new<P: AsRef<Path>>(path: P) -> OutputResult<Self> {
        Self::new_with_buffer_size(path, DEFAULT_BUFFER_SIZE)
    }

    /// Create a new CSV writer with custom buffer size
    pub fn new_with_buffer_size<P: AsRef<Path>>(
        path: P,
        buffer_size: usize,
    ) -> OutputResult<Self> {
        let path = path.as_ref();
        info!("Creating CSV writer: path={}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| OutputError::IoError(format!("Failed to create directory: {}", e)))?;
        }

        let file = File::create(path)
            .map_err(|e| OutputError::IoError(format!("Failed to create file: {}", e)))?;

        Ok(Self {
            writer: Writer::from_writer(BufWriter::with_capacity(buffer_size, file)),
            rows_written: 0,
        })
    }

    /// Number of data rows written so far
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Write header and rows; indexed tables get a leading RFC 3339 `datetime` column
    pub fn write_table(&mut self, table: &Table) -> OutputResult<()> {
        let index = table.index();

        let mut header: Vec<&str> = Vec::with_capacity(table.columns().len() + 1);
        if index.is_some() {
            header.push(INDEX_COLUMN);
        }
        header.extend(table.columns().iter().map(String::as_str));
        self.writer
            .write_record(&header)
            .map_err(|e| OutputError::CsvError(format!("Failed to write header: {}", e)))?;

        for (i, row) in table.rows().iter().enumerate() {
            let mut record: Vec<String> = Vec::with_capacity(row.len() + 1);
            if let Some(index) = index {
                record.push(index[i].to_rfc3339());
            }
            record.extend(row.iter().map(ToString::to_string));
            self.writer
                .write_record(&record)
                .map_err(|e| OutputError::CsvError(format!("Failed to write row: {}", e)))?;
            self.rows_written += 1;
        }

        debug!("Wrote {} rows", table.len());
        Ok(())
    }

    /// Flush buffered data to disk
    pub fn flush(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::IoError(format!("Failed to flush: {}", e)))
    }

    /// Flush and close the writer
    pub fn close(mut self) -> OutputResult<()> {
        self.flush()?;
        info!("CSV writer closed: {} rows written", self.rows_written);
        Ok(())
    }
}
