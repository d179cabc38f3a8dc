//! Zip container handling for binary archives
//!
//! Archives are zip files holding either delimited text files or a single workbook.
//! Inner files are selected by extension and, when the resource defines one, by a
//! file name prefix.

use std::io::{Cursor, Read};
use tracing::debug;
use zip::ZipArchive;

use super::{delimited, spreadsheet, FileFormat, FormatError, FormatResult};
use crate::DecodedResult;

/// Extensions accepted by the delimited decoder
pub const DELIMITED_EXTENSIONS: &[&str] = &["csv", "txt"];

/// Extensions accepted by the spreadsheet decoder
pub const SPREADSHEET_EXTENSIONS: &[&str] = &["xls", "xlsx", "xlsm", "xlsb", "ods"];

/// Resource-specific layout of an archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveLayout {
    /// Rows to skip at the top of each sheet before the header row
    pub skip_rows: usize,
    /// Inner file names must start with this prefix when set
    pub file_prefix: Option<String>,
    /// Header row of a leading index sheet that marks reserved sheets
    pub index_header_row: Option<usize>,
}

impl ArchiveLayout {
    /// Layout requiring a file name prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            file_prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    /// True if `path` has one of `extensions` and satisfies the prefix rule
    pub fn accepts(&self, path: &str, extensions: &[&str]) -> bool {
        let name = base_name(path);
        let Some((_, ext)) = name.rsplit_once('.') else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        if !extensions.contains(&ext.as_str()) {
            return false;
        }
        match &self.file_prefix {
            Some(prefix) => name.starts_with(prefix.as_str()),
            None => true,
        }
    }

    fn describe(&self, extensions: &[&str]) -> String {
        let exts = extensions
            .iter()
            .map(|e| format!(".{e}"))
            .collect::<Vec<_>>()
            .join("/");
        match &self.file_prefix {
            Some(prefix) => format!("'{prefix}*' with extension {exts}"),
            None => format!("extension {exts}"),
        }
    }
}

/// File extracted from a container
#[derive(Debug, Clone)]
pub struct InnerFile {
    /// Full path inside the container
    pub path: String,
    /// Uncompressed contents
    pub data: Vec<u8>,
}

impl InnerFile {
    /// File name without directories or extension
    pub fn stem(&self) -> &str {
        let name = base_name(&self.path);
        name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name)
    }
}

/// Last path segment
pub fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Extract every regular file from a zip container
pub fn read_entries(bytes: &[u8]) -> FormatResult<Vec<InnerFile>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| FormatError::Container(format!("Failed to open ZIP: {e}")))?;

    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| FormatError::Container(format!("Failed to read ZIP entry: {e}")))?;
        if file.is_dir() {
            continue;
        }
        let path = file.name().to_string();
        let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut data)
            .map_err(|e| FormatError::Container(format!("Failed to read {path}: {e}")))?;
        entries.push(InnerFile { path, data });
    }

    debug!("Read {} files from {} byte container", entries.len(), bytes.len());
    Ok(entries)
}

/// Pick a decoder from the inner file extensions
pub fn detect_format(entries: &[InnerFile], layout: &ArchiveLayout) -> Option<FileFormat> {
    if entries
        .iter()
        .any(|e| layout.accepts(&e.path, SPREADSHEET_EXTENSIONS))
    {
        return Some(FileFormat::Spreadsheet);
    }
    if entries
        .iter()
        .any(|e| layout.accepts(&e.path, DELIMITED_EXTENSIONS))
    {
        return Some(FileFormat::Delimited);
    }
    None
}

pub(crate) fn no_match(
    entries: &[InnerFile],
    layout: &ArchiveLayout,
    extensions: &[&str],
) -> FormatError {
    let found = if entries.is_empty() {
        "empty container".to_string()
    } else {
        entries
            .iter()
            .map(|e| e.path.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    FormatError::NoMatchingEntry {
        expected: layout.describe(extensions),
        found,
    }
}

/// Decode a zipped archive into a table mapping
///
/// `format` comes from the catalog entry when declared; otherwise it is inferred
/// from the inner file extensions.
///
/// # Errors
/// [`FormatError`] when the container is unreadable, no inner file matches the
/// expected pattern, or an inner file is malformed.
pub fn decode_archive(
    bytes: &[u8],
    format: Option<FileFormat>,
    layout: &ArchiveLayout,
) -> FormatResult<DecodedResult> {
    let entries = read_entries(bytes)?;

    let format = match format {
        Some(format) => format,
        None => detect_format(&entries, layout).ok_or_else(|| {
            let mut all = DELIMITED_EXTENSIONS.to_vec();
            all.extend_from_slice(SPREADSHEET_EXTENSIONS);
            no_match(&entries, layout, &all)
        })?,
    };
    debug!(format = %format, "Decoding archive");

    let tables = match format {
        FileFormat::Delimited => delimited::decode_entries(&entries, layout)?,
        FileFormat::Spreadsheet => spreadsheet::decode_entries(&entries, layout)?,
    };
    Ok(DecodedResult::Tables(tables))
}
