//! Delimited text decoder
//!
//! Provider files follow Spanish locale conventions: `;` separators, decimal comma,
//! `.` as thousands separator and `dd/mm/yyyy` dates. Column types are inferred per
//! column: a column is numeric (or date) only if every non-empty cell parses as such.

use chrono::{NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use std::collections::BTreeMap;
use tracing::debug;

use super::archive::{no_match, ArchiveLayout, InnerFile, DELIMITED_EXTENSIONS};
use super::{FormatError, FormatResult};
use crate::{Cell, Table};

const DATE_FORMAT: &str = "%d/%m/%Y";
const DATETIME_FORMATS: &[&str] = &["%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Number,
    Date,
    Text,
}

/// Decode every matching inner file into a table keyed by file stem
///
/// # Errors
/// [`FormatError::NoMatchingEntry`] when no file matches the layout.
pub fn decode_entries(
    entries: &[InnerFile],
    layout: &ArchiveLayout,
) -> FormatResult<BTreeMap<String, Table>> {
    let matching: Vec<&InnerFile> = entries
        .iter()
        .filter(|e| layout.accepts(&e.path, DELIMITED_EXTENSIONS))
        .collect();
    if matching.is_empty() {
        return Err(no_match(entries, layout, DELIMITED_EXTENSIONS));
    }

    let mut tables = BTreeMap::new();
    for entry in matching {
        let table = decode_text(&entry.path, &entry.data)?;
        let key = if tables.contains_key(entry.stem()) {
            entry.path.clone()
        } else {
            entry.stem().to_string()
        };
        debug!(file = %entry.path, rows = table.len(), "Decoded delimited file");
        tables.insert(key, table);
    }
    Ok(tables)
}

/// Decode one delimited text file; the first record is the header
pub fn decode_text(file: &str, data: &[u8]) -> FormatResult<Table> {
    let delimiter = sniff_delimiter(data);
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(data);

    let mut records: Vec<Vec<String>> = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(|e| FormatError::Delimited {
            file: file.to_string(),
            message: e.to_string(),
        })?;
        let fields: Vec<String> = record.iter().map(decode_field).collect();
        if fields.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        records.push(fields);
    }

    let mut records = records.into_iter();
    let Some(mut header) = records.next() else {
        return Err(FormatError::Delimited {
            file: file.to_string(),
            message: "no header row".to_string(),
        });
    };
    if let Some(first) = header.first_mut() {
        *first = first.trim_start_matches('\u{feff}').to_string();
    }
    let raw_rows: Vec<Vec<String>> = records.collect();

    let width = raw_rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0);
    let columns: Vec<String> = (0..width)
        .map(|i| match header.get(i).map(|h| h.trim()) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Unnamed: {i}"),
        })
        .collect();

    let raw_cell = |row: &Vec<String>, col: usize| -> String {
        row.get(col).map(|s| s.trim().to_string()).unwrap_or_default()
    };

    // trailing separators produce nameless, empty columns
    let keep: Vec<usize> = (0..width)
        .filter(|&i| {
            let named = header.get(i).is_some_and(|h| !h.trim().is_empty());
            named || raw_rows.iter().any(|row| !raw_cell(row, i).is_empty())
        })
        .collect();

    let types: Vec<ColumnType> = keep
        .iter()
        .map(|&i| infer_column_type(raw_rows.iter().map(|row| raw_cell(row, i))))
        .collect();

    let mut table = Table::new(keep.iter().map(|&i| columns[i].clone()).collect());
    for row in &raw_rows {
        let cells = keep
            .iter()
            .zip(&types)
            .map(|(&i, &ty)| convert_cell(&raw_cell(row, i), ty))
            .collect();
        table.push_row(cells).map_err(|message| FormatError::Delimited {
            file: file.to_string(),
            message,
        })?;
    }
    Ok(table)
}

/// Pick the separator from the first non-empty line: `;`, then tab, then `,`
pub fn sniff_delimiter(data: &[u8]) -> u8 {
    let line = data
        .split(|&b| b == b'\n')
        .find(|line| line.iter().any(|b| !b.is_ascii_whitespace()))
        .unwrap_or(&[]);
    if line.contains(&b';') {
        b';'
    } else if line.contains(&b'\t') {
        b'\t'
    } else {
        b','
    }
}

/// UTF-8 when valid, Latin-1 otherwise
fn decode_field(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

fn infer_column_type<I: Iterator<Item = String>>(values: I) -> ColumnType {
    let mut seen = false;
    let mut number = true;
    let mut date = true;
    for value in values.filter(|v| !v.is_empty()) {
        seen = true;
        number = number && parse_locale_number(&value).is_some();
        date = date && parse_locale_date(&value).is_some();
        if !number && !date {
            return ColumnType::Text;
        }
    }
    match (seen, number, date) {
        (false, _, _) => ColumnType::Text,
        (true, true, _) => ColumnType::Number,
        (true, false, true) => ColumnType::Date,
        _ => ColumnType::Text,
    }
}

fn convert_cell(value: &str, ty: ColumnType) -> Cell {
    if value.is_empty() {
        return Cell::Empty;
    }
    let converted = match ty {
        ColumnType::Number => parse_locale_number(value).map(Cell::Number),
        ColumnType::Date => parse_locale_date(value),
        ColumnType::Text => None,
    };
    converted.unwrap_or_else(|| Cell::Text(value.to_string()))
}

/// Parse a number written with decimal comma and optional `.` thousands groups
///
/// A single `.` without comma is read as a decimal point.
pub fn parse_locale_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if !s.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    if !s
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b',' | b'e' | b'E'))
    {
        return None;
    }

    let normalized = if s.contains(',') {
        if s.matches(',').count() > 1 {
            return None;
        }
        s.replace('.', "").replace(',', ".")
    } else if is_grouped_thousands(s) {
        s.replace('.', "")
    } else {
        s.to_string()
    };
    normalized.parse::<f64>().ok()
}

fn is_grouped_thousands(s: &str) -> bool {
    let digits = s.trim_start_matches(['+', '-']);
    let groups: Vec<&str> = digits.split('.').collect();
    groups.len() > 2
        && (1..=3).contains(&groups[0].len())
        && groups
            .iter()
            .all(|g| !g.is_empty() && g.bytes().all(|b| b.is_ascii_digit()))
        && groups[1..].iter().all(|g| g.len() == 3)
}

/// Parse `dd/mm/yyyy` with optional `HH:MM[:SS]`
pub fn parse_locale_date(raw: &str) -> Option<Cell> {
    let s = raw.trim();
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Cell::DateTime(dt));
        }
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .map(Cell::Date)
}
