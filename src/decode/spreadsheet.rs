//! Workbook decoder
//!
//! Reads the first matching workbook of an archive. Every non-empty sheet becomes a
//! table keyed by its exact sheet name.
//!
//! Some daily and monthly reports open with an index sheet listing every other
//! sheet with a description. When the layout declares one, sheets the index marks
//! as reserved are left out.

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::io::Cursor;
use tracing::{debug, warn};

use super::archive::{no_match, ArchiveLayout, InnerFile, SPREADSHEET_EXTENSIONS};
use super::{FormatError, FormatResult};
use crate::{Cell, Table};

/// Decode the workbook inside an archive
///
/// # Errors
/// [`FormatError::NoMatchingEntry`] when no workbook matches the layout,
/// [`FormatError::Workbook`] when it cannot be read.
pub fn decode_entries(
    entries: &[InnerFile],
    layout: &ArchiveLayout,
) -> FormatResult<BTreeMap<String, Table>> {
    let mut matching = entries
        .iter()
        .filter(|e| layout.accepts(&e.path, SPREADSHEET_EXTENSIONS));
    let Some(workbook) = matching.next() else {
        return Err(no_match(entries, layout, SPREADSHEET_EXTENSIONS));
    };
    let ignored = matching.count();
    if ignored > 0 {
        warn!(
            file = %workbook.path,
            ignored,
            "Archive holds several workbooks, decoding the first one"
        );
    }
    decode_workbook(&workbook.data, layout)
}

/// Description the index sheet gives to placeholder sheets
const RESERVED_SHEET: &str = "Reservada";

/// Decode every non-empty sheet of a workbook
///
/// With an index sheet in the layout, the first sheet is read with its header at
/// that row and kept as a table; sheets it describes as reserved are skipped.
pub fn decode_workbook(data: &[u8], layout: &ArchiveLayout) -> FormatResult<BTreeMap<String, Table>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(data.to_vec()))
        .map_err(|e| FormatError::Workbook(format!("Failed to open workbook: {e}")))?;

    let mut names = workbook.sheet_names().into_iter();
    let mut tables = BTreeMap::new();
    let mut reserved = Vec::new();

    if let Some(header_row) = layout.index_header_row {
        if let Some(name) = names.next() {
            let range = workbook
                .worksheet_range(&name)
                .map_err(|e| FormatError::Workbook(format!("Failed to read sheet '{name}': {e}")))?;
            if let Some(index) = sheet_to_table(&range, header_row) {
                reserved = reserved_sheets(&index);
                debug!(sheet = %name, reserved = reserved.len(), "Decoded index sheet");
                tables.insert(name, index);
            }
        }
    }

    for name in names {
        if reserved.iter().any(|r| r == name.trim()) {
            debug!(sheet = %name, "Skipping reserved sheet");
            continue;
        }
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| FormatError::Workbook(format!("Failed to read sheet '{name}': {e}")))?;
        match sheet_to_table(&range, layout.skip_rows) {
            Some(table) => {
                debug!(sheet = %name, rows = table.len(), "Decoded sheet");
                tables.insert(name, table);
            }
            None => debug!(sheet = %name, "Skipping empty sheet"),
        }
    }
    Ok(tables)
}

/// Sheet names (first column) whose description (second column) marks them reserved
fn reserved_sheets(index: &Table) -> Vec<String> {
    let columns = index.columns();
    if columns.len() < 2 {
        return Vec::new();
    }
    (0..index.len())
        .filter(|&row| {
            matches!(index.get(row, &columns[1]), Some(Cell::Text(d)) if d == RESERVED_SHEET)
        })
        .filter_map(|row| index.get(row, &columns[0]))
        .filter(|cell| !cell.is_empty())
        .map(|cell| cell.to_string().trim().to_string())
        .collect()
}

/// Header is the first row after `skip_rows`; `None` when no data row follows it
fn sheet_to_table(range: &Range<Data>, skip_rows: usize) -> Option<Table> {
    let (first_row, first_col) = range.start()?;
    let lead = first_col as usize;

    let mut rows = range
        .rows()
        .enumerate()
        .filter(|(i, _)| first_row as usize + i >= skip_rows)
        .map(|(_, row)| {
            std::iter::repeat(Cell::Empty)
                .take(lead)
                .chain(row.iter().map(convert))
                .collect::<Vec<Cell>>()
        })
        .filter(|row| row.iter().any(|c| !c.is_empty()));

    let header = rows.next()?;
    let body: Vec<Vec<Cell>> = rows.collect();
    if body.is_empty() {
        return None;
    }

    let width = header.len();
    let columns = header
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell.to_string().trim() {
            "" => format!("Unnamed: {i}"),
            name => name.to_string(),
        })
        .collect();

    let mut table = Table::new(columns);
    for mut row in body {
        row.resize(width, Cell::Empty);
        // widths are equal after resize
        table.push_row(row).ok()?;
    }
    Some(table)
}

fn convert(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.trim().to_string()),
        Data::DateTime(dt) => excel_serial(dt.as_f64()),
        Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .map(Cell::DateTime)
            .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d").map(Cell::Date))
            .unwrap_or_else(|_| Cell::Text(s.clone())),
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

/// Excel serial day number (1900 system) to a date or date-time
fn excel_serial(serial: f64) -> Cell {
    let Some(epoch) = NaiveDate::from_ymd_opt(1899, 12, 30).and_then(|d| d.and_hms_opt(0, 0, 0))
    else {
        return Cell::Number(serial);
    };
    let millis = (serial * 86_400_000.0).round() as i64;
    let Some(value) = epoch.checked_add_signed(Duration::milliseconds(millis)) else {
        return Cell::Number(serial);
    };
    if serial.fract() == 0.0 {
        Cell::Date(value.date())
    } else {
        Cell::DateTime(value)
    }
}
