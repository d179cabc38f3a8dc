//! JSON decoders
//!
//! Two shapes are understood for indicators:
//! - a mapping of series name to `[[timestamp, value], ...]` pairs, with RFC 3339
//!   or epoch-millisecond timestamps
//! - the provider's native document, `{"indicator": {"values": [...]}}`, where each
//!   value carries `datetime_utc`, `geo_name` and `value`
//!
//! Both become one table indexed by the union of timestamps in local time.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::{FormatError, FormatResult};
use crate::timezone::Timezone;
use crate::{Cell, Table};

/// Parse a JSON document whose top level must be an object
pub fn parse_nested(body: &[u8]) -> FormatResult<Map<String, Value>> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(FormatError::Json(format!(
            "expected a JSON object, got {}",
            type_name(&other)
        ))),
        Err(e) => Err(FormatError::Json(e.to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct NativeDocument {
    indicator: NativeIndicator,
}

#[derive(Debug, Deserialize)]
struct NativeIndicator {
    #[serde(default)]
    name: Option<String>,
    values: Vec<NativeValue>,
}

#[derive(Debug, Deserialize)]
struct NativeValue {
    value: Value,
    datetime_utc: String,
    #[serde(default)]
    geo_name: Option<String>,
}

/// One named series of (instant, value) points in source order
struct Series {
    name: String,
    points: Vec<(DateTime<Utc>, Cell)>,
}

/// Decode an indicator payload into a timestamp-indexed table
///
/// # Errors
/// [`FormatError::Json`] for malformed documents, [`FormatError::InvalidValue`] for
/// unusable timestamps or values, [`FormatError::UnorderedTimestamps`] when a
/// series repeats or goes back in time.
pub fn decode_indicator(body: &[u8], tz: &dyn Timezone) -> FormatResult<Table> {
    let document = parse_nested(body)?;
    let series = if document.contains_key("indicator") {
        native_series(Value::Object(document))?
    } else {
        mapped_series(document)?
    };

    for s in &series {
        check_ordering(s)?;
    }
    build_table(series, tz)
}

fn native_series(document: Value) -> FormatResult<Vec<Series>> {
    let document: NativeDocument = serde_json::from_value(document)
        .map_err(|e| FormatError::Json(format!("indicator document: {e}")))?;
    let fallback = document
        .indicator
        .name
        .unwrap_or_else(|| "value".to_string());

    let mut series: Vec<Series> = Vec::new();
    for item in document.indicator.values {
        let name = item.geo_name.unwrap_or_else(|| fallback.clone());
        let instant = parse_timestamp(&Value::String(item.datetime_utc))?;
        let cell = parse_value(&name, item.value)?;
        match series.iter_mut().find(|s| s.name == name) {
            Some(existing) => existing.points.push((instant, cell)),
            None => series.push(Series {
                name,
                points: vec![(instant, cell)],
            }),
        }
    }
    Ok(series)
}

fn mapped_series(document: Map<String, Value>) -> FormatResult<Vec<Series>> {
    let mut series = Vec::new();
    for (name, value) in document {
        let Value::Array(pairs) = value else {
            tracing::debug!(key = %name, "Ignoring non-series key in indicator payload");
            continue;
        };
        let mut points = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let (timestamp, value) = match pair {
                Value::Array(mut items) if items.len() == 2 => {
                    let value = items.pop().unwrap_or(Value::Null);
                    let timestamp = items.pop().unwrap_or(Value::Null);
                    (timestamp, value)
                }
                other => {
                    return Err(FormatError::Json(format!(
                        "series '{name}': expected [timestamp, value], got {other}"
                    )))
                }
            };
            points.push((parse_timestamp(&timestamp)?, parse_value(&name, value)?));
        }
        series.push(Series { name, points });
    }
    Ok(series)
}

/// RFC 3339 string or epoch milliseconds
fn parse_timestamp(value: &Value) -> FormatResult<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| FormatError::InvalidValue(format!("timestamp '{s}': {e}"))),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .ok_or_else(|| FormatError::InvalidValue(format!("timestamp {n}"))),
        other => Err(FormatError::InvalidValue(format!(
            "timestamp must be a string or number, got {}",
            type_name(other)
        ))),
    }
}

fn parse_value(series: &str, value: Value) -> FormatResult<Cell> {
    match value {
        Value::Null => Ok(Cell::Empty),
        Value::Number(n) => n
            .as_f64()
            .map(Cell::Number)
            .ok_or_else(|| FormatError::InvalidValue(format!("series '{series}': {n}"))),
        Value::String(s) => s.trim().parse::<f64>().map(Cell::Number).map_err(|_| {
            FormatError::InvalidValue(format!("series '{series}': non-numeric value '{s}'"))
        }),
        other => Err(FormatError::InvalidValue(format!(
            "series '{series}': unexpected {}",
            type_name(&other)
        ))),
    }
}

fn check_ordering(series: &Series) -> FormatResult<()> {
    for pair in series.points.windows(2) {
        let (previous, current) = (pair[0].0, pair[1].0);
        if current <= previous {
            return Err(FormatError::UnorderedTimestamps {
                series: series.name.clone(),
                previous: previous.to_rfc3339(),
                current: current.to_rfc3339(),
            });
        }
    }
    Ok(())
}

fn build_table(series: Vec<Series>, tz: &dyn Timezone) -> FormatResult<Table> {
    let width = series.len();
    let mut rows: BTreeMap<DateTime<Utc>, Vec<Cell>> = BTreeMap::new();
    let mut columns = Vec::with_capacity(width);

    for (col, s) in series.into_iter().enumerate() {
        columns.push(s.name);
        for (instant, cell) in s.points {
            rows.entry(instant).or_insert_with(|| vec![Cell::Empty; width])[col] = cell;
        }
    }

    let index = rows.keys().map(|instant| tz.localize_utc(instant)).collect();
    Table::with_index(columns, index, rows.into_values().collect()).map_err(FormatError::Json)
}

/// Unit record field naming its owning participant
pub const UNIT_OWNER_FIELD: &str = "Sujeto del Mercado";
/// Unit record field with the unit code
pub const UNIT_CODE_FIELD: &str = "Código de UP";
/// Participant record field with the participant code
pub const PARTICIPANT_CODE_FIELD: &str = "Código de sujeto";
/// Participant record field with the participant name
pub const PARTICIPANT_NAME_FIELD: &str = "Nombre";

/// Records under the first key of a nested JSON archive
///
/// # Errors
/// [`FormatError::Json`] when the document is empty or its first value is not an
/// array of objects.
pub fn first_records(document: &Map<String, Value>) -> FormatResult<Vec<&Map<String, Value>>> {
    let (key, value) = document
        .iter()
        .next()
        .ok_or_else(|| FormatError::Json("empty JSON object".to_string()))?;
    let Value::Array(items) = value else {
        return Err(FormatError::Json(format!(
            "'{key}' should be an array, got {}",
            type_name(value)
        )));
    };
    items
        .iter()
        .map(|item| match item {
            Value::Object(record) => Ok(record),
            other => Err(FormatError::Json(format!(
                "'{key}' holds a {} instead of a record",
                type_name(other)
            ))),
        })
        .collect()
}

/// Join programming units to the name of their owning participant
///
/// Inner join of unit records (`Sujeto del Mercado`) on participant records
/// (`Código de sujeto`). One row per match, in unit order, with columns
/// `Código de UP` and `Nombre`.
///
/// # Errors
/// [`FormatError::Json`] when either document does not hold records.
pub fn join_unit_owners(
    units: &Map<String, Value>,
    participants: &Map<String, Value>,
) -> FormatResult<Table> {
    let units = first_records(units)?;
    let participants = first_records(participants)?;

    let mut by_code: BTreeMap<String, Vec<&Map<String, Value>>> = BTreeMap::new();
    for participant in participants {
        if let Some(code) = participant.get(PARTICIPANT_CODE_FIELD).and_then(key_text) {
            by_code.entry(code).or_default().push(participant);
        }
    }

    let mut table = Table::new(vec![
        UNIT_CODE_FIELD.to_string(),
        PARTICIPANT_NAME_FIELD.to_string(),
    ]);
    for unit in units {
        let Some(owner) = unit.get(UNIT_OWNER_FIELD).and_then(key_text) else {
            continue;
        };
        for participant in by_code.get(&owner).into_iter().flatten() {
            table
                .push_row(vec![
                    field_cell(unit.get(UNIT_CODE_FIELD)),
                    field_cell(participant.get(PARTICIPANT_NAME_FIELD)),
                ])
                .map_err(FormatError::Json)?;
        }
    }
    Ok(table)
}

/// Join key as text; numbers and strings compare by their printed form
fn key_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn field_cell(value: Option<&Value>) -> Cell {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Cell::Text(s.trim().to_string()),
        Some(Value::Number(n)) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Empty),
        Some(Value::Bool(b)) => Cell::Bool(*b),
        _ => Cell::Empty,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
