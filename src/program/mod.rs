//! Program report adapter
//!
//! Program reports are XML documents made of `SeriesTemporales` sections laid on a
//! time grid given by the document `Horizonte`. Each section holds a `Periodo` with
//! its own start, resolution and `Intervalo` entries (`Pos`, `Ctd`). The adapter
//! always produces exactly one table; which sections become which columns depends
//! on a rule fixed per resource name.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::decode::{FormatError, FormatResult};
use crate::timezone::Timezone;
use crate::{Cell, Table};

pub mod xml;

use xml::Element;

/// Term codes kept from a price breakdown report
const PRICE_TERMS: &[&str] = &["TCUh", "FEU"];

/// Price breakdown values are published in €/kWh
const PRICE_SCALE: f64 = 1000.0;

/// Post-processing options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramOptions {
    /// Sum rows per local day, indexed by local midnight
    pub aggregate_daily: bool,
}

/// How sections map to columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramRule {
    /// One column per programming unit; generation positive, demand negative
    UnitSchedule,
    /// One column per (price type, cost term) pair, scaled to €/MWh
    PriceBreakdown,
}

impl ProgramRule {
    /// Rule for a report name
    pub fn for_name(name: &str) -> Self {
        if name.to_ascii_lowercase().starts_with("pvpc") {
            ProgramRule::PriceBreakdown
        } else {
            ProgramRule::UnitSchedule
        }
    }
}

impl fmt::Display for ProgramRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramRule::UnitSchedule => write!(f, "unit_schedule"),
            ProgramRule::PriceBreakdown => write!(f, "price_breakdown"),
        }
    }
}

/// Evenly spaced UTC instants `[start, end)`
struct TimeGrid {
    start: DateTime<Utc>,
    step: Duration,
    len: usize,
}

impl TimeGrid {
    fn new(start: DateTime<Utc>, end: DateTime<Utc>, step: Duration) -> FormatResult<Self> {
        if end <= start {
            return Err(FormatError::InvalidValue(format!(
                "horizon end {end} is not after start {start}"
            )));
        }
        let span = (end - start).num_seconds();
        let len = usize::try_from(span / step.num_seconds()).unwrap_or(0);
        Ok(Self { start, step, len })
    }

    fn position_of(&self, instant: DateTime<Utc>) -> Option<usize> {
        let offset = (instant - self.start).num_seconds();
        let step = self.step.num_seconds();
        if offset < 0 || offset % step != 0 {
            return None;
        }
        usize::try_from(offset / step).ok().filter(|&p| p < self.len)
    }

    fn instants(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        (0..self.len).map(move |i| self.start + self.step * i as i32)
    }
}

/// Values of one section, placed on the grid
struct Section {
    column: String,
    points: Vec<(usize, f64)>,
}

/// Decode a program report into one table
///
/// # Errors
/// [`FormatError`] for malformed XML, missing horizon, period or unit elements,
/// unreadable values and positions outside the horizon.
pub fn decode_program(
    name: &str,
    body: &[u8],
    tz: &dyn Timezone,
    options: ProgramOptions,
) -> FormatResult<Table> {
    let rule = ProgramRule::for_name(name);
    let root = xml::parse_document(body)?;

    let (start, end) = parse_interval(root.require("Horizonte")?)?;
    let series: Vec<&Element> = root.children_named("SeriesTemporales").collect();

    let step = series
        .iter()
        .filter_map(|s| s.child("Periodo")?.value_of("Resolucion"))
        .map(parse_resolution)
        .collect::<FormatResult<Vec<_>>>()?
        .into_iter()
        .min()
        .unwrap_or_else(|| Duration::minutes(60));
    let grid = TimeGrid::new(start, end, step)?;

    let mut sections = Vec::with_capacity(series.len());
    for section in series {
        let parsed = match rule {
            ProgramRule::UnitSchedule => Some(unit_section(section, &grid)?),
            ProgramRule::PriceBreakdown => price_section(section, &grid)?,
        };
        sections.extend(parsed);
    }
    debug!(name, rule = %rule, sections = sections.len(), rows = grid.len, "Decoded program report");

    let table = build_table(&grid, sections, rule, tz)?;
    if options.aggregate_daily {
        aggregate_daily(&table, tz)
    } else {
        Ok(table)
    }
}

fn unit_section(series: &Element, grid: &TimeGrid) -> FormatResult<Section> {
    let (column, sign) = if let Some(unit) = series.value_of("UPEntrada") {
        (unit, 1.0)
    } else if let Some(unit) = series.value_of("UPSalida") {
        (unit, -1.0)
    } else {
        return Err(FormatError::MissingElement(
            "UPEntrada or UPSalida (in SeriesTemporales)".to_string(),
        ));
    };
    let points = period_points(series, grid, sign)?;
    Ok(Section {
        column: column.to_string(),
        points,
    })
}

fn price_section(series: &Element, grid: &TimeGrid) -> FormatResult<Option<Section>> {
    let (Some(price_type), Some(term)) = (
        series.value_of("TipoPrecio"),
        series.value_of("TerminoCosteHorario"),
    ) else {
        return Ok(None);
    };
    if !PRICE_TERMS.contains(&term) {
        return Ok(None);
    }
    let points = period_points(series, grid, PRICE_SCALE)?;
    Ok(Some(Section {
        column: format!("{price_type}_{term}"),
        points,
    }))
}

/// Grid positions and scaled quantities of a section's `Periodo`
fn period_points(series: &Element, grid: &TimeGrid, factor: f64) -> FormatResult<Vec<(usize, f64)>> {
    let period = series
        .child("Periodo")
        .ok_or_else(|| FormatError::MissingElement("Periodo (in SeriesTemporales)".to_string()))?;
    let (period_start, _) = parse_interval(period.require("IntervaloTiempo")?)?;
    let resolution = parse_resolution(period.require("Resolucion")?)?;

    period
        .children_named("Intervalo")
        .map(|interval| {
            let pos: i32 = parse_number(interval.require("Pos")?, "Pos")?;
            let quantity: f64 = parse_number(interval.require("Ctd")?, "Ctd")?;
            if pos < 1 {
                return Err(FormatError::InvalidValue(format!("position {pos} below 1")));
            }
            let instant = period_start + resolution * (pos - 1);
            let row = grid.position_of(instant).ok_or_else(|| {
                FormatError::InvalidValue(format!(
                    "position {pos} ({}) is outside the horizon",
                    instant.to_rfc3339()
                ))
            })?;
            Ok((row, quantity * factor))
        })
        .collect()
}

fn build_table(
    grid: &TimeGrid,
    sections: Vec<Section>,
    rule: ProgramRule,
    tz: &dyn Timezone,
) -> FormatResult<Table> {
    // sections of the same column add up
    let mut columns: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();
    for section in sections {
        let values = columns
            .entry(section.column)
            .or_insert_with(|| vec![None; grid.len]);
        for (row, value) in section.points {
            *values[row].get_or_insert(0.0) += value;
        }
    }

    // a unit with no entry for an hour is scheduled at zero
    let missing = match rule {
        ProgramRule::UnitSchedule => Cell::Number(0.0),
        ProgramRule::PriceBreakdown => Cell::Empty,
    };
    let rows = (0..grid.len)
        .map(|row| {
            columns
                .values()
                .map(|values| values[row].map(Cell::Number).unwrap_or_else(|| missing.clone()))
                .collect()
        })
        .collect();
    let index = grid.instants().map(|t| tz.localize_utc(&t)).collect();

    Table::with_index(columns.into_keys().collect(), index, rows).map_err(FormatError::InvalidValue)
}

/// Sum numeric cells per local day; a day with no numbers in a column stays empty
fn aggregate_daily(table: &Table, tz: &dyn Timezone) -> FormatResult<Table> {
    let Some(index) = table.index() else {
        return Ok(table.clone());
    };

    let mut days: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
    for (timestamp, row) in index.iter().zip(table.rows()) {
        let sums = days
            .entry(timestamp.date_naive())
            .or_insert_with(|| vec![None; row.len()]);
        for (sum, cell) in sums.iter_mut().zip(row) {
            if let Some(value) = cell.as_f64() {
                *sum.get_or_insert(0.0) += value;
            }
        }
    }

    let mut new_index = Vec::with_capacity(days.len());
    let mut rows = Vec::with_capacity(days.len());
    for (day, sums) in days {
        let midnight = tz.start_of_day(day).ok_or_else(|| {
            FormatError::InvalidValue(format!("no local midnight on {day}"))
        })?;
        new_index.push(midnight);
        rows.push(
            sums.into_iter()
                .map(|s| s.map(Cell::Number).unwrap_or(Cell::Empty))
                .collect(),
        );
    }
    Table::with_index(table.columns().to_vec(), new_index, rows).map_err(FormatError::InvalidValue)
}

/// `start/end` interval of UTC instants
fn parse_interval(raw: &str) -> FormatResult<(DateTime<Utc>, DateTime<Utc>)> {
    let (start, end) = raw
        .split_once('/')
        .ok_or_else(|| FormatError::InvalidValue(format!("interval '{raw}'")))?;
    Ok((parse_instant(start)?, parse_instant(end)?))
}

/// RFC 3339, or the report's minute-precision form `2021-05-31T22:00Z`
fn parse_instant(raw: &str) -> FormatResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M%:z") {
        return Ok(dt.with_timezone(&Utc));
    }
    raw.strip_suffix('Z')
        .and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| FormatError::InvalidValue(format!("timestamp '{raw}'")))
}

/// ISO 8601 durations in minutes or hours (`PT15M`, `PT60M`, `PT1H`)
fn parse_resolution(raw: &str) -> FormatResult<Duration> {
    let invalid = || FormatError::InvalidValue(format!("resolution '{raw}'"));
    let body = raw.trim().strip_prefix("PT").ok_or_else(invalid)?;
    let unit_at = body.char_indices().last().map(|(i, _)| i).ok_or_else(invalid)?;
    let (amount, unit) = body.split_at(unit_at);
    let amount: i64 = amount.parse().map_err(|_| invalid())?;
    let step = match unit {
        "M" => Duration::minutes(amount),
        "H" => Duration::hours(amount),
        _ => return Err(invalid()),
    };
    if step <= Duration::zero() {
        return Err(invalid());
    }
    Ok(step)
}

fn parse_number<T: std::str::FromStr>(raw: &str, field: &str) -> FormatResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| FormatError::InvalidValue(format!("{field} '{raw}'")))
}
