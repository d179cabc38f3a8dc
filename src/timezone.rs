//! Local timezone collaborator
//!
//! The provider publishes every file for a local (peninsular Spain) calendar day.
//! All date parameters are timezone-aware `DateTime<FixedOffset>` values produced
//! through a [`Timezone`], so no naive arithmetic happens on caller input.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc,
    Weekday,
};
use std::fmt::Debug;

/// Source of local UTC offsets
pub trait Timezone: Send + Sync + Debug {
    /// Human readable zone name
    fn name(&self) -> &str;

    /// Offset in effect at a UTC instant
    fn offset_at(&self, utc: &NaiveDateTime) -> FixedOffset;

    /// Convert a UTC instant to local time
    fn localize_utc(&self, utc: &DateTime<Utc>) -> DateTime<FixedOffset> {
        let offset = self.offset_at(&utc.naive_utc());
        utc.with_timezone(&offset)
    }

    /// Re-express any aware instant with the local offset
    fn to_local(&self, date: &DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        self.localize_utc(&date.with_timezone(&Utc))
    }

    /// Local calendar day of an aware instant, whatever offset it was written in
    fn local_date(&self, date: &DateTime<FixedOffset>) -> NaiveDate {
        self.to_local(date).date_naive()
    }

    /// Attach the local offset to a wall-clock time
    ///
    /// Returns the earliest match for ambiguous times and `None` for times
    /// skipped by a forward transition.
    fn localize(&self, local: &NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        let mut candidates = vec![
            self.offset_at(&(*local - Duration::hours(12))),
            self.offset_at(&(*local + Duration::hours(12))),
        ];
        candidates.sort_by_key(|o| std::cmp::Reverse(o.local_minus_utc()));
        candidates.dedup();

        candidates.into_iter().find_map(|offset| {
            let utc = *local - Duration::seconds(i64::from(offset.local_minus_utc()));
            if self.offset_at(&utc) == offset {
                offset.from_local_datetime(local).single()
            } else {
                None
            }
        })
    }

    /// Local midnight starting a calendar day
    fn start_of_day(&self, date: NaiveDate) -> Option<DateTime<FixedOffset>> {
        self.localize(&date.and_hms_opt(0, 0, 0)?)
    }
}

/// Central European Time with EU summer time rules (CET/CEST)
///
/// Summer time runs from 01:00 UTC on the last Sunday of March to 01:00 UTC on
/// the last Sunday of October. Only this rule is modelled, which matches
/// peninsular Spain from 1996 on; earlier dates get wrong offsets around the
/// old transition days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CentralEuropeanTime;

impl CentralEuropeanTime {
    const STANDARD_SECS: i32 = 3600;
    const SUMMER_SECS: i32 = 7200;

    fn last_sunday(year: i32, month: u32) -> Option<NaiveDate> {
        let first_of_next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        let last_day = first_of_next.pred_opt()?;
        let back = last_day.weekday().num_days_from_sunday();
        let sunday = last_day - Duration::days(i64::from(back));
        debug_assert_eq!(sunday.weekday(), Weekday::Sun);
        Some(sunday)
    }

    fn is_summer_time(utc: &NaiveDateTime) -> bool {
        let year = utc.year();
        let start = Self::last_sunday(year, 3).and_then(|d| d.and_hms_opt(1, 0, 0));
        let end = Self::last_sunday(year, 10).and_then(|d| d.and_hms_opt(1, 0, 0));
        match (start, end) {
            (Some(start), Some(end)) => *utc >= start && *utc < end,
            _ => false,
        }
    }
}

impl Timezone for CentralEuropeanTime {
    fn name(&self) -> &str {
        "Europe/Madrid"
    }

    fn offset_at(&self, utc: &NaiveDateTime) -> FixedOffset {
        let secs = if Self::is_summer_time(utc) {
            Self::SUMMER_SECS
        } else {
            Self::STANDARD_SECS
        };
        // both constants are well inside the valid offset range
        FixedOffset::east_opt(secs).unwrap_or_else(|| Utc.fix())
    }
}

/// Constant offset zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedZone {
    offset: FixedOffset,
    name: &'static str,
}

impl FixedZone {
    /// Zone with a fixed offset
    pub fn new(offset: FixedOffset, name: &'static str) -> Self {
        Self { offset, name }
    }

    /// UTC
    pub fn utc() -> Self {
        Self::new(Utc.fix(), "UTC")
    }
}

impl Timezone for FixedZone {
    fn name(&self) -> &str {
        self.name
    }

    fn offset_at(&self, _utc: &NaiveDateTime) -> FixedOffset {
        self.offset
    }
}
