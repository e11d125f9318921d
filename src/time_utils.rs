// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time handling.
//!
//! Class start times are stored as UTC instants. Weekday, time-of-day and
//! holiday matching happen on the studio's wall clock, which is a fixed
//! offset from UTC.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, SecondsFormat, Timelike, Utc,
    Weekday,
};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type SharedClock = Arc<dyn Clock>;

/// Wall clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    micros: AtomicI64,
}

impl FixedClock {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            micros: AtomicI64::new(time.timestamp_micros()),
        }
    }

    pub fn set(&self, time: DateTime<Utc>) {
        self.micros.store(time.timestamp_micros(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        let delta = by.num_microseconds().unwrap_or(i64::MAX);
        self.micros.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.micros.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

/// The studio's local calendar.
#[derive(Debug, Clone, Copy)]
pub struct StudioCalendar {
    offset: FixedOffset,
}

impl StudioCalendar {
    /// Build a calendar `offset_minutes` east of UTC (negative for the west).
    ///
    /// Returns `None` when the offset is out of range (more than a day).
    pub fn from_offset_minutes(offset_minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(offset_minutes.checked_mul(60)?).map(|offset| Self { offset })
    }

    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }

    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.local(instant).date_naive()
    }

    pub fn weekday(&self, instant: DateTime<Utc>) -> Weekday {
        use chrono::Datelike;
        self.local(instant).weekday()
    }

    /// Local time of day truncated to the minute.
    pub fn time_of_day(&self, instant: DateTime<Utc>) -> NaiveTime {
        truncate_to_minute(self.local(instant).time())
    }

    /// UTC instant for a local date and time.
    pub fn to_utc(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let local = date.and_time(time);
        (local - self.offset).and_utc()
    }

    /// `[start, end)` of a local calendar day, as UTC instants.
    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.to_utc(date, NaiveTime::MIN);
        (start, start + Duration::days(1))
    }
}

impl Default for StudioCalendar {
    fn default() -> Self {
        Self::utc()
    }
}

/// Drop seconds and sub-second precision.
pub fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_local_weekday_crosses_midnight() {
        // 01:30 UTC on a Tuesday is still Monday evening at UTC-3.
        let cal = StudioCalendar::from_offset_minutes(-180).unwrap();
        let start = instant("2026-06-02T01:30:00Z");

        assert_eq!(cal.weekday(start), Weekday::Mon);
        assert_eq!(
            cal.local_date(start),
            NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
        );
        assert_eq!(
            cal.time_of_day(start),
            NaiveTime::from_hms_opt(22, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_to_utc_round_trips_through_local() {
        let cal = StudioCalendar::from_offset_minutes(-180).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();

        let utc = cal.to_utc(date, time);
        assert_eq!(utc, instant("2026-03-10T12:00:00Z"));
        assert_eq!(cal.local_date(utc), date);
        assert_eq!(cal.time_of_day(utc), time);
    }

    #[test]
    fn test_out_of_range_offset_rejected() {
        assert!(StudioCalendar::from_offset_minutes(24 * 60).is_none());
        assert!(StudioCalendar::from_offset_minutes(i32::MAX).is_none());
    }

    #[test]
    fn test_fixed_clock_advances() {
        let clock = FixedClock::new(instant("2026-01-05T10:00:00Z"));
        clock.advance(Duration::minutes(90));
        assert_eq!(clock.now(), instant("2026-01-05T11:30:00Z"));
    }

    #[test]
    fn test_format_utc_rfc3339() {
        assert_eq!(
            format_utc_rfc3339(instant("2026-01-05T10:00:00.250Z")),
            "2026-01-05T10:00:00Z"
        );
    }
}
