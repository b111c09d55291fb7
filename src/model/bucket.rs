//! Time buckets of the feed.
//!
//! The feed publishes one file per hour ("live") and one file per calendar
//! day ("archive"). Bucket boundaries are always wall-clock UTC+9, whatever
//! zone the process runs in.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Offset of the feed's wall clock from UTC, in seconds.
pub const FEED_UTC_OFFSET_SECS: i32 = 9 * 3600;

const SECS_PER_HOUR: i64 = 3600;

/// The fixed UTC+9 offset every bucket is expressed in.
///
/// # Panics
///
/// Never in practice: `FEED_UTC_OFFSET_SECS` is within chrono's accepted range.
#[must_use]
pub fn feed_offset() -> FixedOffset {
    FixedOffset::east_opt(FEED_UTC_OFFSET_SECS).expect("UTC+9 is a valid offset")
}

/// Convert epoch seconds to feed wall-clock time.
///
/// # Errors
///
/// Returns an error if the timestamp is outside chrono's representable range.
pub fn feed_time(ts: i64) -> Result<DateTime<FixedOffset>> {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.with_timezone(&feed_offset()))
        .ok_or_else(|| Error::InvalidArgument(format!("timestamp out of range: {ts}")))
}

/// Round epoch seconds down to the start of their hour.
///
/// The feed offset is a whole number of hours, so UTC and UTC+9 hour
/// boundaries coincide.
#[must_use]
pub const fn hour_floor(ts: i64) -> i64 {
    ts - ts.rem_euclid(SECS_PER_HOUR)
}

/// Interpret a naive wall-clock time as UTC+9.
pub(crate) fn at_feed_wall_clock(naive: NaiveDateTime) -> DateTime<FixedOffset> {
    let utc = naive - Duration::seconds(i64::from(FEED_UTC_OFFSET_SECS));
    DateTime::from_naive_utc_and_offset(utc, feed_offset())
}

/// Whether a walk step covers one hour or one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Hourly,
    Daily,
}

/// One fetchable unit of the feed.
///
/// Daily buckets always carry hour 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeBucket {
    date: NaiveDate,
    hour: u32,
    granularity: Granularity,
}

impl TimeBucket {
    /// The hourly bucket containing `at`.
    #[must_use]
    pub fn hourly(at: DateTime<FixedOffset>) -> Self {
        let local = at.with_timezone(&feed_offset());
        Self {
            date: local.date_naive(),
            hour: local.hour(),
            granularity: Granularity::Hourly,
        }
    }

    /// The hourly bucket for `hour` (0-23) of `date`.
    #[must_use]
    pub fn hourly_on(date: NaiveDate, hour: u32) -> Option<Self> {
        (hour < 24).then_some(Self {
            date,
            hour,
            granularity: Granularity::Hourly,
        })
    }

    /// The daily bucket for `date`.
    #[must_use]
    pub const fn daily(date: NaiveDate) -> Self {
        Self {
            date,
            hour: 0,
            granularity: Granularity::Daily,
        }
    }

    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    #[must_use]
    pub const fn hour(&self) -> u32 {
        self.hour
    }

    #[must_use]
    pub const fn granularity(&self) -> Granularity {
        self.granularity
    }

    #[must_use]
    pub fn year(&self) -> i32 {
        chrono::Datelike::year(&self.date)
    }

    #[must_use]
    pub fn month(&self) -> u32 {
        chrono::Datelike::month(&self.date)
    }

    #[must_use]
    pub fn day(&self) -> u32 {
        chrono::Datelike::day(&self.date)
    }

    /// Wall-clock start of the bucket.
    #[must_use]
    pub fn start(&self) -> DateTime<FixedOffset> {
        let midnight = self.date.and_time(NaiveTime::MIN);
        at_feed_wall_clock(midnight + Duration::hours(i64::from(self.hour)))
    }

    /// Wall-clock end of the bucket (exclusive).
    ///
    /// Daily buckets end at the start of the next calendar date, derived
    /// from the date rather than by adding 24 hours to the start.
    #[must_use]
    pub fn end(&self) -> DateTime<FixedOffset> {
        match self.granularity {
            Granularity::Hourly => self.start() + Duration::hours(1),
            Granularity::Daily => {
                let next = self.date + Duration::days(1);
                at_feed_wall_clock(next.and_time(NaiveTime::MIN))
            }
        }
    }

    #[must_use]
    pub fn start_ts(&self) -> i64 {
        self.start().timestamp()
    }

    #[must_use]
    pub fn end_ts(&self) -> i64 {
        self.end().timestamp()
    }

    /// Whether `ts` falls inside `[start, end)`.
    #[must_use]
    pub fn contains(&self, ts: i64) -> bool {
        (self.start_ts()..self.end_ts()).contains(&ts)
    }

    /// `YYYYMMDD`, the prefix lines in this bucket are dated with.
    #[must_use]
    pub fn date_pattern(&self) -> String {
        self.date.format("%Y%m%d").to_string()
    }

    /// `YYYYMMDDHH`, the identifier of an hourly resource.
    #[must_use]
    pub fn hour_pattern(&self) -> String {
        format!("{}{:02}", self.date_pattern(), self.hour)
    }

    /// The 24 hourly buckets making up this bucket's date.
    pub fn hours(&self) -> impl Iterator<Item = TimeBucket> + use<> {
        let date = self.date;
        (0..24).map(move |hour| Self {
            date,
            hour,
            granularity: Granularity::Hourly,
        })
    }
}

impl std::fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.granularity {
            Granularity::Hourly => write!(f, "{}T{:02}", self.date.format("%Y-%m-%d"), self.hour),
            Granularity::Daily => write!(f, "{}", self.date.format("%Y-%m-%d")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_hourly_bucket_uses_feed_clock() {
        // 2023-12-31 15:30 UTC is 2024-01-01 00:30 in UTC+9
        let utc = chrono::Utc.with_ymd_and_hms(2023, 12, 31, 15, 30, 0).unwrap();
        let bucket = TimeBucket::hourly(utc.fixed_offset());
        assert_eq!(bucket.date(), date(2024, 1, 1));
        assert_eq!(bucket.hour(), 0);
        assert_eq!(bucket.start_ts(), 1_704_034_800);
        assert_eq!(bucket.end_ts() - bucket.start_ts(), 3600);
        assert_eq!(bucket.to_string(), "2024-01-01T00");
    }

    #[test]
    fn test_daily_bucket_bounds() {
        let bucket = TimeBucket::daily(date(2024, 2, 28));
        assert_eq!(bucket.end_ts() - bucket.start_ts(), 86_400);
        assert_eq!(TimeBucket::daily(date(2024, 2, 29)).start_ts(), bucket.end_ts());
        assert!(bucket.contains(bucket.start_ts()));
        assert!(!bucket.contains(bucket.end_ts()));
        assert_eq!(bucket.to_string(), "2024-02-28");
    }

    #[test]
    fn test_patterns() {
        let bucket = TimeBucket::hourly_on(date(2024, 3, 5), 7).unwrap();
        assert_eq!(bucket.date_pattern(), "20240305");
        assert_eq!(bucket.hour_pattern(), "2024030507");
        assert_eq!((bucket.year(), bucket.month(), bucket.day()), (2024, 3, 5));
        assert!(TimeBucket::hourly_on(date(2024, 3, 5), 24).is_none());
    }

    #[test]
    fn test_hours_of_day_are_contiguous() {
        let day = TimeBucket::daily(date(2024, 1, 1));
        let hours: Vec<_> = day.hours().collect();
        assert_eq!(hours.len(), 24);
        assert_eq!(hours[0].start_ts(), day.start_ts());
        assert_eq!(hours[23].end_ts(), day.end_ts());
        for pair in hours.windows(2) {
            assert_eq!(pair[0].end_ts(), pair[1].start_ts());
        }
    }

    #[test]
    fn test_hour_floor() {
        assert_eq!(hour_floor(1_704_034_800 + 59 * 60), 1_704_034_800);
        assert_eq!(hour_floor(1_704_034_800), 1_704_034_800);
        assert_eq!(hour_floor(-1), -3600);
    }
}
