//! Data resolutions and request time ranges.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tigo_core::{RangeLimits, Result, TigoError};

/// Timestamp format the API expects for `start` / `end` parameters.
pub const API_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
];

/// Parses the timestamp layouts the API emits in CSV data.
///
/// A bare date parses as midnight.
///
/// # Examples
///
/// ```
/// use tigo_client::range::parse_timestamp;
///
/// let a = parse_timestamp("2024/06/01 13:45:00").unwrap();
/// let b = parse_timestamp("2024-06-01T13:45").unwrap();
/// assert_eq!(a, b);
/// assert!(parse_timestamp("yesterday").is_none());
/// ```
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    // Fractional seconds are dropped
    let raw = raw.split_once('.').map_or(raw, |(head, _)| head);

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            ["%Y-%m-%d", "%Y/%m/%d"]
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

/// Resolution of time-series data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataLevel {
    Minute,
    Hour,
    Day,
}

impl DataLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }

    /// Spacing between consecutive samples.
    pub fn step(&self) -> TimeDelta {
        match self {
            Self::Minute => TimeDelta::minutes(1),
            Self::Hour => TimeDelta::hours(1),
            Self::Day => TimeDelta::days(1),
        }
    }

    /// Longest span a single request may cover at this resolution.
    pub fn max_span(&self, limits: &RangeLimits) -> TimeDelta {
        let days = match self {
            Self::Minute => limits.minute_days,
            Self::Hour => limits.hour_days,
            Self::Day => limits.day_days,
        };
        TimeDelta::days(i64::from(days))
    }
}

impl fmt::Display for DataLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataLevel {
    type Err = TigoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minute" | "min" | "minutes" => Ok(Self::Minute),
            "hour" | "hourly" | "hours" => Ok(Self::Hour),
            "day" | "daily" | "days" => Ok(Self::Day),
            other => Err(TigoError::InvalidLevel(other.to_string())),
        }
    }
}

/// A half-open `[start, end)` interval of site-local wall-clock time.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use chrono::TimeDelta;
/// use tigo_client::range::TimeRange;
///
/// let now = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap().and_hms_opt(12, 0, 0).unwrap();
/// let range = TimeRange::days_back(now, 3).unwrap();
/// let chunks = range.split(TimeDelta::days(1));
///
/// assert_eq!(chunks.len(), 3);
/// assert_eq!(chunks[0].start, range.start);
/// assert_eq!(chunks[2].end, range.end);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start >= end {
            return Err(TigoError::InvalidTimeRange {
                start: start.format(API_TIME_FORMAT).to_string(),
                end: end.format(API_TIME_FORMAT).to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parses both ends with [`parse_timestamp`].
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let parse = |raw: &str| {
            parse_timestamp(raw).ok_or_else(|| TigoError::InvalidTimeRange {
                start: start.to_string(),
                end: end.to_string(),
            })
        };
        Self::new(parse(start)?, parse(end)?)
    }

    /// From local midnight to `now`.
    ///
    /// Right at midnight the range is widened to one minute so it stays
    /// non-empty.
    pub fn today(now: NaiveDateTime) -> Self {
        let start = now.date().and_time(NaiveTime::MIN);
        let end = now.max(start + TimeDelta::minutes(1));
        Self { start, end }
    }

    /// The `days` days ending at `now`.
    pub fn days_back(now: NaiveDateTime, days: u32) -> Result<Self> {
        Self::ending_at(now, TimeDelta::days(i64::from(days)))
    }

    /// The `hours` hours ending at `now`.
    pub fn last_hours(now: NaiveDateTime, hours: u32) -> Result<Self> {
        Self::ending_at(now, TimeDelta::hours(i64::from(hours)))
    }

    fn ending_at(now: NaiveDateTime, span: TimeDelta) -> Result<Self> {
        let start = now
            .checked_sub_signed(span)
            .ok_or_else(|| TigoError::InvalidTimeRange {
                start: format!("{} - {}s", now.format(API_TIME_FORMAT), span.num_seconds()),
                end: now.format(API_TIME_FORMAT).to_string(),
            })?;
        Self::new(start, now)
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Splits into consecutive chunks no longer than `max_span`.
    ///
    /// Chunks do not overlap and together cover exactly this range.
    pub fn split(&self, max_span: TimeDelta) -> Vec<Self> {
        if max_span <= TimeDelta::zero() || self.duration() <= max_span {
            return vec![*self];
        }

        let mut chunks = Vec::new();
        let mut cursor = self.start;
        while cursor < self.end {
            let next = (cursor + max_span).min(self.end);
            chunks.push(Self {
                start: cursor,
                end: next,
            });
            cursor = next;
        }
        chunks
    }

    pub fn start_param(&self) -> String {
        self.start.format(API_TIME_FORMAT).to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format(API_TIME_FORMAT).to_string()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} .. {}", self.start_param(), self.end_param())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_level_round_trip_names() {
        assert_eq!("minute".parse::<DataLevel>().unwrap(), DataLevel::Minute);
        assert_eq!("MIN".parse::<DataLevel>().unwrap(), DataLevel::Minute);
        assert_eq!("hourly".parse::<DataLevel>().unwrap(), DataLevel::Hour);
        assert_eq!(" Day ".parse::<DataLevel>().unwrap(), DataLevel::Day);
        assert_eq!(DataLevel::Hour.to_string(), "hour");
    }

    #[test]
    fn test_level_invalid() {
        let err = "weekly".parse::<DataLevel>().unwrap_err();
        assert!(matches!(err, TigoError::InvalidLevel(ref s) if s == "weekly"));
    }

    #[test]
    fn test_level_max_span() {
        let limits = RangeLimits::default();
        assert_eq!(DataLevel::Minute.max_span(&limits), TimeDelta::days(1));
        assert_eq!(DataLevel::Hour.max_span(&limits), TimeDelta::days(31));
        assert_eq!(DataLevel::Day.max_span(&limits), TimeDelta::days(366));
    }

    #[test]
    fn test_range_rejects_inverted() {
        let err = TimeRange::new(at(2024, 6, 2, 0, 0), at(2024, 6, 1, 0, 0)).unwrap_err();
        assert!(matches!(err, TigoError::InvalidTimeRange { .. }));
        assert!(TimeRange::new(at(2024, 6, 1, 0, 0), at(2024, 6, 1, 0, 0)).is_err());
    }

    #[test]
    fn test_today() {
        let range = TimeRange::today(at(2024, 6, 1, 14, 30));
        assert_eq!(range.start, at(2024, 6, 1, 0, 0));
        assert_eq!(range.end, at(2024, 6, 1, 14, 30));
    }

    #[test]
    fn test_today_at_midnight_is_not_empty() {
        let range = TimeRange::today(at(2024, 6, 1, 0, 0));
        assert!(range.start < range.end);
        assert_eq!(range.duration(), TimeDelta::minutes(1));
    }

    #[test]
    fn test_days_back_zero_is_error() {
        assert!(TimeRange::days_back(at(2024, 6, 1, 0, 0), 0).is_err());
    }

    #[test]
    fn test_days_back_out_of_calendar_is_error() {
        let err = TimeRange::days_back(at(2024, 6, 10, 12, 0), 200_000_000).unwrap_err();
        assert!(matches!(err, TigoError::InvalidTimeRange { .. }));
        assert!(TimeRange::last_hours(at(2024, 6, 10, 12, 0), u32::MAX).is_err());
        assert_eq!(
            TimeRange::days_back(at(2024, 6, 10, 12, 0), 2).unwrap().start,
            at(2024, 6, 8, 12, 0)
        );
    }

    #[test]
    fn test_split_exact_and_remainder() {
        let range = TimeRange::new(at(2024, 6, 1, 0, 0), at(2024, 6, 3, 12, 0)).unwrap();
        let chunks = range.split(TimeDelta::days(1));
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].end, chunks[1].start);
        assert_eq!(chunks[1].end, chunks[2].start);
        assert_eq!(chunks[2].duration(), TimeDelta::hours(12));
    }

    #[test]
    fn test_split_short_range_unchanged() {
        let range = TimeRange::last_hours(at(2024, 6, 1, 12, 0), 6).unwrap();
        assert_eq!(range.split(TimeDelta::days(1)), vec![range]);
    }

    #[test]
    fn test_params_format() {
        let range = TimeRange::new(at(2024, 6, 1, 0, 0), at(2024, 6, 1, 23, 59)).unwrap();
        assert_eq!(range.start_param(), "2024-06-01T00:00:00");
        assert_eq!(range.end_param(), "2024-06-01T23:59:00");
        assert_eq!(range.to_string(), "2024-06-01T00:00:00 .. 2024-06-01T23:59:00");
    }

    #[test]
    fn test_parse_range_from_dates() {
        let range = TimeRange::parse("2024-06-01", "2024-06-02 06:00").unwrap();
        assert_eq!(range.start, at(2024, 6, 1, 0, 0));
        assert_eq!(range.end, at(2024, 6, 2, 6, 0));
        assert!(TimeRange::parse("soon", "2024-06-02").is_err());
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = at(2024, 6, 1, 13, 45);
        assert_eq!(parse_timestamp("2024/06/01 13:45:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-06-01 13:45:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-06-01T13:45:00.000"), Some(expected));
        assert_eq!(parse_timestamp(" 2024-06-01 13:45 "), Some(expected));
        assert_eq!(parse_timestamp(""), None);
    }
}
