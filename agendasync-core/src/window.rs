//! Rolling agenda window.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::constants::EXTERNAL_TIMESTAMP_FORMAT;
use crate::error::{SyncError, SyncResult};

/// Inclusive window of agenda start times fetched on each run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

impl SyncWindow {
    /// `[today 00:00:00, today + days 23:59:59]`
    pub fn upcoming(today: NaiveDate, days: i64) -> Self {
        let last_day = today + Duration::days(days);
        SyncWindow {
            from: today.and_time(NaiveTime::MIN),
            to: last_day.and_time(end_of_day()),
        }
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.from <= at && at <= self.to
    }

    pub fn from_external(&self) -> String {
        format_timestamp(self.from)
    }

    pub fn to_external(&self) -> String {
        format_timestamp(self.to)
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

/// Parse a `YYYY-MM-DD HH:MM:SS` agenda timestamp.
pub fn parse_timestamp(s: &str) -> SyncResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), EXTERNAL_TIMESTAMP_FORMAT)
        .map_err(|_| SyncError::InvalidTimestamp(s.to_string()))
}

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(EXTERNAL_TIMESTAMP_FORMAT).to_string()
}

/// Whole minutes between two instants.
pub fn minutes_between(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    (end - start).num_minutes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upcoming_window_spans_whole_days() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let window = SyncWindow::upcoming(today, 7);

        assert_eq!(window.from_external(), "2024-01-10 00:00:00");
        assert_eq!(window.to_external(), "2024-01-17 23:59:59");
    }

    #[test]
    fn test_parse_timestamp_rejects_iso_format() {
        assert!(parse_timestamp("2024-01-10 09:00:00").is_ok());
        assert!(matches!(
            parse_timestamp("2024-01-10T09:00:00"),
            Err(SyncError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_minutes_between() {
        let start = parse_timestamp("2024-01-10 09:00:00").unwrap();
        let end = parse_timestamp("2024-01-10 09:20:00").unwrap();
        assert_eq!(minutes_between(start, end), 20);
    }
}
