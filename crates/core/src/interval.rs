use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::errors::ApplicationError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive calendar-day range selected by a user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatsInterval {
    start: NaiveDate,
    end: NaiveDate,
}

impl StatsInterval {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ApplicationError> {
        if end < start {
            return Err(ApplicationError::Validation(format!(
                "end date {} is before start date {}",
                end.format(DATE_FORMAT),
                start.format(DATE_FORMAT)
            )));
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, ApplicationError> {
        Self::new(parse_day("start", start)?, parse_day("end", end)?)
    }

    /// The `days` most recent days ending with (and including) `today`.
    pub fn trailing_days(today: NaiveDate, days: u32) -> Result<Self, ApplicationError> {
        if days == 0 {
            return Err(ApplicationError::Validation("day count must be at least 1".to_owned()));
        }
        let start = today - Duration::days(i64::from(days) - 1);
        Self::new(start, today)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// 00:00:00 UTC on the first day.
    pub fn start_bound(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    /// 23:59:59 UTC on the last day.
    pub fn end_bound(&self) -> DateTime<Utc> {
        end_of_day(self.end)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start_bound() && at <= self.end_bound()
    }

    pub fn label(&self) -> String {
        format!("{} to {}", self.start.format(DATE_FORMAT), self.end.format(DATE_FORMAT))
    }
}

pub fn end_of_day(day: NaiveDate) -> DateTime<Utc> {
    let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    day.and_time(last_second).and_utc()
}

fn parse_day(field: &str, raw: &str) -> Result<NaiveDate, ApplicationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApplicationError::Validation(format!("{field} date is required")));
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| ApplicationError::Validation(format!("invalid {field} date: {raw}")))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::StatsInterval;
    use crate::errors::ApplicationError;

    fn day(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn end_date_is_normalized_to_last_second_of_day() {
        let interval = StatsInterval::parse("2025-01-28", "2025-01-30").expect("valid interval");

        assert_eq!(
            interval.end_bound(),
            Utc.with_ymd_and_hms(2025, 1, 30, 23, 59, 59).single().expect("instant")
        );
        assert!(interval.contains(
            Utc.with_ymd_and_hms(2025, 1, 30, 22, 0, 0).single().expect("instant")
        ));
        assert!(!interval.contains(
            Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 1).single().expect("instant")
        ));
        assert!(interval.contains(
            Utc.with_ymd_and_hms(2025, 1, 28, 0, 0, 0).single().expect("instant")
        ));
    }

    #[test]
    fn rejects_inverted_range() {
        let error = StatsInterval::new(day(2025, 2, 1), day(2025, 1, 1)).expect_err("inverted");
        assert!(matches!(error, ApplicationError::Validation(ref message) if message.contains("before")));
    }

    #[test]
    fn rejects_malformed_and_missing_dates() {
        assert!(matches!(
            StatsInterval::parse("2025-13-01", "2025-01-30"),
            Err(ApplicationError::Validation(ref message)) if message.contains("invalid start date")
        ));
        assert!(matches!(
            StatsInterval::parse("2025-01-01", ""),
            Err(ApplicationError::Validation(ref message)) if message.contains("end date is required")
        ));
    }

    #[test]
    fn trailing_days_includes_today() {
        let interval = StatsInterval::trailing_days(day(2025, 1, 30), 7).expect("valid");
        assert_eq!(interval.start(), day(2025, 1, 24));
        assert_eq!(interval.end(), day(2025, 1, 30));
        assert_eq!(interval.label(), "2025-01-24 to 2025-01-30");
        assert!(StatsInterval::trailing_days(day(2025, 1, 30), 0).is_err());
    }
}
