use std::{fmt, str::FromStr};

use serde::{Serialize, Serializer};
use time::{Date, Duration, Month};

pub fn days_in_month(date: Date) -> u32 {
    u32::from(time::util::days_in_year_month(date.year(), date.month()))
}

/// Days elapsed in the month, today included (the 1st returns 1).
pub fn days_elapsed(date: Date) -> u32 {
    u32::from(date.day())
}

pub fn month_start(date: Date) -> Date {
    date - Duration::days(i64::from(date.day()) - 1)
}

pub fn month_end(date: Date) -> Date {
    month_start(date) + Duration::days(i64::from(days_in_month(date)) - 1)
}

/// Week bucket inside the month: days 1-7 are week 1, 29-31 week 5.
pub fn week_of_month(date: Date) -> u32 {
    days_elapsed(date).div_ceil(7)
}

pub fn is_weekend(date: Date) -> bool {
    matches!(
        date.weekday(),
        time::Weekday::Saturday | time::Weekday::Sunday
    )
}

/// A calendar month, written `YYYY-MM` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    first_day: Date,
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid month format (use YYYY-MM)")]
pub struct InvalidMonth;

impl MonthKey {
    pub fn containing(date: Date) -> Self {
        Self {
            first_day: month_start(date),
        }
    }

    pub fn first_day(&self) -> Date {
        self.first_day
    }

    /// Exclusive upper bound of the month.
    pub fn next_month_first_day(&self) -> Date {
        self.first_day + Duration::days(i64::from(days_in_month(self.first_day)))
    }

    pub fn year(&self) -> i32 {
        self.first_day.year()
    }

    pub fn month(&self) -> Month {
        self.first_day.month()
    }

    pub fn contains(&self, date: Date) -> bool {
        date >= self.first_day && date < self.next_month_first_day()
    }
}

impl FromStr for MonthKey {
    type Err = InvalidMonth;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s.trim().split_once('-').ok_or(InvalidMonth)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(InvalidMonth);
        }
        let year: i32 = year.parse().map_err(|_| InvalidMonth)?;
        let month: u8 = month.parse().map_err(|_| InvalidMonth)?;
        let month = Month::try_from(month).map_err(|_| InvalidMonth)?;
        let first_day = Date::from_calendar_date(year, month, 1).map_err(|_| InvalidMonth)?;
        Ok(Self { first_day })
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), u8::from(self.month()))
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::fixtures::day;

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(day(2024, 2, 10)), 29);
        assert_eq!(days_in_month(day(2023, 2, 10)), 28);
        assert_eq!(days_in_month(day(2024, 4, 1)), 30);
        assert_eq!(days_in_month(day(2024, 12, 31)), 31);
    }

    #[test]
    fn elapsed_is_inclusive() {
        assert_eq!(days_elapsed(day(2024, 6, 1)), 1);
        assert_eq!(days_elapsed(day(2024, 6, 15)), 15);
    }

    #[test]
    fn month_bounds() {
        let d = day(2024, 2, 17);
        assert_eq!(month_start(d), day(2024, 2, 1));
        assert_eq!(month_end(d), day(2024, 2, 29));
    }

    #[test]
    fn week_buckets() {
        assert_eq!(week_of_month(day(2024, 6, 1)), 1);
        assert_eq!(week_of_month(day(2024, 6, 7)), 1);
        assert_eq!(week_of_month(day(2024, 6, 8)), 2);
        assert_eq!(week_of_month(day(2024, 6, 28)), 4);
        assert_eq!(week_of_month(day(2024, 6, 29)), 5);
    }

    #[test]
    fn weekend_detection() {
        // 2024-06-15 is a Saturday
        assert!(is_weekend(day(2024, 6, 15)));
        assert!(is_weekend(day(2024, 6, 16)));
        assert!(!is_weekend(day(2024, 6, 17)));
    }

    #[test]
    fn month_key_parse_and_display() {
        let key: MonthKey = "2024-12".parse().expect("valid");
        assert_eq!(key.first_day(), day(2024, 12, 1));
        assert_eq!(key.next_month_first_day(), day(2025, 1, 1));
        assert_eq!(key.to_string(), "2024-12");
        assert!(key.contains(day(2024, 12, 31)));
        assert!(!key.contains(day(2025, 1, 1)));
    }

    #[test]
    fn month_key_rejects_garbage() {
        for raw in ["2024", "2024-13", "24-01", "2024-1", "abcd-ef", ""] {
            assert!(raw.parse::<MonthKey>().is_err(), "{raw} should not parse");
        }
    }
}
