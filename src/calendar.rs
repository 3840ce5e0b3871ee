//! Month arithmetic on (year, month, day) triples.
//!
//! Statement closings are "day N of some month". Months shorter than N clamp
//! to their last day, so a card closing on the 31st closes Feb 29 in 2024,
//! Apr 30, and so on. Date-constructor overflow (Feb 31 -> Mar 2) is never
//! relied upon.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

/// Day of month on which a statement closes, validated to 1-31.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClosingDay(u32);

impl ClosingDay {
    pub fn new(day: u32) -> Option<Self> {
        (1..=31).contains(&day).then_some(ClosingDay(day))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Moves (year, month) by `offset` months. `month` is 1-based.
pub fn shift_month(year: i32, month: u32, offset: i32) -> (i32, u32) {
    let index = year * 12 + (month as i32 - 1) + offset;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

/// The closing date for `day` in the given month, clamped to the month's end.
pub fn closing_date(year: i32, month: u32, day: ClosingDay) -> Result<NaiveDate, TrackerError> {
    let clamped = day.get().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, clamped)
        .ok_or(TrackerError::DateOutOfRange { year, month })
}

/// The closing date `offset` months away from `anchor`'s month.
pub fn closing_for_offset(
    anchor: NaiveDate,
    offset: i32,
    day: ClosingDay,
) -> Result<NaiveDate, TrackerError> {
    let (year, month) = shift_month(anchor.year(), anchor.month(), offset);
    closing_date(year, month, day)
}

/// Whether `date` is a closing date of a card closing on `day`.
pub fn is_on_schedule(date: NaiveDate, day: ClosingDay) -> Result<bool, TrackerError> {
    Ok(closing_for_offset(date, 0, day)? == date)
}

/// Moves a date that rolled past the end of a short month back to that
/// month's clamped closing. Day 31 in February 2024 rolled over to March 2
/// and maps back to Feb 29. Any other date is returned unchanged.
pub fn realign_rolled_over(date: NaiveDate, day: ClosingDay) -> Result<NaiveDate, TrackerError> {
    let (year, month) = shift_month(date.year(), date.month(), -1);
    let short = days_in_month(year, month);
    if day.get() > short && date.day() == day.get() - short {
        return closing_date(year, month, day);
    }
    Ok(date)
}

/// The closing immediately before `closing` for the same closing day.
pub fn previous_closing(closing: NaiveDate, day: ClosingDay) -> Result<NaiveDate, TrackerError> {
    closing_for_offset(closing, -1, day)
}

/// `date` moved back by whole months, clamping the day.
pub fn months_before(date: NaiveDate, months: i32) -> Result<NaiveDate, TrackerError> {
    let (year, month) = shift_month(date.year(), date.month(), -months);
    let day = date.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).ok_or(TrackerError::DateOutOfRange { year, month })
}

/// Identifies one statement period of a card: the calendar closing date.
///
/// Rendered as `YYYY-MM-DD`, so recomputing a period from any month offset
/// yields the same key for the same closing date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeriodKey(NaiveDate);

impl PeriodKey {
    pub fn from_closing(closing: NaiveDate) -> Self {
        PeriodKey(closing)
    }

    pub fn closing_date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for PeriodKey {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(PeriodKey)
            .map_err(|_| TrackerError::InvalidPeriodKey { key: s.to_string() })
    }
}

impl TryFrom<String> for PeriodKey {
    type Error = TrackerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PeriodKey> for String {
    fn from(key: PeriodKey) -> Self {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn day(d: u32) -> ClosingDay {
        ClosingDay::new(d).unwrap()
    }

    #[test]
    fn test_closing_day_bounds() {
        assert!(ClosingDay::new(0).is_none());
        assert!(ClosingDay::new(32).is_none());
        assert_eq!(ClosingDay::new(1).map(ClosingDay::get), Some(1));
        assert_eq!(ClosingDay::new(31).map(ClosingDay::get), Some(31));
    }

    #[rstest]
    #[case(2024, 1, -1, (2023, 12))]
    #[case(2024, 1, -13, (2022, 12))]
    #[case(2024, 11, 2, (2025, 1))]
    #[case(2024, 6, 0, (2024, 6))]
    fn test_shift_month(
        #[case] year: i32,
        #[case] month: u32,
        #[case] offset: i32,
        #[case] expected: (i32, u32),
    ) {
        assert_eq!(shift_month(year, month, offset), expected);
    }

    #[rstest]
    #[case(2024, 2, 31, date(2024, 2, 29))]
    #[case(2023, 2, 31, date(2023, 2, 28))]
    #[case(2024, 4, 31, date(2024, 4, 30))]
    #[case(2024, 3, 31, date(2024, 3, 31))]
    #[case(2024, 2, 15, date(2024, 2, 15))]
    fn test_closing_date_clamps(
        #[case] year: i32,
        #[case] month: u32,
        #[case] closing: u32,
        #[case] expected: NaiveDate,
    ) {
        assert_eq!(closing_date(year, month, day(closing)).unwrap(), expected);
    }

    #[test]
    fn test_consecutive_closings_share_boundaries() {
        let closing = closing_for_offset(date(2024, 3, 10), 0, day(31)).unwrap();
        assert_eq!(closing, date(2024, 3, 31));
        let previous = previous_closing(closing, day(31)).unwrap();
        assert_eq!(previous, date(2024, 2, 29));
        // Stepping back from a clamped date must not lose the original day.
        let before = previous_closing(previous, day(31)).unwrap();
        assert_eq!(before, date(2024, 1, 31));
    }

    #[test]
    fn test_months_before_clamps() {
        assert_eq!(months_before(date(2024, 5, 31), 3).unwrap(), date(2024, 2, 29));
        assert_eq!(months_before(date(2024, 1, 20), 3).unwrap(), date(2023, 10, 20));
    }

    #[test]
    fn test_is_on_schedule() {
        assert!(is_on_schedule(date(2024, 2, 29), day(31)).unwrap());
        assert!(is_on_schedule(date(2024, 3, 15), day(15)).unwrap());
        assert!(!is_on_schedule(date(2024, 3, 16), day(15)).unwrap());
        assert!(!is_on_schedule(date(2024, 3, 2), day(31)).unwrap());
    }

    #[rstest]
    #[case::leap_feb(date(2024, 3, 2), 31, date(2024, 2, 29))]
    #[case::plain_feb(date(2023, 3, 3), 31, date(2023, 2, 28))]
    #[case::feb_30(date(2023, 3, 2), 30, date(2023, 2, 28))]
    #[case::april(date(2024, 5, 1), 31, date(2024, 4, 30))]
    #[case::real_second(date(2024, 3, 2), 2, date(2024, 3, 2))]
    #[case::on_schedule(date(2024, 3, 31), 31, date(2024, 3, 31))]
    #[case::not_rolled(date(2024, 3, 1), 31, date(2024, 3, 1))]
    fn test_realign_rolled_over(
        #[case] stored: NaiveDate,
        #[case] closing_day: u32,
        #[case] expected: NaiveDate,
    ) {
        assert_eq!(realign_rolled_over(stored, day(closing_day)).unwrap(), expected);
    }

    #[test]
    fn test_period_key_format_and_parse() {
        let key = PeriodKey::from_closing(date(2024, 1, 15));
        assert_eq!(key.to_string(), "2024-01-15");
        assert_eq!("2024-01-15".parse::<PeriodKey>().unwrap(), key);
        assert!(matches!(
            "2024_0_15".parse::<PeriodKey>(),
            Err(TrackerError::InvalidPeriodKey { .. })
        ));
    }

    #[test]
    fn test_period_key_serde_as_string() {
        let key = PeriodKey::from_closing(date(2023, 12, 5));
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"2023-12-05\"");
    }
}
