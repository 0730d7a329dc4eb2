//! Regular calendars used as reindexing targets.

use crate::error::PipelineError;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Sampling frequency of a calendar, named after the usual pandas aliases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    /// Every calendar day.
    #[default]
    #[serde(rename = "D")]
    Daily,
    /// Monday through Friday.
    #[serde(rename = "B")]
    BusinessDaily,
    /// Every Sunday.
    #[serde(rename = "W")]
    Weekly,
}

impl Frequency {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "D",
            Self::BusinessDaily => "B",
            Self::Weekly => "W",
        }
    }
}

impl Display for Frequency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "D" => Ok(Self::Daily),
            "B" => Ok(Self::BusinessDaily),
            "W" | "W-SUN" => Ok(Self::Weekly),
            other => Err(PipelineError::InvalidFrequency {
                value: other.to_owned(),
            }),
        }
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// All dates between `start` and `end` (both inclusive) at `freq`.
///
/// Empty when `start > end`. Weekly calendars are anchored on Sundays, so the
/// first date is the first Sunday on or after `start`.
pub fn date_range(start: NaiveDate, end: NaiveDate, freq: Frequency) -> Vec<NaiveDate> {
    if start > end {
        return Vec::new();
    }

    let days = start.iter_days().take_while(|d| *d <= end);
    match freq {
        Frequency::Daily => days.collect(),
        Frequency::BusinessDaily => days.filter(|d| !is_weekend(*d)).collect(),
        Frequency::Weekly => {
            let offset = (7 - start.weekday().num_days_from_sunday() as i64) % 7;
            let first_sunday = start + Duration::days(offset);
            first_sunday
                .iter_weeks()
                .take_while(|d| *d <= end)
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn daily_range_is_inclusive() {
        let range = date_range(d(2024, 1, 1), d(2024, 1, 7), Frequency::Daily);
        assert_eq!(range.len(), 7);
        assert_eq!(range[0], d(2024, 1, 1));
        assert_eq!(range[6], d(2024, 1, 7));
    }

    #[test]
    fn single_day_range() {
        let range = date_range(d(2024, 1, 3), d(2024, 1, 3), Frequency::Daily);
        assert_eq!(range, vec![d(2024, 1, 3)]);
    }

    #[test]
    fn inverted_bounds_give_empty_range() {
        assert!(date_range(d(2024, 1, 5), d(2024, 1, 1), Frequency::Daily).is_empty());
    }

    #[test]
    fn business_days_skip_weekends() {
        // 2024-01-06/07 is a weekend
        let range = date_range(d(2024, 1, 1), d(2024, 1, 14), Frequency::BusinessDaily);
        assert_eq!(range.len(), 10);
        assert!(range.iter().all(|d| !is_weekend(*d)));
    }

    #[test]
    fn weekly_range_is_sunday_anchored() {
        // 2024-01-03 is a Wednesday, first Sunday after it is 2024-01-07
        let range = date_range(d(2024, 1, 3), d(2024, 1, 28), Frequency::Weekly);
        assert_eq!(
            range,
            vec![d(2024, 1, 7), d(2024, 1, 14), d(2024, 1, 21), d(2024, 1, 28)]
        );

        let from_sunday = date_range(d(2024, 1, 7), d(2024, 1, 13), Frequency::Weekly);
        assert_eq!(from_sunday, vec![d(2024, 1, 7)]);
    }

    #[test]
    fn parses_frequency_aliases() {
        assert_eq!("d".parse::<Frequency>().unwrap(), Frequency::Daily);
        assert_eq!("B".parse::<Frequency>().unwrap(), Frequency::BusinessDaily);
        assert_eq!("W-SUN".parse::<Frequency>().unwrap(), Frequency::Weekly);
        assert!(matches!(
            "H".parse::<Frequency>(),
            Err(PipelineError::InvalidFrequency { .. })
        ));
    }
}
