//! Calendar primitives used to describe what gets harvested: a [`Year`] and the
//! inclusive date span it covers.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};

/// A calendar year, e.g. `Year(2009)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Year(pub i32);

impl Year {
    pub fn get(self) -> i32 {
        self.0
    }

    /// Number of days in this year (365 or 366).
    pub fn days(self) -> Option<u32> {
        let period = self.get_date_period()?;
        Some(period.end.ordinal())
    }
}

impl Display for Year {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

impl From<i32> for Year {
    fn from(value: i32) -> Self {
        Year(value)
    }
}

/// An inclusive `[start, end]` date span.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StartEndDate {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl StartEndDate {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

pub trait DatePeriod {
    fn get_date_period(self) -> Option<StartEndDate>;
}

impl DatePeriod for Year {
    fn get_date_period(self) -> Option<StartEndDate> {
        Some(StartEndDate {
            start: NaiveDate::from_ymd_opt(self.0, 1, 1)?,
            end: NaiveDate::from_ymd_opt(self.0, 12, 31)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_period_bounds() {
        let period = Year(2009).get_date_period().unwrap();
        assert_eq!(period.start, NaiveDate::from_ymd_opt(2009, 1, 1).unwrap());
        assert_eq!(period.end, NaiveDate::from_ymd_opt(2009, 12, 31).unwrap());
        assert!(period.contains(NaiveDate::from_ymd_opt(2009, 7, 1).unwrap()));
        assert!(!period.contains(NaiveDate::from_ymd_opt(2010, 1, 1).unwrap()));
    }

    #[test]
    fn test_days_in_year() {
        assert_eq!(Year(2009).days(), Some(365));
        assert_eq!(Year(2012).days(), Some(366));
        assert_eq!(Year(1900).days(), Some(365));
        assert_eq!(Year(2000).days(), Some(366));
    }

    #[test]
    fn test_year_display_is_zero_padded() {
        assert_eq!(Year(987).to_string(), "0987");
    }
}
