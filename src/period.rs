//! Period keys and the granularities used to bucket transaction records.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::Error;

/// The time bucket size used when aggregating records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    /// One bucket per calendar year.
    Year,
    /// One bucket per (year, quarter).
    Quarter,
    /// One bucket per (year, quarter, month).
    Month,
}

/// The period unit of a growth series.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodUnit {
    /// Quarterly series, which get year-on-year and quarter-to-quarter growth.
    Quarter,
    /// Monthly series, which get month-to-month growth.
    Month,
}

impl From<PeriodUnit> for Granularity {
    fn from(unit: PeriodUnit) -> Self {
        match unit {
            PeriodUnit::Quarter => Granularity::Quarter,
            PeriodUnit::Month => Granularity::Month,
        }
    }
}

/// A year, (year, quarter) or (year, quarter, month) key.
///
/// Keys are ordered by year, then quarter, then month. A month key always
/// carries the quarter its month falls in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeriodKey {
    year: i32,
    quarter: Option<u8>,
    month: Option<u8>,
}

impl PeriodKey {
    /// A key covering the whole of `year`.
    pub fn year(year: i32) -> Self {
        Self {
            year,
            quarter: None,
            month: None,
        }
    }

    /// A key for one quarter of `year`.
    ///
    /// # Errors
    /// Returns [Error::InvalidPeriod] if `quarter` is not in `1..=4`.
    pub fn quarter(year: i32, quarter: u8) -> Result<Self, Error> {
        if !(1..=4).contains(&quarter) {
            return Err(Error::InvalidPeriod(format!(
                "quarter must be between 1 and 4, got {quarter}"
            )));
        }

        Ok(Self {
            year,
            quarter: Some(quarter),
            month: None,
        })
    }

    /// A key for one month of `year`. The quarter is derived from the month.
    ///
    /// # Errors
    /// Returns [Error::InvalidPeriod] if `month` is not in `1..=12`.
    pub fn month(year: i32, month: u8) -> Result<Self, Error> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidPeriod(format!(
                "month must be between 1 and 12, got {month}"
            )));
        }

        Ok(Self {
            year,
            quarter: Some(quarter_of_month(month)),
            month: Some(month),
        })
    }

    /// The calendar year.
    pub fn get_year(&self) -> i32 {
        self.year
    }

    /// The quarter (1-4), if this is a quarter or month key.
    pub fn get_quarter(&self) -> Option<u8> {
        self.quarter
    }

    /// The month (1-12), if this is a month key.
    pub fn get_month(&self) -> Option<u8> {
        self.month
    }

    /// Coarsen the key to `granularity`.
    ///
    /// Asking for a finer granularity than the key has returns the key as is.
    pub fn truncate(self, granularity: Granularity) -> Self {
        match granularity {
            Granularity::Year => Self::year(self.year),
            Granularity::Quarter => Self {
                month: None,
                ..self
            },
            Granularity::Month => self,
        }
    }

    /// Whether the key has exactly the shape of a `unit` series.
    pub fn matches_unit(&self, unit: PeriodUnit) -> bool {
        match unit {
            PeriodUnit::Quarter => self.quarter.is_some() && self.month.is_none(),
            PeriodUnit::Month => self.month.is_some(),
        }
    }

    /// The same quarter or month one year earlier.
    pub fn one_year_earlier(self) -> Self {
        Self {
            year: self.year - 1,
            ..self
        }
    }

    /// The preceding month, wrapping January to December of the previous year.
    ///
    /// Returns `None` for keys without a month.
    pub fn previous_month(self) -> Option<Self> {
        let month = self.month?;

        let (year, month) = if month == 1 {
            (self.year - 1, 12)
        } else {
            (self.year, month - 1)
        };

        Some(Self {
            year,
            quarter: Some(quarter_of_month(month)),
            month: Some(month),
        })
    }
}

impl Display for PeriodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.quarter, self.month) {
            (_, Some(month)) => write!(f, "{}-{:02}", self.year, month),
            (Some(quarter), None) => write!(f, "{}-Q{}", self.year, quarter),
            (None, None) => write!(f, "{}", self.year),
        }
    }
}

/// The quarter (1-4) that `month` (1-12) falls in.
pub(crate) fn quarter_of_month(month: u8) -> u8 {
    (month - 1) / 3 + 1
}
