use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Fractional digits kept for energy, duration and money values.
pub const CENT_SCALE: u32 = 2;

/// Rounds half away from zero to two fractional digits.
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CENT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// One completed charging session as reconstructed from a disconnect log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub connected_at: NaiveDateTime,
    pub disconnected_at: NaiveDateTime,
    pub user_id: String,
    pub plate: String,
    pub energy_kwh: Decimal,
    pub duration_hours: Decimal,
    pub cost_eur: Decimal,
}

/// Session records in log line order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTable {
    records: Vec<SessionRecord>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: SessionRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[SessionRecord] {
        &self.records
    }
}

impl FromIterator<SessionRecord> for SessionTable {
    fn from_iter<I: IntoIterator<Item = SessionRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReportPeriod {
    year: i32,
    month: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("month must be between 1 and 12, got {0}")]
    InvalidMonth(u32),
    #[error("period must be formatted as YYYY-MM, got {0:?}")]
    InvalidFormat(String),
}

impl ReportPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodError::InvalidMonth(month));
        }
        Ok(Self { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Steps back `months` calendar months, crossing year boundaries.
    pub fn months_before(&self, months: u32) -> Self {
        let index = self.year * 12 + self.month as i32 - 1 - months as i32;
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn contains(&self, timestamp: &NaiveDateTime) -> bool {
        timestamp.year() == self.year && timestamp.month() == self.month
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.month, self.year)
    }
}

impl FromStr for ReportPeriod {
    type Err = PeriodError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || PeriodError::InvalidFormat(value.to_string());
        let (year, month) = value.trim().split_once('-').ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}
