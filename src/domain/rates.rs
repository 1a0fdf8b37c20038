use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

/// Reimbursement rate in Cent/kWh per calendar year.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateTable {
    rates: BTreeMap<i32, Decimal>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateTableError {
    #[error("rate entry {0:?} must look like YEAR=RATE")]
    MalformedEntry(String),
    #[error("invalid year in rate entry {0:?}")]
    InvalidYear(String),
    #[error("invalid rate in rate entry {0:?}")]
    InvalidRate(String),
}

impl RateTable {
    pub fn new(rates: impl IntoIterator<Item = (i32, Decimal)>) -> Self {
        Self {
            rates: rates.into_iter().collect(),
        }
    }

    pub fn rate_for(&self, year: i32) -> Option<Decimal> {
        self.rates.get(&year).copied()
    }

    /// Label used in the report title block.
    pub fn describe(&self, year: i32) -> String {
        match self.rate_for(year) {
            Some(rate) => format!("{} Cent/kWh", rate.normalize()),
            None => "n/a".to_string(),
        }
    }
}

impl FromStr for RateTable {
    type Err = RateTableError;

    /// Parses `2024=33.5,2025=35.889`. Later entries for the same year win.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut rates = BTreeMap::new();

        for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (year, rate) = entry
                .split_once('=')
                .ok_or_else(|| RateTableError::MalformedEntry(entry.to_string()))?;
            let year = year
                .trim()
                .parse::<i32>()
                .map_err(|_| RateTableError::InvalidYear(entry.to_string()))?;
            let rate = Decimal::from_str(rate.trim())
                .ok()
                .filter(|rate| !rate.is_sign_negative())
                .ok_or_else(|| RateTableError::InvalidRate(entry.to_string()))?;
            rates.insert(year, rate);
        }

        Ok(Self { rates })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{RateTable, RateTableError};

    #[test]
    fn parses_year_rate_pairs() {
        let table: RateTable = "2024=33.5, 2025=35.889".parse().expect("table parses");

        assert_eq!(table.rate_for(2024), Some(Decimal::new(335, 1)));
        assert_eq!(table.rate_for(2025), Some(Decimal::new(35_889, 3)));
        assert_eq!(table.rate_for(2026), None);
    }

    #[test]
    fn describes_missing_year_as_not_available() {
        let table = RateTable::new([(2025, Decimal::new(35_889, 3))]);

        assert_eq!(table.describe(2025), "35.889 Cent/kWh");
        assert_eq!(table.describe(1999), "n/a");
    }

    #[test]
    fn rejects_malformed_entries() {
        assert_eq!(
            "2025:35.8".parse::<RateTable>(),
            Err(RateTableError::MalformedEntry("2025:35.8".to_string()))
        );
        assert_eq!(
            "20x5=35.8".parse::<RateTable>(),
            Err(RateTableError::InvalidYear("20x5=35.8".to_string()))
        );
        assert_eq!(
            "2025=-1".parse::<RateTable>(),
            Err(RateTableError::InvalidRate("2025=-1".to_string()))
        );
    }

    #[test]
    fn empty_value_yields_empty_table() {
        assert_eq!("".parse::<RateTable>(), Ok(RateTable::default()));
    }
}
