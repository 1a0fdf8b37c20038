use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::models::{ReportPeriod, SessionRecord, SessionTable, round_cents};

/// Totals for one calendar month together with the sessions they were built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyAggregate {
    pub period: ReportPeriod,
    pub total_duration_hours: Decimal,
    pub total_energy_kwh: Decimal,
    pub total_cost_eur: Decimal,
    pub sessions: Vec<SessionRecord>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("{field} total for {period} exceeds the representable range")]
    Overflow {
        field: &'static str,
        period: ReportPeriod,
    },
}

/// Returns `Ok(None)` when no session ended inside `period`.
///
/// Sessions are attributed to the month of their disconnect timestamp. Totals
/// are sums of the per-record rounded values, rounded again after summation.
pub fn aggregate_month(
    table: &SessionTable,
    period: ReportPeriod,
) -> Result<Option<MonthlyAggregate>, AggregateError> {
    let sessions: Vec<SessionRecord> = table
        .iter()
        .filter(|record| period.contains(&record.disconnected_at))
        .cloned()
        .collect();

    if sessions.is_empty() {
        return Ok(None);
    }

    let total = |field: &'static str, value: fn(&SessionRecord) -> Decimal| {
        sessions
            .iter()
            .map(value)
            .try_fold(Decimal::ZERO, |sum, value| sum.checked_add(value))
            .map(round_cents)
            .ok_or(AggregateError::Overflow { field, period })
    };

    Ok(Some(MonthlyAggregate {
        period,
        total_duration_hours: total("duration", |record| record.duration_hours)?,
        total_energy_kwh: total("energy", |record| record.energy_kwh)?,
        total_cost_eur: total("cost", |record| record.cost_eur)?,
        sessions,
    }))
}
