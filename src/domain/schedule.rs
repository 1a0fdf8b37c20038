use chrono::{Datelike, NaiveDate};

use crate::domain::models::ReportPeriod;

pub trait Clock {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSchedule {
    report_day: u32,
    lookback_months: u32,
}

impl ReportSchedule {
    pub fn new(report_day: u32, lookback_months: u32) -> Self {
        Self {
            report_day: report_day.clamp(1, 31),
            lookback_months,
        }
    }

    /// Configured day, clamped to the last day of `today`'s month.
    pub fn effective_day(&self, today: NaiveDate) -> u32 {
        self.report_day.min(days_in_month(today))
    }

    pub fn is_report_day(&self, today: NaiveDate) -> bool {
        today.day() == self.effective_day(today)
    }

    pub fn target_period(&self, today: NaiveDate) -> ReportPeriod {
        ReportPeriod::containing(today).months_before(self.lookback_months)
    }
}

fn days_in_month(date: NaiveDate) -> u32 {
    let first = date.with_day(1).unwrap_or(date);
    let next = first
        .checked_add_months(chrono::Months::new(1))
        .unwrap_or(first);
    next.signed_duration_since(first).num_days().max(1) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleDecision {
    NotReportDay,
    AlreadyProcessed(ReportPeriod),
    /// A cycle already ran today and failed; the next chance is the next report day.
    AlreadyAttempted(NaiveDate),
    Due(ReportPeriod),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleState {
    last_processed: Option<ReportPeriod>,
    last_attempt: Option<NaiveDate>,
}

impl ScheduleState {
    pub fn new(last_processed: Option<ReportPeriod>) -> Self {
        Self {
            last_processed,
            last_attempt: None,
        }
    }

    pub fn last_processed(&self) -> Option<ReportPeriod> {
        self.last_processed
    }

    pub fn decide(&self, schedule: &ReportSchedule, today: NaiveDate) -> ScheduleDecision {
        if !schedule.is_report_day(today) {
            return ScheduleDecision::NotReportDay;
        }

        let target = schedule.target_period(today);
        if self.last_processed == Some(target) {
            return ScheduleDecision::AlreadyProcessed(target);
        }
        if self.last_attempt == Some(today) {
            return ScheduleDecision::AlreadyAttempted(today);
        }

        ScheduleDecision::Due(target)
    }

    pub fn record_attempt(&mut self, today: NaiveDate) {
        self.last_attempt = Some(today);
    }

    pub fn record_processed(&mut self, period: ReportPeriod) {
        self.last_processed = Some(period);
    }
}
