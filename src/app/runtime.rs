use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{Local, NaiveDate};

use crate::adapters::ftp_source::{FtpCredentials, FtpLineSource, LineSource};
use crate::adapters::log_file_source::LogFileSource;
use crate::adapters::smtp_mailer::{Mailer, SmtpMailer, SmtpSettings};
use crate::adapters::state_store::{
    MemoryStateStore, ScheduleStateStore, SqliteStateStore, StateStoreError,
};
use crate::app::config::AppConfig;
use crate::app::error::AppError;
use crate::app::notify::{Notifier, Recipients};
use crate::app::retry::{RetryPolicy, sleep_unless_stopped};
use crate::app::services::{CycleOutcome, DeliveryMode, ReportService, ReportSettings};
use crate::domain::layout::LayoutGeometry;
use crate::domain::models::ReportPeriod;
use crate::domain::schedule::{Clock, ReportSchedule, ScheduleDecision, ScheduleState};

#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Idle(ScheduleDecision),
    Completed(CycleOutcome),
    Failed,
}

pub struct ReportScheduler<S, M, St, Cl> {
    service: ReportService<S, M>,
    store: St,
    clock: Cl,
    schedule: ReportSchedule,
    state: ScheduleState,
}

impl<S, M, St, Cl> ReportScheduler<S, M, St, Cl>
where
    S: LineSource,
    M: Mailer,
    St: ScheduleStateStore,
    Cl: Clock,
{
    pub fn new(
        service: ReportService<S, M>,
        store: St,
        clock: Cl,
        schedule: ReportSchedule,
    ) -> Result<Self, StateStoreError> {
        let state = ScheduleState::new(store.load_last_processed()?);
        if let Some(period) = state.last_processed() {
            tracing::info!(%period, "restored last processed period");
        }

        Ok(Self {
            service,
            store,
            clock,
            schedule,
            state,
        })
    }

    pub fn last_processed(&self) -> Option<ReportPeriod> {
        self.state.last_processed()
    }

    pub fn service(&self) -> &ReportService<S, M> {
        &self.service
    }

    pub fn store(&self) -> &St {
        &self.store
    }

    pub fn clock(&self) -> &Cl {
        &self.clock
    }

    pub fn tick(&mut self) -> TickOutcome {
        let today = self.clock.today();
        let period = match self.state.decide(&self.schedule, today) {
            ScheduleDecision::Due(period) => period,
            decision => {
                tracing::debug!(%today, decision = ?decision, "no report due");
                return TickOutcome::Idle(decision);
            }
        };

        self.state.record_attempt(today);
        let service = &self.service;
        let result = catch_unwind(AssertUnwindSafe(|| {
            service.execute(period, DeliveryMode::Send)
        }));

        match result {
            Ok(Ok(outcome)) => {
                if outcome.completes_period() {
                    self.mark_processed(period);
                }
                TickOutcome::Completed(outcome)
            }
            Ok(Err(_)) => TickOutcome::Failed,
            Err(payload) => {
                let message = panic_message(&*payload);
                tracing::error!(%period, panic = %message, "report cycle panicked");
                self.service
                    .notify_failure(&format!("unexpected failure: {message}"));
                TickOutcome::Failed
            }
        }
    }

    fn mark_processed(&mut self, period: ReportPeriod) {
        self.state.record_processed(period);
        if let Err(error) = self.store.save_processed(period) {
            tracing::warn!(%period, error = %error, "failed to persist processed period");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub fn run_scheduler<S, M, St, Cl>(
    mut scheduler: ReportScheduler<S, M, St, Cl>,
    check_interval: Duration,
    stop_flag: &AtomicBool,
) where
    S: LineSource,
    M: Mailer,
    St: ScheduleStateStore,
    Cl: Clock,
{
    while !stop_flag.load(Ordering::Relaxed) {
        scheduler.tick();
        if !sleep_unless_stopped(check_interval, stop_flag) {
            break;
        }
    }
    tracing::info!("scheduler stopped");
}

fn retry_policy(config: &AppConfig) -> RetryPolicy {
    RetryPolicy {
        attempts: config.retry_attempts,
        backoff: Duration::from_millis(config.retry_backoff_ms),
    }
}

fn line_source(config: &AppConfig) -> Box<dyn LineSource> {
    match &config.source_file {
        Some(path) => {
            tracing::info!(path = %path, "reading charging log from local file");
            Box::new(LogFileSource::new(path))
        }
        None => Box::new(FtpLineSource::new(
            &config.ftp_server,
            config.ftp_port,
            FtpCredentials {
                user: config.ftp_user.clone(),
                password: config.ftp_password.clone(),
            },
            &config.logfile_path,
            Duration::from_secs(config.network_timeout_secs),
        )),
    }
}

fn build_service(
    config: &AppConfig,
    stop_flag: Arc<AtomicBool>,
) -> ReportService<Box<dyn LineSource>, SmtpMailer> {
    let mailer = SmtpMailer::new(SmtpSettings {
        host: config.smtp_server.clone(),
        port: config.smtp_port,
        username: config.smtp_user.clone(),
        password: config.smtp_password.clone(),
        starttls: config.smtp_starttls,
        from_address: config.smtp_from.clone(),
        timeout: Duration::from_secs(config.network_timeout_secs),
    });
    let notifier = Notifier::new(
        mailer,
        Recipients {
            billing: config.billing_email.clone(),
            admin: config.admin_email.clone(),
        },
        &config.filter_user,
        retry_policy(config),
        Arc::clone(&stop_flag),
    );

    ReportService::new(
        line_source(config),
        notifier,
        ReportSettings {
            identity: config.filter_user.clone(),
            rates: config.rate_table.clone(),
            output_dir: PathBuf::from(&config.report_dir),
            geometry: LayoutGeometry::default(),
            retry: retry_policy(config),
        },
        stop_flag,
    )
}

pub fn run(config: AppConfig) -> Result<(), AppError> {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let service = build_service(&config, Arc::clone(&stop_flag));
    let schedule = ReportSchedule::new(config.report_day, config.report_lookback_months);
    let check_interval = Duration::from_secs(config.check_interval_secs.max(1));

    match config.state_db_path.as_deref() {
        Some(path) => {
            let store = SqliteStateStore::open(path).map_err(AppError::state_store)?;
            let scheduler = ReportScheduler::new(service, store, SystemClock, schedule)
                .map_err(AppError::state_store)?;
            run_scheduler(scheduler, check_interval, &stop_flag);
        }
        None => {
            tracing::warn!("STATE_DB_PATH not set, processed periods are kept in memory only");
            let scheduler =
                ReportScheduler::new(service, MemoryStateStore::default(), SystemClock, schedule)
                    .map_err(AppError::state_store)?;
            run_scheduler(scheduler, check_interval, &stop_flag);
        }
    }

    Ok(())
}

/// Runs a single cycle for `period`, or for the period the schedule would target today.
pub fn run_once(
    config: AppConfig,
    period: Option<ReportPeriod>,
    mode: DeliveryMode,
) -> Result<CycleOutcome, AppError> {
    let period = period.unwrap_or_else(|| {
        ReportSchedule::new(config.report_day, config.report_lookback_months)
            .target_period(SystemClock.today())
    });
    let service = build_service(&config, Arc::new(AtomicBool::new(false)));

    service.execute(period, mode).map_err(AppError::runtime)
}
