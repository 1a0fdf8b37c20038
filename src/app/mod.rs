pub mod config;
mod error;
mod logging;
pub mod notify;
pub mod retry;
pub mod runtime;
pub mod services;

pub use error::AppError;
pub use services::{CycleOutcome, DeliveryMode};

use crate::domain::models::ReportPeriod;

fn bootstrap() -> Result<config::AppConfig, AppError> {
    let _ = dotenvy::dotenv();
    logging::init()?;

    let config = config::AppConfig::from_env()?;

    tracing::info!(
        source = config.source_file.as_deref().unwrap_or("ftp"),
        ftp_server = %config.ftp_server,
        ftp_port = config.ftp_port,
        logfile_path = %config.logfile_path,
        filter_user = %config.filter_user,
        smtp_server = config.smtp_server.as_deref().unwrap_or("disabled"),
        smtp_port = config.smtp_port,
        report_day = config.report_day,
        report_lookback_months = config.report_lookback_months,
        report_dir = %config.report_dir,
        check_interval_secs = config.check_interval_secs,
        retry_attempts = config.retry_attempts,
        "application bootstrap initialized"
    );

    Ok(config)
}

/// Long-running mode: checks the schedule until the process is stopped.
pub fn run_service() -> Result<(), AppError> {
    let config = bootstrap()?;
    runtime::run(config)
}

pub fn run_once(
    period: Option<ReportPeriod>,
    mode: DeliveryMode,
) -> Result<CycleOutcome, AppError> {
    let config = bootstrap()?;
    runtime::run_once(config, period, mode)
}
