use crate::app::AppError;
use crate::domain::rates::RateTable;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ftp_server: String,
    pub ftp_port: u16,
    pub ftp_user: String,
    pub ftp_password: String,
    pub logfile_path: String,
    pub source_file: Option<String>,
    pub filter_user: String,
    pub smtp_server: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_starttls: bool,
    pub smtp_from: String,
    pub billing_email: Option<String>,
    pub admin_email: Option<String>,
    pub report_day: u32,
    pub report_lookback_months: u32,
    pub report_dir: String,
    pub rate_table: RateTable,
    pub check_interval_secs: u64,
    pub network_timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub state_db_path: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let report_day = parse_or_default(&lookup, "REPORT_DAY", 1_u32)?;
        if !(1..=31).contains(&report_day) {
            return Err(AppError::config("REPORT_DAY must be between 1 and 31"));
        }

        let report_lookback_months = parse_or_default(&lookup, "REPORT_LOOKBACK_MONTHS", 1_u32)?;
        if report_lookback_months > 12 {
            return Err(AppError::config(
                "REPORT_LOOKBACK_MONTHS must be between 0 and 12",
            ));
        }

        let rate_table = text(&lookup, "RATE_TABLE")
            .unwrap_or_else(|| "2025=35.889".to_string())
            .parse::<RateTable>()
            .map_err(|e| AppError::config(format!("RATE_TABLE is invalid: {e}")))?;

        let smtp_user = text(&lookup, "SMTP_USER");
        let smtp_from = text(&lookup, "SMTP_FROM")
            .or_else(|| smtp_user.clone())
            .unwrap_or_else(|| "wallbox-reporter@localhost".to_string());

        Ok(Self {
            ftp_server: text(&lookup, "FTP_SERVER")
                .unwrap_or_else(|| "loxone-miniserver.local".to_string()),
            ftp_port: parse_or_default(&lookup, "FTP_PORT", 21_u16)?,
            ftp_user: text(&lookup, "FTP_USER").unwrap_or_else(|| "anonymous".to_string()),
            ftp_password: lookup("FTP_PASSWORD").unwrap_or_default(),
            logfile_path: text(&lookup, "LOGFILE_PATH")
                .unwrap_or_else(|| "/log/wallbox.log".to_string()),
            source_file: text(&lookup, "SOURCE_FILE"),
            filter_user: text(&lookup, "FILTER_USER").unwrap_or_else(|| "AZ999ZZ".to_string()),
            smtp_server: text(&lookup, "SMTP_SERVER"),
            smtp_port: parse_or_default(&lookup, "SMTP_PORT", 587_u16)?,
            smtp_user,
            smtp_password: lookup("SMTP_PASSWORD").filter(|v| !v.is_empty()),
            smtp_starttls: parse_bool_or_default(&lookup, "SMTP_STARTTLS", true)?,
            smtp_from,
            billing_email: text(&lookup, "BILLING_EMAIL"),
            admin_email: text(&lookup, "ADMIN_EMAIL"),
            report_day,
            report_lookback_months,
            report_dir: text(&lookup, "REPORT_DIR").unwrap_or_else(|| "reports".to_string()),
            rate_table,
            check_interval_secs: parse_or_default(&lookup, "CHECK_INTERVAL_SECS", 3600_u64)?,
            network_timeout_secs: parse_or_default(&lookup, "NETWORK_TIMEOUT_SECS", 30_u64)?,
            retry_attempts: parse_or_default(&lookup, "RETRY_ATTEMPTS", 3_u32)?.max(1),
            retry_backoff_ms: parse_or_default(&lookup, "RETRY_BACKOFF_MS", 2000_u64)?,
            state_db_path: text(&lookup, "STATE_DB_PATH"),
        })
    }
}

fn text<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::config(format!("{key} must be a valid number"))),
        None => Ok(default),
    }
}

fn parse_bool_or_default<F>(lookup: &F, key: &str, default: bool) -> Result<bool, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(value) => match value.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(AppError::config(format!("{key} must be a boolean"))),
        },
    }
}
