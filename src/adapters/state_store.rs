use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, params};
use thiserror::Error;

use crate::domain::models::ReportPeriod;

pub const LATEST_SCHEMA_VERSION: u32 = 1;

const MIGRATIONS: &[(u32, &str)] = &[(
    1,
    r#"
CREATE TABLE IF NOT EXISTS processed_periods (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    period_year INTEGER NOT NULL,
    period_month INTEGER NOT NULL,
    processed_at TEXT NOT NULL
);
"#,
)];

#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("state database operation failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("unsupported schema version {current}; latest supported is {latest}")]
    UnsupportedSchemaVersion { current: u32, latest: u32 },
    #[error("stored period {year}-{month} is invalid")]
    InvalidPeriod { year: i32, month: u32 },
}

/// Keeps the "already processed" marker of the scheduler.
pub trait ScheduleStateStore {
    fn load_last_processed(&self) -> Result<Option<ReportPeriod>, StateStoreError>;
    fn save_processed(&mut self, period: ReportPeriod) -> Result<(), StateStoreError>;
}

/// Marker held only for the lifetime of the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    last_processed: Option<ReportPeriod>,
}

impl ScheduleStateStore for MemoryStateStore {
    fn load_last_processed(&self) -> Result<Option<ReportPeriod>, StateStoreError> {
        Ok(self.last_processed)
    }

    fn save_processed(&mut self, period: ReportPeriod) -> Result<(), StateStoreError> {
        self.last_processed = Some(period);
        Ok(())
    }
}

pub struct SqliteStateStore {
    connection: Connection,
}

impl SqliteStateStore {
    pub fn open(path: &str) -> Result<Self, StateStoreError> {
        let mut connection = Connection::open(path)?;
        run_migrations(&mut connection)?;
        Ok(Self { connection })
    }
}

impl ScheduleStateStore for SqliteStateStore {
    fn load_last_processed(&self) -> Result<Option<ReportPeriod>, StateStoreError> {
        let mut statement = self.connection.prepare(
            "SELECT period_year, period_month
             FROM processed_periods
             ORDER BY id DESC
             LIMIT 1",
        )?;

        let mut rows = statement.query([])?;
        if let Some(row) = rows.next()? {
            let year: i32 = row.get(0)?;
            let month: u32 = row.get(1)?;
            let period = ReportPeriod::new(year, month)
                .map_err(|_| StateStoreError::InvalidPeriod { year, month })?;
            return Ok(Some(period));
        }

        Ok(None)
    }

    fn save_processed(&mut self, period: ReportPeriod) -> Result<(), StateStoreError> {
        self.connection.execute(
            "INSERT INTO processed_periods (period_year, period_month, processed_at) VALUES (?1, ?2, ?3)",
            params![
                period.year(),
                period.month(),
                Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            ],
        )?;
        Ok(())
    }
}

pub fn run_migrations(connection: &mut Connection) -> Result<(), StateStoreError> {
    let current_version = schema_version(connection)?;

    if current_version > LATEST_SCHEMA_VERSION {
        return Err(StateStoreError::UnsupportedSchemaVersion {
            current: current_version,
            latest: LATEST_SCHEMA_VERSION,
        });
    }

    let transaction = connection.transaction()?;

    for (version, sql) in MIGRATIONS {
        if *version > current_version {
            transaction.execute_batch(sql)?;
            transaction.pragma_update(None, "user_version", version)?;
        }
    }

    transaction.commit()?;

    Ok(())
}

pub fn schema_version(connection: &Connection) -> Result<u32, StateStoreError> {
    let version = connection.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}
