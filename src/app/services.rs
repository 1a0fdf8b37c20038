use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use thiserror::Error;

use crate::adapters::ftp_source::{LineSource, TransportError};
use crate::adapters::pdf_canvas::{PdfCanvas, RenderError};
use crate::adapters::smtp_mailer::{Mailer, MessageAttachment};
use crate::app::notify::Notifier;
use crate::app::retry::{RetryError, RetryPolicy};
use crate::domain::aggregate::{AggregateError, MonthlyAggregate, aggregate_month};
use crate::domain::layout::{LayoutGeometry, ReportCanvas, layout_report};
use crate::domain::log_line::extract_sessions;
use crate::domain::models::ReportPeriod;
use crate::domain::rates::RateTable;

const PDF_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("failed to fetch charging log: {0}")]
    Transport(#[source] TransportError),
    #[error("failed to aggregate sessions: {0}")]
    Aggregate(#[from] AggregateError),
    #[error("failed to render report: {0}")]
    Render(#[from] RenderError),
    #[error("failed to attach report {path}: {source}")]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Delivered {
        report_path: PathBuf,
        sessions: usize,
    },
    /// Report written but not sent.
    Rendered {
        report_path: PathBuf,
        sessions: usize,
    },
    NoData,
    /// The billing message failed; the administrator got a fallback notice.
    DeliveryFailed { report_path: PathBuf, error: String },
}

impl CycleOutcome {
    /// Whether the period needs no further attempt.
    pub fn completes_period(&self) -> bool {
        matches!(self, Self::Delivered { .. } | Self::NoData)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Send,
    RenderOnly,
}

pub struct ReportSettings {
    pub identity: String,
    pub rates: RateTable,
    pub output_dir: PathBuf,
    pub geometry: LayoutGeometry,
    pub retry: RetryPolicy,
}

/// One reporting cycle: fetch, extract, aggregate, render, deliver.
pub struct ReportService<S, M> {
    source: S,
    notifier: Notifier<M>,
    settings: ReportSettings,
    stop: Arc<AtomicBool>,
}

pub fn report_file_name(identity: &str, period: ReportPeriod) -> String {
    let identity = identity.replace(['/', '\\'], "_");
    format!(
        "Kostenersatz-{identity}-{}-{}.pdf",
        period.month(),
        period.year()
    )
}

impl<S, M> ReportService<S, M>
where
    S: LineSource,
    M: Mailer,
{
    pub fn new(
        source: S,
        notifier: Notifier<M>,
        settings: ReportSettings,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            notifier,
            settings,
            stop,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn notifier(&self) -> &Notifier<M> {
        &self.notifier
    }

    /// Runs one cycle and reports any failure to the administrator.
    pub fn execute(
        &self,
        period: ReportPeriod,
        mode: DeliveryMode,
    ) -> Result<CycleOutcome, CycleError> {
        let cycle_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("report_cycle", %cycle_id, %period);
        let _guard = span.enter();

        tracing::info!(identity = %self.settings.identity, "report cycle started");
        let result = self.run_cycle(period, mode);

        match &result {
            Ok(outcome) => tracing::info!(outcome = ?outcome, "report cycle finished"),
            Err(error) => {
                tracing::error!(error = %error, "report cycle failed");
                if mode == DeliveryMode::Send {
                    self.notify_failure(&error.to_string());
                }
            }
        }

        result
    }

    /// Best-effort error notification to the administrator.
    pub fn notify_failure(&self, error: &str) {
        if let Err(delivery) = self.notifier.send_error(error) {
            tracing::error!(error = %delivery, "failed to notify administrator about cycle failure");
        }
    }

    fn run_cycle(
        &self,
        period: ReportPeriod,
        mode: DeliveryMode,
    ) -> Result<CycleOutcome, CycleError> {
        let lines = self
            .settings
            .retry
            .run("fetch charging log", &self.stop, || self.source.fetch_lines())
            .map_err(|error| match error {
                RetryError::Exhausted(error) => CycleError::Transport(error),
                RetryError::Cancelled => CycleError::Transport(TransportError::Cancelled),
            })?;

        let extraction = extract_sessions(&lines, &self.settings.identity);
        tracing::info!(
            total_lines = extraction.stats.total_lines,
            matched = extraction.stats.matched,
            foreign_identity = extraction.stats.foreign_identity,
            unmatched = extraction.stats.unmatched,
            "charging log parsed"
        );

        let Some(aggregate) = aggregate_month(&extraction.table, period)? else {
            tracing::warn!("no charging sessions in target period, skipping report");
            if mode == DeliveryMode::Send
                && let Err(error) = self.notifier.send_no_data(period)
            {
                tracing::error!(error = %error, "failed to send no-data notice");
            }
            return Ok(CycleOutcome::NoData);
        };

        tracing::info!(
            sessions = aggregate.sessions.len(),
            duration_hours = %aggregate.total_duration_hours,
            energy_kwh = %aggregate.total_energy_kwh,
            cost_eur = %aggregate.total_cost_eur,
            "monthly totals computed"
        );

        let report_path = self.render(&aggregate)?;
        let sessions = aggregate.sessions.len();

        if mode == DeliveryMode::RenderOnly {
            return Ok(CycleOutcome::Rendered {
                report_path,
                sessions,
            });
        }

        let attachment = self.attachment(&report_path)?;
        match self.notifier.send_billing(&aggregate, attachment) {
            Ok(()) => Ok(CycleOutcome::Delivered {
                report_path,
                sessions,
            }),
            Err(error) => {
                tracing::error!(error = %error, "billing message delivery failed");
                if let Err(fallback) = self.notifier.send_delivery_failure(period, &error) {
                    tracing::error!(error = %fallback, "delivery failure notice could not be sent");
                }
                Ok(CycleOutcome::DeliveryFailed {
                    report_path,
                    error: error.to_string(),
                })
            }
        }
    }

    fn render(&self, aggregate: &MonthlyAggregate) -> Result<PathBuf, RenderError> {
        let settings = &self.settings;
        fs::create_dir_all(&settings.output_dir)?;
        let path = settings
            .output_dir
            .join(report_file_name(&settings.identity, aggregate.period));

        let title = format!(
            "Wallbox Ladekosten {} {}",
            settings.identity, aggregate.period
        );
        let mut canvas = PdfCanvas::new(&title, &settings.geometry)?;
        let layout = layout_report(
            &mut canvas,
            aggregate,
            &settings.identity,
            &settings.rates,
            &settings.geometry,
        );
        canvas.save(&path)?;

        tracing::info!(
            path = %path.display(),
            pages = layout.pages,
            rows = layout.rows,
            "report written"
        );
        Ok(path)
    }

    fn attachment(&self, path: &Path) -> Result<MessageAttachment, CycleError> {
        let bytes = fs::read(path).map_err(|source| CycleError::Attachment {
            path: path.to_path_buf(),
            source,
        })?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "report.pdf".to_string());

        Ok(MessageAttachment {
            filename,
            content_type: PDF_CONTENT_TYPE.to_string(),
            bytes,
        })
    }
}
