use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::path::Path;

use chrono::NaiveDate;

use crate::adapters::ftp_source::{LineSource, TransportError};
use crate::adapters::smtp_mailer::{DeliveryError, Mailer, OutgoingMessage};
use crate::domain::layout::{BRAND_GREEN, COLUMN_HEADERS, ROW_SHADE, ReportCanvas, Rgb, TextStyle, WHITE};
use crate::domain::schedule::Clock;

/// Builds a disconnect line as written by the wallbox logger.
pub fn disconnect_line(
    disconnected_at: &str,
    user: &str,
    energy_kwh: &str,
    seconds: u32,
    cost_eur: &str,
) -> String {
    format!(
        "{disconnected_at};Logger Wallbox;{disconnected_at}:Fahrzeug getrennt;user:{user};\
         Geladene Energie:{energy_kwh}kWh;Dauer:{seconds} s;{cost_eur}€"
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum CanvasOp {
    Text {
        x: f32,
        y: f32,
        text: String,
        style: TextStyle,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Rgb,
    },
    NewPage,
}

#[derive(Debug, Default)]
pub struct RecordingCanvas {
    ops: Vec<CanvasOp>,
}

impl RecordingCanvas {
    pub fn page_count(&self) -> usize {
        1 + self
            .ops
            .iter()
            .filter(|op| matches!(op, CanvasOp::NewPage))
            .count()
    }

    pub fn ops_on_page(&self, page: usize) -> Vec<CanvasOp> {
        self.ops
            .split(|op| matches!(op, CanvasOp::NewPage))
            .nth(page)
            .map(<[CanvasOp]>::to_vec)
            .unwrap_or_default()
    }

    pub fn header_band(&self, page: usize) -> Vec<CanvasOp> {
        self.ops_on_page(page)
            .into_iter()
            .filter(|op| match op {
                CanvasOp::Rect { color, .. } => *color == BRAND_GREEN,
                CanvasOp::Text { text, .. } => COLUMN_HEADERS.contains(&text.as_str()),
                CanvasOp::NewPage => false,
            })
            .collect()
    }

    pub fn row_backgrounds(&self, page: usize) -> Vec<Rgb> {
        self.ops_on_page(page)
            .into_iter()
            .filter_map(|op| match op {
                CanvasOp::Rect { color, .. } if color == ROW_SHADE || color == WHITE => {
                    Some(color)
                }
                _ => None,
            })
            .collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                CanvasOp::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ReportCanvas for RecordingCanvas {
    type Error = Infallible;

    fn draw_text(&mut self, x: f32, y: f32, text: &str, style: TextStyle) {
        self.ops.push(CanvasOp::Text {
            x,
            y,
            text: text.to_string(),
            style,
        });
    }

    fn draw_filled_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgb) {
        self.ops.push(CanvasOp::Rect {
            x,
            y,
            width,
            height,
            color,
        });
    }

    fn new_page(&mut self) {
        self.ops.push(CanvasOp::NewPage);
    }

    fn save(self, _path: &Path) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Records delivered messages; the first `failures` attempts fail transiently.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: RefCell<Vec<OutgoingMessage>>,
    attempts: Cell<usize>,
    failures: usize,
    permanent: bool,
}

impl RecordingMailer {
    pub fn failing_first(failures: usize) -> Self {
        Self {
            failures,
            ..Self::default()
        }
    }

    /// Every attempt is refused by the server.
    pub fn rejecting() -> Self {
        Self {
            failures: usize::MAX,
            permanent: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.borrow().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.get()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, message: &OutgoingMessage) -> Result<(), DeliveryError> {
        let attempt = self.attempts.get() + 1;
        self.attempts.set(attempt);
        if attempt <= self.failures {
            return Err(if self.permanent {
                DeliveryError::Rejected(format!("550 simulated rejection {attempt}"))
            } else {
                DeliveryError::Smtp(format!("simulated failure {attempt}"))
            });
        }
        self.sent.borrow_mut().push(message.clone());
        Ok(())
    }
}

/// Line source returning fixed content after a number of failed fetches.
#[derive(Debug, Default)]
pub struct ScriptedLineSource {
    lines: Vec<String>,
    failures: usize,
    calls: Cell<usize>,
}

impl ScriptedLineSource {
    pub fn with_lines(lines: Vec<String>) -> Self {
        Self::failing_first(0, lines)
    }

    pub fn failing_first(failures: usize, lines: Vec<String>) -> Self {
        Self {
            lines,
            failures,
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl LineSource for ScriptedLineSource {
    fn fetch_lines(&self) -> Result<Vec<String>, TransportError> {
        let call = self.calls.get() + 1;
        self.calls.set(call);
        if call <= self.failures {
            return Err(TransportError::Io(std::io::Error::other(format!(
                "simulated outage {call}"
            ))));
        }
        Ok(self.lines.clone())
    }
}

#[derive(Debug)]
pub struct FixedClock {
    today: Cell<NaiveDate>,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today: Cell::new(today),
        }
    }

    pub fn set(&self, today: NaiveDate) {
        self.today.set(today);
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.today.get()
    }
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}
