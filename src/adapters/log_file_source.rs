use std::fs;
use std::path::PathBuf;

use crate::adapters::ftp_source::{LineSource, TransportError, decode_lines};

/// Replays a local copy of the charging log instead of fetching it remotely.
#[derive(Debug, Clone)]
pub struct LogFileSource {
    path: PathBuf,
}

impl LogFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LineSource for LogFileSource {
    fn fetch_lines(&self) -> Result<Vec<String>, TransportError> {
        let bytes = fs::read(&self.path)?;
        let lines = decode_lines(&bytes);
        tracing::info!(
            path = %self.path.display(),
            lines = lines.len(),
            "charging log read from local file"
        );
        Ok(lines)
    }
}
