use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use suppaftp::{FtpError, FtpStream};
use thiserror::Error;

/// Supplies the raw lines of the remote charging log, in file order.
pub trait LineSource {
    fn fetch_lines(&self) -> Result<Vec<String>, TransportError>;
}

impl<T: LineSource + ?Sized> LineSource for Box<T> {
    fn fetch_lines(&self) -> Result<Vec<String>, TransportError> {
        (**self).fetch_lines()
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to resolve log host: {0}")]
    Resolve(std::io::Error),
    #[error("ftp connection failed: {0}")]
    Connect(#[source] FtpError),
    #[error("ftp login failed: {0}")]
    Login(#[source] FtpError),
    #[error("failed to retrieve {path}: {source}")]
    Retrieve {
        path: String,
        #[source]
        source: FtpError,
    },
    #[error("log transfer failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("log retrieval cancelled")]
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct FtpCredentials {
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct FtpLineSource {
    host: String,
    port: u16,
    credentials: FtpCredentials,
    remote_path: String,
    timeout: Duration,
}

impl FtpLineSource {
    pub fn new(
        host: &str,
        port: u16,
        credentials: FtpCredentials,
        remote_path: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            host: host.to_string(),
            port,
            credentials,
            remote_path: remote_path.to_string(),
            timeout,
        }
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, TransportError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(TransportError::Resolve)?;
    addrs.next().ok_or_else(|| {
        TransportError::Resolve(std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            "no socket address resolved for log host",
        ))
    })
}

impl LineSource for FtpLineSource {
    fn fetch_lines(&self) -> Result<Vec<String>, TransportError> {
        let target = resolve(&self.host, self.port)?;
        let mut ftp =
            FtpStream::connect_timeout(target, self.timeout).map_err(TransportError::Connect)?;
        ftp.get_ref().set_read_timeout(Some(self.timeout))?;
        ftp.get_ref().set_write_timeout(Some(self.timeout))?;

        ftp.login(
            self.credentials.user.as_str(),
            self.credentials.password.as_str(),
        )
        .map_err(TransportError::Login)?;

        let buffer = ftp
            .retr_as_buffer(&self.remote_path)
            .map_err(|source| TransportError::Retrieve {
                path: self.remote_path.clone(),
                source,
            })?;

        if let Err(error) = ftp.quit() {
            tracing::debug!(error = %error, "ftp quit failed after successful transfer");
        }

        let lines = decode_lines(buffer.get_ref());
        tracing::info!(
            host = %target,
            path = %self.remote_path,
            lines = lines.len(),
            "charging log retrieved"
        );
        Ok(lines)
    }
}

/// Splits a log payload into lines, accepting LF and CRLF endings.
/// Invalid UTF-8 is replaced rather than rejected.
pub fn decode_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::to_string)
        .collect()
}
