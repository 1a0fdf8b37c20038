use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub subject: String,
    pub body: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub attachment: Option<MessageAttachment>,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("message has no recipients")]
    NoRecipients,
    #[error("invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("failed to build message: {0}")]
    Build(String),
    #[error("smtp server rejected the message: {0}")]
    Rejected(String),
    #[error("smtp delivery failed: {0}")]
    Smtp(String),
    #[error("delivery cancelled")]
    Cancelled,
}

impl DeliveryError {
    /// Only connection-level and temporary SMTP failures can succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Smtp(_))
    }
}

fn smtp_error(error: lettre::transport::smtp::Error) -> DeliveryError {
    if error.is_permanent() {
        DeliveryError::Rejected(error.to_string())
    } else {
        DeliveryError::Smtp(error.to_string())
    }
}

pub trait Mailer {
    fn send(&self, message: &OutgoingMessage) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    /// `None` disables delivery; messages are logged and dropped.
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub starttls: bool,
    pub from_address: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SmtpMailer {
    settings: SmtpSettings,
}

impl SmtpMailer {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    fn build_message(&self, message: &OutgoingMessage) -> Result<Message, DeliveryError> {
        if message.to.is_empty() && message.cc.is_empty() {
            return Err(DeliveryError::NoRecipients);
        }

        let mut builder = Message::builder()
            .from(parse_mailbox(&self.settings.from_address)?)
            .subject(message.subject.as_str());
        for address in &message.to {
            builder = builder.to(parse_mailbox(address)?);
        }
        for address in &message.cc {
            builder = builder.cc(parse_mailbox(address)?);
        }

        let text = SinglePart::plain(message.body.clone());
        let built = match &message.attachment {
            Some(attachment) => {
                let content_type = ContentType::parse(&attachment.content_type)
                    .map_err(|e| DeliveryError::Build(format!("invalid content type: {e}")))?;
                builder.multipart(
                    MultiPart::mixed().singlepart(text).singlepart(
                        Attachment::new(attachment.filename.clone())
                            .body(attachment.bytes.clone(), content_type),
                    ),
                )
            }
            None => builder.singlepart(text),
        };

        built.map_err(|e| DeliveryError::Build(e.to_string()))
    }

    fn transport(&self, host: &str) -> Result<SmtpTransport, DeliveryError> {
        let builder = if self.settings.starttls {
            SmtpTransport::starttls_relay(host).map_err(smtp_error)?
        } else {
            SmtpTransport::builder_dangerous(host)
        };

        let mut builder = builder
            .port(self.settings.port)
            .timeout(Some(self.settings.timeout));
        if let (Some(username), Some(password)) = (&self.settings.username, &self.settings.password)
        {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|e| DeliveryError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

impl Mailer for SmtpMailer {
    fn send(&self, message: &OutgoingMessage) -> Result<(), DeliveryError> {
        let email = self.build_message(message)?;

        let Some(host) = self.settings.host.as_deref() else {
            tracing::warn!(
                subject = %message.subject,
                recipients = ?message.to,
                "smtp delivery is disabled, skipping message"
            );
            return Ok(());
        };

        self.transport(host)?.send(&email).map_err(smtp_error)?;

        tracing::info!(
            subject = %message.subject,
            to = ?message.to,
            cc = ?message.cc,
            attachment = message.attachment.as_ref().map(|a| a.filename.as_str()),
            "message delivered"
        );
        Ok(())
    }
}
