use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::adapters::smtp_mailer::{DeliveryError, Mailer, MessageAttachment, OutgoingMessage};
use crate::app::retry::{RetryError, RetryPolicy};
use crate::domain::aggregate::MonthlyAggregate;
use crate::domain::models::ReportPeriod;

pub const ERROR_SUBJECT: &str = "FEHLER: Wallbox Reporter";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipients {
    pub billing: Option<String>,
    pub admin: Option<String>,
}

/// Composes the outgoing messages of a report cycle and hands them to the mailer.
pub struct Notifier<M> {
    mailer: M,
    recipients: Recipients,
    identity: String,
    retry: RetryPolicy,
    stop: Arc<AtomicBool>,
}

impl<M: Mailer> Notifier<M> {
    pub fn new(
        mailer: M,
        recipients: Recipients,
        identity: &str,
        retry: RetryPolicy,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            mailer,
            recipients,
            identity: identity.to_string(),
            retry,
            stop,
        }
    }

    pub fn mailer(&self) -> &M {
        &self.mailer
    }

    pub fn send_billing(
        &self,
        aggregate: &MonthlyAggregate,
        attachment: MessageAttachment,
    ) -> Result<(), DeliveryError> {
        self.deliver(&self.billing_message(aggregate, attachment))
    }

    /// Informs the administrator that the target month has no sessions.
    pub fn send_no_data(&self, period: ReportPeriod) -> Result<(), DeliveryError> {
        self.deliver(&self.admin_message(
            format!("HINWEIS: Wallbox Reporter - keine Daten für {period}"),
            format!(
                "Für {} wurden im Zeitraum {period} keine Ladevorgänge gefunden.\n\
                 Es wurde kein Bericht erstellt und keine Abrechnung versendet.",
                self.identity
            ),
        ))
    }

    pub fn send_error(&self, error: &str) -> Result<(), DeliveryError> {
        self.deliver(&self.admin_message(
            ERROR_SUBJECT.to_string(),
            format!("Fehler im Wallbox Reporter:\n{error}"),
        ))
    }

    pub fn send_delivery_failure(
        &self,
        period: ReportPeriod,
        error: &DeliveryError,
    ) -> Result<(), DeliveryError> {
        self.deliver(&self.admin_message(
            format!("{ERROR_SUBJECT} - Versand fehlgeschlagen"),
            format!(
                "Die Wallbox Abrechnung für {period} ({}) konnte nicht versendet werden:\n{error}",
                self.identity
            ),
        ))
    }

    fn billing_message(
        &self,
        aggregate: &MonthlyAggregate,
        attachment: MessageAttachment,
    ) -> OutgoingMessage {
        let period = aggregate.period;
        OutgoingMessage {
            subject: format!("Wallbox Abrechnung {} - {period}", self.identity),
            body: format!(
                "Sehr geehrte Damen und Herren,\n\n\
                 anbei die Wallbox Abrechnung für {period} ({identity}).\n\n\
                 Gesamtdauer Laden: {duration:.2} Std\n\
                 Gesamte Lademenge: {energy:.2} kWh\n\
                 Kostenersatz: {cost:.2} EUR\n\n\
                 Mit freundlichen Grüßen\n\
                 Ihr Wallbox Reporter",
                identity = self.identity,
                duration = aggregate.total_duration_hours,
                energy = aggregate.total_energy_kwh,
                cost = aggregate.total_cost_eur,
            ),
            to: self.recipients.billing.iter().cloned().collect(),
            cc: self.recipients.admin.iter().cloned().collect(),
            attachment: Some(attachment),
        }
    }

    fn admin_message(&self, subject: String, body: String) -> OutgoingMessage {
        OutgoingMessage {
            subject,
            body,
            to: self.recipients.admin.iter().cloned().collect(),
            cc: Vec::new(),
            attachment: None,
        }
    }

    fn deliver(&self, message: &OutgoingMessage) -> Result<(), DeliveryError> {
        self.retry
            .run_while(
                "send message",
                &self.stop,
                || self.mailer.send(message),
                DeliveryError::is_transient,
            )
            .map_err(|error| match error {
                RetryError::Exhausted(error) => error,
                RetryError::Cancelled => DeliveryError::Cancelled,
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    use rust_decimal::Decimal;

    use crate::adapters::smtp_mailer::{DeliveryError, MessageAttachment};
    use crate::app::retry::RetryPolicy;
    use crate::domain::aggregate::MonthlyAggregate;
    use crate::domain::models::ReportPeriod;
    use crate::test_support::RecordingMailer;

    use super::{ERROR_SUBJECT, Notifier, Recipients};

    fn notifier(mailer: RecordingMailer, recipients: Recipients) -> Notifier<RecordingMailer> {
        Notifier::new(
            mailer,
            recipients,
            "AZ999ZZ",
            RetryPolicy {
                attempts: 2,
                backoff: Duration::from_millis(1),
            },
            Arc::new(AtomicBool::new(false)),
        )
    }

    fn both() -> Recipients {
        Recipients {
            billing: Some("billing@example.com".to_string()),
            admin: Some("admin@example.com".to_string()),
        }
    }

    fn aggregate() -> MonthlyAggregate {
        MonthlyAggregate {
            period: ReportPeriod::new(2025, 3).expect("valid period"),
            total_duration_hours: Decimal::new(25, 1),
            total_energy_kwh: Decimal::new(1235, 2),
            total_cost_eur: Decimal::new(457, 2),
            sessions: Vec::new(),
        }
    }

    fn attachment() -> MessageAttachment {
        MessageAttachment {
            filename: "Kostenersatz-AZ999ZZ-3-2025.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: b"%PDF".to_vec(),
        }
    }

    #[test]
    fn billing_goes_to_billing_with_admin_copy() {
        let notifier = notifier(RecordingMailer::default(), both());

        notifier
            .send_billing(&aggregate(), attachment())
            .expect("delivery should succeed");

        let sent = notifier.mailer().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Wallbox Abrechnung AZ999ZZ - 3/2025");
        assert_eq!(sent[0].to, vec!["billing@example.com".to_string()]);
        assert_eq!(sent[0].cc, vec!["admin@example.com".to_string()]);
        assert!(sent[0].body.contains("Gesamtdauer Laden: 2.50 Std"));
        assert!(sent[0].body.contains("Gesamte Lademenge: 12.35 kWh"));
        assert!(sent[0].body.contains("Kostenersatz: 4.57 EUR"));
        assert!(sent[0].body.contains("anbei die Wallbox Abrechnung für 3/2025"));
        assert!(sent[0].body.contains("Mit freundlichen Grüßen"));
        assert_eq!(sent[0].attachment, Some(attachment()));
    }

    #[test]
    fn operational_notices_go_to_admin_only() {
        let notifier = notifier(RecordingMailer::default(), both());
        let period = ReportPeriod::new(2025, 3).expect("valid period");

        notifier.send_no_data(period).expect("notice should be sent");
        notifier.send_error("boom").expect("error should be sent");

        let sent = notifier.mailer().sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].subject.contains("keine Daten für 3/2025"));
        assert_eq!(sent[1].subject, ERROR_SUBJECT);
        assert!(sent[1].body.ends_with("boom"));
        for message in &sent {
            assert_eq!(message.to, vec!["admin@example.com".to_string()]);
            assert!(message.cc.is_empty());
            assert!(message.attachment.is_none());
        }
    }

    #[test]
    fn retries_transient_delivery_failures() {
        let notifier = notifier(RecordingMailer::failing_first(1), both());

        notifier.send_error("boom").expect("second attempt succeeds");

        assert_eq!(notifier.mailer().attempts(), 2);
        assert_eq!(notifier.mailer().sent().len(), 1);
    }

    #[test]
    fn surfaces_error_after_exhausting_attempts() {
        let notifier = notifier(RecordingMailer::failing_first(5), both());

        let err = notifier
            .send_error("boom")
            .expect_err("delivery should fail");

        assert!(matches!(err, DeliveryError::Smtp(_)));
        assert_eq!(notifier.mailer().attempts(), 2);
    }

    #[test]
    fn permanent_delivery_failure_is_not_retried() {
        let notifier = notifier(RecordingMailer::rejecting(), both());

        let err = notifier
            .send_error("boom")
            .expect_err("delivery should fail");

        assert!(matches!(err, DeliveryError::Rejected(_)));
        assert_eq!(notifier.mailer().attempts(), 1);
    }
}
