// # SMTP Notifier
//
// This crate provides the email implementation of `Notifier`.
//
// Each change event is rendered by `hytrack_core::render` and sent as one
// HTML email through an SMTP relay using STARTTLS and login credentials.
//
// ## Security
//
// - The SMTP password never appears in logs (`SmtpConfig`'s Debug redacts it)
// - The relay connection is upgraded with STARTTLS before authenticating
//
// Delivery is best-effort: a failed send is returned to the reconciler,
// which logs it. There is no resend queue.

use async_trait::async_trait;
use hytrack_core::config::SmtpConfig;
use hytrack_core::render::{RenderedMessage, render_message};
use hytrack_core::traits::{ChangeEvent, Notifier};
use hytrack_core::{Error, Result};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

/// Timeout for one SMTP exchange
const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Email notifier
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl std::fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("from", &self.from.to_string())
            .field("to", &self.to.to_string())
            .finish()
    }
}

impl SmtpNotifier {
    /// Create a notifier for the configured relay
    ///
    /// No connection is made until the first notification.
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        config.validate()?;

        let from = parse_mailbox("sender", &config.from)?;
        let to = parse_mailbox("recipient", &config.recipient)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)
            .map_err(|e| Error::config(format!("Invalid SMTP relay '{}': {}", config.server, e)))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        tracing::debug!(
            "SMTP notifier ready: {}:{} -> {}",
            config.server,
            config.port,
            to
        );

        Ok(Self { transport, from, to })
    }

    /// Build the email for a change event
    pub fn build_message(&self, event: &ChangeEvent) -> Result<Message> {
        let RenderedMessage { subject, html } = render_message(event);

        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)
            .map_err(|e| Error::notify(format!("Failed to build email: {}", e)))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, event: &ChangeEvent) -> Result<()> {
        let message = self.build_message(event)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| Error::notify(format!("SMTP send failed: {}", e)))?;

        tracing::info!("Notification sent for {} to {}", event.waybill, self.to);
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "smtp"
    }
}

fn parse_mailbox(role: &str, address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e| Error::config(format!("Invalid {} address '{}': {}", role, address, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hytrack_core::Courier;
    use hytrack_core::traits::StatusPayload;

    fn config() -> SmtpConfig {
        SmtpConfig {
            server: "smtp.example.com".to_string(),
            port: 587,
            username: "tracker@example.com".to_string(),
            password: "app-password".to_string(),
            from: "tracker@example.com".to_string(),
            recipient: "me@example.com".to_string(),
        }
    }

    fn event() -> ChangeEvent {
        let payload = StatusPayload::new(
            Courier::BlueDart,
            "SHIPMENT DELIVERED",
            Courier::BlueDart.tracking_url("12345678901"),
        )
        .with_location("BANGALORE");
        ChangeEvent {
            waybill: "12345678901".to_string(),
            courier: Courier::BlueDart,
            previous_status: Some("Shipment Outscan (MUMBAI HUB)".to_string()),
            payload,
            delivered: true,
        }
    }

    #[tokio::test]
    async fn test_build_message_headers() {
        let notifier = SmtpNotifier::new(&config()).unwrap();
        let message = notifier.build_message(&event()).unwrap();

        let envelope = message.envelope();
        assert_eq!(envelope.from().map(|a| a.to_string()), Some("tracker@example.com".to_string()));
        assert_eq!(envelope.to()[0].to_string(), "me@example.com");

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Content-Type: text/html"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_rejected() {
        let mut bad = config();
        bad.recipient = "not-an-address".to_string();
        assert!(matches!(SmtpNotifier::new(&bad), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_debug_hides_credentials() {
        let notifier = SmtpNotifier::new(&config()).unwrap();
        let rendered = format!("{:?}", notifier);
        assert!(!rendered.contains("app-password"));
    }
}
