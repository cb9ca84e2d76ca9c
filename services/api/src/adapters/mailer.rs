//! services/api/src/adapters/mailer.rs
//!
//! Implementations of the `NotificationService` port. `SmtpMailer` delivers
//! HTML mail through an SMTP server; `LogMailer` only logs each message and is
//! used when no server is configured.

use crate::config::SmtpSettings;
use async_trait::async_trait;
use lettre::address::AddressError;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use review_core::ports::{Notification, NotificationService, PortError, PortResult};
use std::time::Duration;
use tracing::info;

const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Reasons an `SmtpMailer` cannot be built from the configuration.
#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("invalid sender address: {0}")]
    Sender(#[from] AddressError),
    #[error("invalid SMTP relay: {0}")]
    Relay(#[from] lettre::transport::smtp::Error),
}

//=========================================================================================
// SMTP
//=========================================================================================

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    /// Builds the transport. No connection is made until the first send.
    ///
    /// With `secure` set the connection is TLS from the first byte (port 465
    /// style); otherwise it is plain SMTP, meant for local relays.
    pub fn new(settings: &SmtpSettings, sender: &str) -> Result<Self, MailerError> {
        let builder = if settings.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
        };
        let mut builder = builder.port(settings.port).timeout(Some(SMTP_TIMEOUT));
        if let Some(username) = &settings.username {
            let password = settings.password.clone().unwrap_or_default();
            builder = builder.credentials(Credentials::new(username.clone(), password));
        }
        Ok(Self {
            transport: builder.build(),
            sender: sender.parse()?,
        })
    }

    fn build_message(&self, notification: &Notification) -> PortResult<Message> {
        let to: Mailbox = notification
            .to
            .parse()
            .map_err(|e| PortError::Unexpected(format!("invalid recipient {}: {}", notification.to, e)))?;
        Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(notification.subject.as_str())
            .header(ContentType::TEXT_HTML)
            .body(notification.html.clone())
            .map_err(|e| PortError::Unexpected(format!("cannot build mail: {}", e)))
    }
}

#[async_trait]
impl NotificationService for SmtpMailer {
    async fn send(&self, notification: Notification) -> PortResult<()> {
        let message = self.build_message(&notification)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| PortError::Unexpected(format!("smtp: {}", e)))?;
        info!("Notification '{}' sent to {}", notification.subject, notification.to);
        Ok(())
    }
}

//=========================================================================================
// Log Only
//=========================================================================================

#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl NotificationService for LogMailer {
    async fn send(&self, notification: Notification) -> PortResult<()> {
        info!(
            to = %notification.to,
            subject = %notification.subject,
            "SMTP not configured; notification logged only"
        );
        Ok(())
    }
}
