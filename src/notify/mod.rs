// Operator notifications
//
// Delivery is best effort: trading code only ever calls `notify_best_effort`,
// which logs and swallows failures.

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::config::{EmailSettings, NotificationSettings};
use crate::error::BotError;
use crate::Result;

const IMPLICIT_TLS_PORT: u16 = 465;

#[allow(async_fn_in_trait)]
pub trait Notifier {
    async fn send(&self, subject: &str, body: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    subject: &'a str,
    body: &'a str,
    text: String,
}

/// Posts messages as JSON to an HTTP webhook
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            BotError::NotificationDelivery(format!("failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl Notifier for WebhookNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        let payload = WebhookPayload {
            subject,
            body,
            text: format!("{subject}\n\n{body}"),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| BotError::NotificationDelivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BotError::NotificationDelivery(format!(
                "webhook returned {status}"
            )));
        }

        Ok(())
    }
}

/// Sends plain-text mail through an authenticated SMTP relay
pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailNotifier {
    pub fn new(settings: &EmailSettings, timeout: Duration) -> Result<Self> {
        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|e| BotError::ConfigValidation(format!("email from: {e}")))?;
        let to: Mailbox = settings
            .to
            .parse()
            .map_err(|e| BotError::ConfigValidation(format!("email to: {e}")))?;

        let builder = if settings.smtp_port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host)
        };

        // The connection pool spawns onto the current tokio runtime
        let mailer = builder
            .map_err(|e| BotError::NotificationDelivery(format!("failed to set up SMTP: {e}")))?
            .port(settings.smtp_port)
            .credentials(Credentials::new(
                settings.username().to_string(),
                settings.password.clone(),
            ))
            .timeout(Some(timeout))
            .build();

        Ok(Self { mailer, from, to })
    }
}

impl Notifier for EmailNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| BotError::NotificationDelivery(e.to_string()))?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| BotError::NotificationDelivery(e.to_string()))?;
        Ok(())
    }
}

/// Writes messages to the log only
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        tracing::info!(subject = %subject, "📣 {}", body);
        Ok(())
    }
}

/// Notifier selected from configuration
pub enum NotifierKind {
    Email(EmailNotifier),
    Webhook(WebhookNotifier),
    Log(LogNotifier),
}

impl NotifierKind {
    /// Email when configured, else the webhook, else log only
    pub fn from_settings(settings: &NotificationSettings, timeout: Duration) -> Result<Self> {
        if let Some(email) = &settings.email {
            return Ok(NotifierKind::Email(EmailNotifier::new(email, timeout)?));
        }
        match settings.webhook() {
            Some(url) => Ok(NotifierKind::Webhook(WebhookNotifier::new(url, timeout)?)),
            None => Ok(NotifierKind::Log(LogNotifier)),
        }
    }

    pub fn channel(&self) -> &'static str {
        match self {
            NotifierKind::Email(_) => "email",
            NotifierKind::Webhook(_) => "webhook",
            NotifierKind::Log(_) => "log",
        }
    }
}

impl Notifier for NotifierKind {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        match self {
            NotifierKind::Email(n) => n.send(subject, body).await,
            NotifierKind::Webhook(n) => n.send(subject, body).await,
            NotifierKind::Log(n) => n.send(subject, body).await,
        }
    }
}

/// Send a message, logging instead of failing when delivery breaks
pub async fn notify_best_effort<N: Notifier>(notifier: &N, subject: &str, body: &str) {
    if let Err(e) = notifier.send(subject, body).await {
        tracing::warn!(subject = %subject, "Notification not delivered: {}", e);
    }
}
