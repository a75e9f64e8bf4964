use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use aws_sdk_sesv2 as ses;
use ses::types::{Body, Content, Destination, EmailContent, Message};

use crate::config::SesConfig;
use crate::sync::SyncError;

/// OutgoingEmail
///
/// A single message with a plain-text body and an optional HTML alternative.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
}

/// Mailer
///
/// Outbound email. Production sends through SES; tests use `MockMailer`.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), SyncError>;
}

pub type MailerState = Arc<dyn Mailer>;

/// SesMailer
///
/// `Mailer` backed by the SES v2 API with static credentials.
#[derive(Clone)]
pub struct SesMailer {
    client: ses::Client,
}

impl SesMailer {
    pub fn new(config: &SesConfig) -> Self {
        let credentials = ses::config::Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "static",
        );

        let sdk_config = ses::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(&config.endpoint)
            .region(ses::config::Region::new(config.region.clone()))
            .behavior_version_latest()
            .build();

        Self {
            client: ses::Client::from_conf(sdk_config),
        }
    }
}

fn utf8_content(data: &str) -> Result<Content, SyncError> {
    Content::builder()
        .data(data)
        .charset("UTF-8")
        .build()
        .map_err(|e| SyncError::Config(format!("invalid email content: {}", e)))
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), SyncError> {
        let mut body = Body::builder().text(utf8_content(&email.body_text)?);
        if let Some(html) = &email.body_html {
            body = body.html(utf8_content(html)?);
        }

        let message = Message::builder()
            .subject(utf8_content(&email.subject)?)
            .body(body.build())
            .build();

        self.client
            .send_email()
            .from_email_address(&email.from)
            .destination(Destination::builder().to_addresses(&email.to).build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("ses send_email failed: {}", e)))?;

        tracing::debug!(to = %email.to, subject = %email.subject, "email sent");
        Ok(())
    }
}

/// MockMailer
///
/// Records every message instead of sending it. Messages addressed to one of
/// `failing_recipients`, or every message when `should_fail` is set, are rejected.
#[derive(Clone, Default)]
pub struct MockMailer {
    pub should_fail: bool,
    pub failing_recipients: Vec<String>,
    pub sent: Arc<Mutex<Vec<OutgoingEmail>>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), SyncError> {
        if self.should_fail || self.failing_recipients.contains(&email.to) {
            return Err(SyncError::Rejected(format!("mock mailer refused {}", email.to)));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }
        Ok(())
    }
}
