//! Outbound account email.
//!
//! Delivery never blocks or fails a request: [`dispatch`] spawns the send on the
//! runtime and only logs the outcome.

use async_trait::async_trait;
use serde_json::json;
use std::fmt;
use std::sync::Arc;

use crate::config::Config;

const SENDGRID_BASE_URL: &str = "https://api.sendgrid.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Email {
    pub fn welcome(to: &str, name: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Thanks for joining in!".to_string(),
            body: format!(
                "Welcome to the app, {}. Let me know how you get along with the app.",
                name
            ),
        }
    }

    pub fn cancellation(to: &str, name: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Sorry to see you go!".to_string(),
            body: format!(
                "Goodbye, {}. Is there anything we could have done to have kept you on board?",
                name
            ),
        }
    }
}

#[derive(Debug)]
pub enum MailError {
    Transport(reqwest::Error),
    Rejected { status: u16, body: String },
}

impl fmt::Display for MailError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MailError::Transport(err) => write!(f, "mail transport error: {}", err),
            MailError::Rejected { status, body } => {
                write!(f, "mail provider rejected message ({}): {}", status, body)
            }
        }
    }
}

impl std::error::Error for MailError {}

impl From<reqwest::Error> for MailError {
    fn from(err: reqwest::Error) -> Self {
        MailError::Transport(err)
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// Writes messages to the log instead of delivering them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        log::info!("mail to {}: {}", email.to, email.subject);
        log::debug!("mail body: {}", email.body);
        Ok(())
    }
}

/// SendGrid v3 client.
pub struct SendGridMailer {
    client: reqwest::Client,
    api_key: String,
    from: String,
    base_url: String,
}

impl SendGridMailer {
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            from: from.into(),
            base_url: SENDGRID_BASE_URL.to_string(),
        }
    }

    /// Points the client at another host, e.g. a mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        let body = json!({
            "personalizations": [{ "to": [{ "email": email.to }] }],
            "from": { "email": self.from },
            "subject": email.subject,
            "content": [{ "type": "text/plain", "value": email.body }],
        });

        let resp = self
            .client
            .post(format!("{}/v3/mail/send", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(MailError::Rejected { status, body });
        }
        Ok(())
    }
}

/// Picks SendGrid when an API key is configured, the log mailer otherwise.
pub fn from_config(config: &Config) -> Arc<dyn Mailer> {
    match &config.sendgrid_api_key {
        Some(key) => Arc::new(SendGridMailer::new(key.clone(), config.mail_from.clone())),
        None => {
            log::info!("SENDGRID_API_KEY not set; account mail will only be logged");
            Arc::new(LogMailer)
        }
    }
}

/// Sends `email` in the background.
pub fn dispatch(mailer: Arc<dyn Mailer>, email: Email) {
    actix_web::rt::spawn(async move {
        let to = email.to.clone();
        if let Err(err) = mailer.send(email).await {
            log::warn!("failed to send mail to {}: {}", to, err);
        }
    });
}
