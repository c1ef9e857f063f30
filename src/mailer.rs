use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use crate::config::MailConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Out-of-band delivery used by the recovery flow.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()>;
}

/// Posts to a transactional email HTTP API (Brevo-compatible payload).
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    sender_email: String,
    sender_name: String,
}

impl HttpMailer {
    pub fn new(cfg: &MailConfig, api_key: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("build mail http client")?;
        Ok(Self {
            client,
            api_url: cfg.api_url.clone(),
            api_key,
            sender_email: cfg.sender_email.clone(),
            sender_name: cfg.sender_name.clone(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        let body = json!({
            "sender": { "email": self.sender_email, "name": self.sender_name },
            "to": [{ "email": email.to }],
            "subject": email.subject,
            "htmlContent": email.html,
        });
        self.client
            .post(&self.api_url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("mail api request")?
            .error_for_status()
            .context("mail api status")?;
        info!(to = %email.to, "email sent");
        Ok(())
    }
}

/// Development fallback: logs the message instead of sending it. The body
/// carries live reset links, so it only shows up at debug level.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        info!(to = %email.to, subject = %email.subject, "email not sent (no mail api key)");
        debug!(to = %email.to, body = %email.html, "unsent email body");
        Ok(())
    }
}

pub fn from_config(cfg: &MailConfig) -> anyhow::Result<std::sync::Arc<dyn Mailer>> {
    Ok(match &cfg.api_key {
        Some(key) => std::sync::Arc::new(HttpMailer::new(cfg, key.clone())?),
        None => std::sync::Arc::new(LogMailer),
    })
}
