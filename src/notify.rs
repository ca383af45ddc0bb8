//! Alert delivery over Telegram and email.
//!
//! Delivery is best effort: every configured channel is tried once and the alert
//! counts as sent if any one of them succeeds.

use crate::config::{EmailConfig, TelegramConfig};
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const TELEGRAM_API: &str = "https://api.telegram.org";
const TELEGRAM_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("telegram request failed: {0}")]
    Telegram(#[from] reqwest::Error),
    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build email: {0}")]
    Message(#[from] lettre::error::Error),
}

/// One way of getting an alert to a person
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, title: &str, body: &str) -> Result<(), NotifyError>;
}

/// Telegram bot `sendMessage`
pub struct TelegramChannel {
    client: Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl TelegramChannel {
    /// Build from config; `None` unless both token and chat id are set
    pub fn from_config(config: &TelegramConfig) -> Result<Option<Self>, NotifyError> {
        match (config.bot_token.as_deref(), config.chat_id.as_deref()) {
            (Some(token), Some(chat_id)) => Ok(Some(Self::with_api_base(
                TELEGRAM_API,
                token,
                chat_id,
            )?)),
            _ => Ok(None),
        }
    }

    /// Point the channel at another Bot API server
    pub fn with_api_base(
        api_base: &str,
        token: &str,
        chat_id: &str,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(TELEGRAM_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            chat_id: chat_id.to_string(),
        })
    }
}

#[async_trait]
impl NotifyChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        let text = format!("{}\n\n{}", title, body);

        // The request URL carries the bot token; keep it out of errors and logs.
        self.client
            .post(&url)
            .form(&[("chat_id", self.chat_id.as_str()), ("text", text.as_str())])
            .send()
            .await
            .map_err(|e| e.without_url())?
            .error_for_status()
            .map_err(|e| e.without_url())?;
        Ok(())
    }
}

/// SMTP with STARTTLS and login
pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailChannel {
    /// Build from config; `None` unless host, credentials and both addresses are set
    pub fn from_config(config: &EmailConfig) -> Result<Option<Self>, NotifyError> {
        let (Some(host), Some(user), Some(pass), Some(from), Some(to)) = (
            config.smtp_host.as_deref(),
            config.smtp_user.as_deref(),
            config.smtp_pass.as_deref(),
            config.from.as_deref(),
            config.to.as_deref(),
        ) else {
            return Ok(None);
        };

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
            .port(config.smtp_port)
            .credentials(Credentials::new(user.to_string(), pass.to_string()))
            .build();

        Ok(Some(Self {
            transport,
            from: from.parse()?,
            to: to.parse()?,
        }))
    }
}

#[async_trait]
impl NotifyChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(title)
            .body(body.to_string())?;

        self.transport.send(message).await?;
        Ok(())
    }
}

/// Fans an alert out to every channel
#[derive(Default)]
pub struct Notifier {
    channels: Vec<Box<dyn NotifyChannel>>,
}

impl Notifier {
    pub fn new(channels: Vec<Box<dyn NotifyChannel>>) -> Self {
        Self { channels }
    }

    /// Telegram then email, each only if fully configured
    pub fn from_config(
        telegram: &TelegramConfig,
        email: &EmailConfig,
    ) -> Result<Self, NotifyError> {
        let mut channels: Vec<Box<dyn NotifyChannel>> = Vec::new();
        if let Some(channel) = TelegramChannel::from_config(telegram)? {
            channels.push(Box::new(channel));
        }
        if let Some(channel) = EmailChannel::from_config(email)? {
            channels.push(Box::new(channel));
        }
        Ok(Self::new(channels))
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Send to every channel; true if at least one delivered
    pub async fn push_alert(&self, title: &str, body: &str) -> bool {
        let mut delivered = false;

        for channel in &self.channels {
            match channel.send(title, body).await {
                Ok(()) => {
                    debug!(channel = channel.name(), "alert delivered");
                    delivered = true;
                }
                Err(e) => warn!(channel = channel.name(), error = %e, "alert delivery failed"),
            }
        }

        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Stub {
        ok: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl NotifyChannel for Stub {
        fn name(&self) -> &str {
            "stub"
        }

        async fn send(&self, _title: &str, _body: &str) -> Result<(), NotifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.ok {
                Ok(())
            } else {
                Err(NotifyError::Address("nobody".parse::<Mailbox>().unwrap_err()))
            }
        }
    }

    fn stub_notifier(results: &[bool]) -> (Notifier, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let channels = results
            .iter()
            .map(|&ok| {
                Box::new(Stub {
                    ok,
                    calls: Arc::clone(&calls),
                }) as Box<dyn NotifyChannel>
            })
            .collect();
        (Notifier::new(channels), calls)
    }

    #[tokio::test]
    async fn one_success_is_enough() {
        let (notifier, calls) = stub_notifier(&[true, false]);
        assert!(notifier.push_alert("t", "b").await);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let (notifier, _) = stub_notifier(&[false, true]);
        assert!(notifier.push_alert("t", "b").await);
    }

    #[tokio::test]
    async fn both_failing_is_a_failure() {
        let (notifier, calls) = stub_notifier(&[false, false]);
        assert!(!notifier.push_alert("t", "b").await);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn no_channels_means_not_sent() {
        assert!(!Notifier::default().push_alert("t", "b").await);
    }

    #[test]
    fn incomplete_settings_build_no_channels() {
        let telegram = TelegramConfig {
            bot_token: Some("123:abc".to_string()),
            chat_id: None,
        };
        let email = EmailConfig {
            smtp_host: Some("smtp.example.org".to_string()),
            ..EmailConfig::default()
        };

        let notifier = Notifier::from_config(&telegram, &email).unwrap();
        assert!(notifier.channel_names().is_empty());
    }

    #[test]
    fn bad_email_address_is_rejected() {
        let email = EmailConfig {
            smtp_host: Some("smtp.example.org".to_string()),
            smtp_user: Some("user".to_string()),
            smtp_pass: Some("pass".to_string()),
            from: Some("not an address".to_string()),
            to: Some("me@example.org".to_string()),
            ..EmailConfig::default()
        };

        assert!(matches!(
            EmailChannel::from_config(&email),
            Err(NotifyError::Address(_))
        ));
    }
}
