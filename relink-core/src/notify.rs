use crate::config::AppConfig;
use crate::detect::{Change, ChangeKind};
use crate::error::{CoreError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Sends one message per changed label.
///
/// Notifiers are driven on a current-thread runtime, so the future carries no
/// `Send` bound. Implementations may use `async fn`.
pub trait Notifier {
    fn notify(&self, change: &Change) -> impl Future<Output = Result<()>>;
}

pub fn format_message(site_name: &str, change: &Change) -> String {
    match change.kind {
        ChangeKind::Added => format!(
            "{}: {} is now available: {}",
            site_name, change.label, change.new_url
        ),
        ChangeKind::Updated => format!(
            "{}: {} has been updated: {} -> {}",
            site_name,
            change.label,
            change.old_url.as_deref().unwrap_or("?"),
            change.new_url
        ),
    }
}

pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: String,
    chat_id: String,
    site_name: String,
}

impl TelegramNotifier {
    pub fn new(
        client: Client,
        api_base: &str,
        token: &str,
        chat_id: &str,
        site_name: &str,
    ) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            chat_id: chat_id.to_string(),
            site_name: site_name.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

impl Notifier for TelegramNotifier {
    async fn notify(&self, change: &Change) -> Result<()> {
        let text = format_message(&self.site_name, change);
        let response = self
            .client
            .get(self.endpoint())
            .query(&[("chat_id", self.chat_id.as_str()), ("text", text.as_str())])
            .send()
            .await
            // The request URL embeds the bot token
            .map_err(|e| CoreError::Http(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::Notify(format!(
                "Telegram returned {} for {}",
                status.as_u16(),
                change.label
            )));
        }

        info!("Notification sent via Telegram for {}", change.label);
        Ok(())
    }
}

/// Logs messages instead of sending them.
pub struct LogNotifier {
    site_name: String,
}

impl LogNotifier {
    pub fn new(site_name: &str) -> Self {
        Self {
            site_name: site_name.to_string(),
        }
    }
}

impl Notifier for LogNotifier {
    async fn notify(&self, change: &Change) -> Result<()> {
        info!("{}", format_message(&self.site_name, change));
        Ok(())
    }
}

/// The notifier selected by configuration.
pub enum ConfiguredNotifier {
    Telegram(TelegramNotifier),
    Log(LogNotifier),
}

impl ConfiguredNotifier {
    /// Telegram when a `[telegram]` section and a token are present, logging otherwise.
    pub fn from_config(config: &AppConfig, client: Client) -> Result<Self> {
        let Some(telegram) = &config.telegram else {
            return Ok(Self::Log(LogNotifier::new(&config.site_name)));
        };

        let token = config.telegram_token().ok_or_else(|| {
            CoreError::config("[telegram] is configured but no bot token was provided")
        })?;

        Ok(Self::Telegram(TelegramNotifier::new(
            client,
            &telegram.api_base,
            &token,
            &telegram.chat_id,
            &config.site_name,
        )))
    }
}

impl Notifier for ConfiguredNotifier {
    async fn notify(&self, change: &Change) -> Result<()> {
        match self {
            ConfiguredNotifier::Telegram(n) => n.notify(change).await,
            ConfiguredNotifier::Log(n) => n.notify(change).await,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifySummary {
    pub sent: usize,
    pub failed: usize,
}

/// Fire-and-forget: failures are logged and counted, never returned.
pub async fn notify_all<N: Notifier>(notifier: &N, changes: &[Change]) -> NotifySummary {
    let mut summary = NotifySummary::default();
    for change in changes {
        match notifier.notify(change).await {
            Ok(()) => summary.sent += 1,
            Err(e) => {
                warn!("Error sending notification for {}: {}", change.label, e);
                summary.failed += 1;
            }
        }
    }
    summary
}
