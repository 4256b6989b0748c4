//! Best-effort Telegram notifications. Failures are logged, never propagated.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tracing::warn;

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Telegram notification sink. Disabled instances swallow every message.
pub struct Notifier {
    enabled: bool,
    bot_token: String,
    chat_id: String,
    http: Client,
}

impl Notifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        let enabled = !bot_token.is_empty() && !chat_id.is_empty();
        Self {
            enabled,
            bot_token,
            chat_id,
            http: Client::builder()
                .timeout(SEND_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Build from `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`; disabled when
    /// either is missing.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
            std::env::var("TELEGRAM_CHAT_ID").unwrap_or_default(),
        )
    }

    pub fn disabled() -> Self {
        Self::new(String::new(), String::new())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Send a message, logging any delivery failure.
    pub async fn send(&self, text: &str) {
        if !self.enabled {
            return;
        }

        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let body = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
        });

        match self.http.post(&url).json(&body).send().await {
            Ok(response) if !response.status().is_success() => {
                warn!(status = %response.status(), "telegram send rejected");
            }
            Err(e) => warn!(error = %e, "telegram send failed"),
            Ok(_) => {}
        }
    }

    /// Fire-and-forget variant used on hot paths: the network call runs on a
    /// detached task so the caller never waits on the sink.
    pub fn send_detached(self: &Arc<Self>, text: String) {
        if !self.enabled {
            return;
        }
        let notifier = Arc::clone(self);
        tokio::spawn(async move {
            notifier.send(&text).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credentials_disable_sink() {
        assert!(!Notifier::new(String::new(), "chat".into()).is_enabled());
        assert!(!Notifier::new("token".into(), String::new()).is_enabled());
        assert!(Notifier::new("token".into(), "chat".into()).is_enabled());
    }

    #[tokio::test]
    async fn disabled_send_is_a_noop() {
        Notifier::disabled().send("ignored").await;
    }
}
