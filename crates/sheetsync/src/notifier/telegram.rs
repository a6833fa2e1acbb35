use async_trait::async_trait;
use serde::Serialize;

use super::{NotificationSink, NotifyError, Result};

/// Sends notifications through the Telegram Bot API `sendMessage` method.
#[derive(Debug, Clone)]
pub struct TelegramSink {
    client: reqwest::Client,
    base_url: String,
    token: String,
    chat_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
}

impl TelegramSink {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, chat_ids: Vec<i64>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
            chat_ids,
        }
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.base_url.trim_end_matches('/'),
            self.token
        )
    }

    async fn send(&self, url: &str, chat_id: i64, text: &str) -> Result<()> {
        let response = self
            .client
            .post(url)
            .json(&SendMessage {
                chat_id,
                text,
                parse_mode: "HTML",
            })
            .send()
            .await
            .map_err(|e| NotifyError::Http(e.without_url()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(NotifyError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    /// Sends `text` to every chat. Fails only when no chat received it.
    async fn deliver(&self, text: &str) -> Result<()> {
        if self.chat_ids.is_empty() {
            tracing::debug!("No admin chats configured, notification dropped");
            return Ok(());
        }

        let url = self.send_message_url();
        let mut delivered = 0usize;

        for chat_id in &self.chat_ids {
            match self.send(&url, *chat_id, text).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(chat_id, error = %e, "Failed to notify admin"),
            }
        }

        if delivered == 0 {
            return Err(NotifyError::Undelivered(self.chat_ids.len()));
        }

        tracing::debug!(delivered, total = self.chat_ids.len(), "Notification delivered");
        Ok(())
    }
}
