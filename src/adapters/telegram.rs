//! Operator notification channel.
//!
//! Every terminal job outcome produces exactly one message on the operator
//! channel. Delivery is best-effort: a notification failure is logged and
//! never masks the job result.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Operator notification collaborator
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
}

/// Configuration for the Telegram notifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

/// Telegram Bot API client
pub struct TelegramClient {
    bot_token: String,
    chat_id: String,
    client: reqwest::Client,
}

/// Response from the Telegram API
#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

impl TelegramClient {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            bot_token,
            chat_id,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: TelegramConfig) -> Self {
        Self::new(config.bot_token, config.chat_id)
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.bot_token, method)
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send(&self, text: &str) -> Result<()> {
        let url = self.api_url("sendMessage");

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": text,
            }))
            .send()
            .await
            .context("Failed to send Telegram message")?;

        let result: TelegramResponse = response
            .json()
            .await
            .context("Failed to parse Telegram response")?;

        if !result.ok {
            anyhow::bail!(
                "Telegram API error: {}",
                result.description.unwrap_or_default()
            );
        }

        Ok(())
    }
}

/// Fallback notifier used when no Telegram channel is configured: outcomes
/// land in the worker log instead.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        tracing::info!(notification = text, "Job outcome");
        Ok(())
    }
}
