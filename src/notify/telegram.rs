use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

use super::{Notification, Notifier};

const TELEGRAM_API: &str = "https://api.telegram.org";

pub struct TelegramNotifier {
    token: String,
    chat_id: String,
    api_base: String,
    client: Client,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            chat_id: chat_id.into(),
            api_base: TELEGRAM_API.to_string(),
            client: Client::new(),
        }
    }

    /// Optional builder for tests/tools
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn send_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }

    /// Plain text: no `parse_mode`, so `_` and `*` in free text are sent as is.
    fn payload(&self, n: &Notification) -> serde_json::Value {
        serde_json::json!({
            "chat_id": self.chat_id,
            "text": n.body,
        })
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, n: &Notification) -> Result<()> {
        self.client
            .post(self.send_url())
            .timeout(Duration::from_secs(10))
            .json(&self.payload(n))
            .send()
            .await
            .context("telegram sendMessage")?
            .error_for_status()
            .context("telegram non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
