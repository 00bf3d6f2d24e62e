// SPDX-License-Identifier: MIT

//! Chat transport for operator-facing alerts (bot-API style).

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Errors from the chat transport.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat send failed: {0}")]
    Send(String),
}

/// Sends a text message to a chat id (a group or an operator DM).
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), ChatError>;
}

/// Production transport posting to a bot HTTP API.
pub struct HttpChatTransport {
    api_base: String,
    bot_token: String,
    client: reqwest::Client,
}

impl HttpChatTransport {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self::with_base("https://api.telegram.org", bot_token)
    }

    pub fn with_base(api_base: impl Into<String>, bot_token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
            client,
        }
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), ChatError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        });
        let resp = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Send(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ChatError::Send(format!("status {}", resp.status().as_u16())));
        }
        Ok(())
    }
}

/// Recording chat double for tests.
#[derive(Default)]
pub struct FakeChatTransport {
    sent: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl FakeChatTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    /// Messages sent so far as `(chat_id, text)` pairs.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, chat_id: &str) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(id, _)| id == chat_id)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl ChatTransport for FakeChatTransport {
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), ChatError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ChatError::Send("injected chat failure".into()));
        }
        self.sent.lock().push((chat_id.to_string(), text.to_string()));
        Ok(())
    }
}

#[cfg(test)]
#[path = "chat_tests.rs"]
mod tests;
