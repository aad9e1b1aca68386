//! Telegram Bot API access.
//!
//! `TelegramApi` is the seam between the bot logic and the network. The
//! production implementation (`HttpTelegramClient`) speaks the HTTPS Bot API
//! through reqwest; `MockTelegram` records calls in memory for tests and local
//! runs without a token.

pub mod client;
pub mod mock;
pub mod types;

use async_trait::async_trait;
use serde::Serialize;

pub use client::HttpTelegramClient;
pub use mock::{MockCall, MockTelegram};
pub use types::{Chat, ChatType, Message, Update, User};

/// Error type for Bot API calls.
///
/// Cloneable so results can be handed across channels and scripted in mocks.
/// The `Api` variant displays the raw API description, which callers classify
/// by substring.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TelegramError {
    #[error("{description}")]
    Api {
        code: Option<i32>,
        description: String,
    },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl TelegramError {
    /// Shorthand for an API error with a 400 code, the common Bot API failure.
    pub fn bad_request(description: impl Into<String>) -> Self {
        TelegramError::Api {
            code: Some(400),
            description: description.into(),
        }
    }
}

/// Parameters for setWebhook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetWebhook {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<usize>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub drop_pending_updates: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_updates: Vec<String>,
}

impl SetWebhook {
    /// Plain registration with Telegram defaults for everything but the URL.
    pub fn url_only(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: None,
            drop_pending_updates: false,
            allowed_updates: Vec::new(),
        }
    }
}

/// Operations the bot needs from the Bot API.
#[async_trait]
pub trait TelegramApi: Send + Sync {
    /// Fetch the bot's own user (also validates the token).
    async fn get_me(&self) -> Result<User, TelegramError>;

    /// Send an HTML-formatted message.
    async fn send_message(&self, chat_id: i64, html: &str) -> Result<(), TelegramError>;

    async fn unban_chat_member(
        &self,
        chat_id: i64,
        user_id: i64,
        only_if_banned: bool,
    ) -> Result<(), TelegramError>;

    async fn set_webhook(&self, request: &SetWebhook) -> Result<(), TelegramError>;

    async fn delete_webhook(&self) -> Result<(), TelegramError>;

    /// Long-poll for updates. `offset` acknowledges everything before it.
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
        allowed_updates: &[&str],
    ) -> Result<Vec<Update>, TelegramError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_displays_description() {
        let err = TelegramError::bad_request("Bad Request: not enough rights");
        assert_eq!(err.to_string(), "Bad Request: not enough rights");
    }

    #[test]
    fn test_set_webhook_serialization_skips_defaults() {
        let json = serde_json::to_value(SetWebhook::url_only("https://x/1:a")).unwrap();
        assert_eq!(json, serde_json::json!({"url": "https://x/1:a"}));

        let full = SetWebhook {
            url: "https://x/1:a".to_string(),
            max_connections: Some(100),
            drop_pending_updates: true,
            allowed_updates: vec!["message".to_string()],
        };
        let json = serde_json::to_value(full).unwrap();
        assert_eq!(json["max_connections"], 100);
        assert_eq!(json["drop_pending_updates"], true);
        assert_eq!(json["allowed_updates"][0], "message");
    }
}
