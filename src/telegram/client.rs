//! reqwest-backed Bot API client.
//!
//! Every method is a JSON POST to `{base}/bot{token}/{method}`. Telegram
//! answers non-2xx statuses with the same envelope, so the body is decoded
//! regardless of status. Transport errors are stripped of their URL before
//! being surfaced, since the URL embeds the bot token.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::instrument;

use crate::config::POLL_TIMEOUT_SECS;

use super::types::ApiResponse;
use super::{SetWebhook, TelegramApi, TelegramError, Update, User};

/// Extra slack on top of the long-poll timeout before the HTTP client gives up
const HTTP_TIMEOUT_SLACK_SECS: u64 = 15;

/// Bot API client over HTTPS.
///
/// Deliberately not `Debug`: the endpoint contains the bot token.
#[derive(Clone)]
pub struct HttpTelegramClient {
    http: reqwest::Client,
    /// `{api_base}/bot{token}`
    endpoint: String,
}

impl HttpTelegramClient {
    pub fn new(api_base_url: &str, token: &str) -> Result<Self, TelegramError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + HTTP_TIMEOUT_SLACK_SECS))
            .build()
            .map_err(|e| TelegramError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: format!("{}/bot{}", api_base_url.trim_end_matches('/'), token),
        })
    }

    async fn call<P, T>(&self, method: &str, params: &P) -> Result<T, TelegramError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.endpoint, method);

        let response = self
            .http
            .post(&url)
            .json(params)
            .send()
            .await
            .map_err(|e| TelegramError::Http(e.without_url().to_string()))?;

        let status = response.status();
        let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
            TelegramError::Decode(format!("{} (HTTP {})", e.without_url(), status.as_u16()))
        })?;

        decode_envelope(envelope)
    }
}

fn decode_envelope<T>(envelope: ApiResponse<T>) -> Result<T, TelegramError> {
    if !envelope.ok {
        return Err(TelegramError::Api {
            code: envelope.error_code,
            description: envelope
                .description
                .unwrap_or_else(|| "Unknown Bot API error".to_string()),
        });
    }
    envelope
        .result
        .ok_or_else(|| TelegramError::Decode("Response has no result".to_string()))
}

#[async_trait]
impl TelegramApi for HttpTelegramClient {
    #[instrument(name = "telegram.get_me", skip(self))]
    async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &json!({})).await
    }

    #[instrument(name = "telegram.send_message", skip(self, html))]
    async fn send_message(&self, chat_id: i64, html: &str) -> Result<(), TelegramError> {
        let _: serde_json::Value = self
            .call(
                "sendMessage",
                &json!({
                    "chat_id": chat_id,
                    "text": html,
                    "parse_mode": "HTML",
                }),
            )
            .await?;
        Ok(())
    }

    #[instrument(name = "telegram.unban_chat_member", skip(self))]
    async fn unban_chat_member(
        &self,
        chat_id: i64,
        user_id: i64,
        only_if_banned: bool,
    ) -> Result<(), TelegramError> {
        let _: bool = self
            .call(
                "unbanChatMember",
                &json!({
                    "chat_id": chat_id,
                    "user_id": user_id,
                    "only_if_banned": only_if_banned,
                }),
            )
            .await?;
        Ok(())
    }

    #[instrument(name = "telegram.set_webhook", skip_all)]
    async fn set_webhook(&self, request: &SetWebhook) -> Result<(), TelegramError> {
        let _: bool = self.call("setWebhook", request).await?;
        Ok(())
    }

    #[instrument(name = "telegram.delete_webhook", skip(self))]
    async fn delete_webhook(&self) -> Result<(), TelegramError> {
        let _: bool = self.call("deleteWebhook", &json!({})).await?;
        Ok(())
    }

    #[instrument(name = "telegram.get_updates", skip(self, allowed_updates))]
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
        allowed_updates: &[&str],
    ) -> Result<Vec<Update>, TelegramError> {
        let mut params = json!({
            "timeout": timeout_secs,
            "allowed_updates": allowed_updates,
        });
        if let Some(offset) = offset {
            params["offset"] = json!(offset);
        }
        self.call("getUpdates", &params).await
    }
}
