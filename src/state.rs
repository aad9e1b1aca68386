//! Shared application state for request handlers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::bot::Bot;
use crate::config::{AppConfig, HTTP_REQUEST_TIMEOUT_SECS, WEBHOOK_PROCESS_TIMEOUT_SECS};

/// Shared application state, cloneable across handlers via Arc-wrapped fields.
///
/// Holds the configuration, the bot handle used by the webhook routes, and
/// the process start time reported by the health endpoint.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub bot: Bot,
    pub started_at: DateTime<Utc>,
    /// How long a webhook delivery waits for its update to be handled
    pub webhook_timeout: Duration,
    /// Per-request deadline applied by the router
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, bot: Bot) -> Self {
        Self {
            config,
            bot,
            started_at: Utc::now(),
            webhook_timeout: Duration::from_secs(WEBHOOK_PROCESS_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_webhook_timeout(mut self, webhook_timeout: Duration) -> Self {
        self.webhook_timeout = webhook_timeout;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}
