//! Bot lifecycle: initialization, update source selection and shutdown.
//!
//! [`Bot::startup`] runs in the background while the HTTP server is already
//! answering health checks. It validates the token with getMe, then either
//! registers the webhook, starts long polling (development), or leaves the bot
//! idle with a warning when no update source is configured.

pub mod dispatcher;
pub mod handlers;
pub mod polling;
pub mod replies;

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::{
    AppConfig, ALLOWED_UPDATES, BOT_SHUTDOWN_DRAIN_SECS, DISPATCH_QUEUE_CAPACITY,
    WEBHOOK_ADMIN_TIMEOUT_SECS,
};
use crate::telegram::{SetWebhook, TelegramApi, TelegramError, Update};

pub use dispatcher::{DispatchError, Dispatcher};
pub use handlers::Handlers;
pub use polling::PollSettings;

/// Error type for bot lifecycle operations
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("Failed to initialize bot: {0}")]
    Init(TelegramError),

    #[error("{0}")]
    Webhook(TelegramError),

    #[error("WEBHOOK_URL not configured")]
    WebhookNotConfigured,

    #[error("{0} timed out")]
    Timeout(&'static str),
}

/// Coarse bot state reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BotStatus {
    Starting = 0,
    Ready = 1,
    Stopping = 2,
}

impl BotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotStatus::Starting => "starting",
            BotStatus::Ready => "ready",
            BotStatus::Stopping => "stopping",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => BotStatus::Ready,
            2 => BotStatus::Stopping,
            _ => BotStatus::Starting,
        }
    }
}

impl fmt::Display for BotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Shared {
    api: Arc<dyn TelegramApi>,
    config: Arc<AppConfig>,
    status: AtomicU8,
    username: Arc<OnceLock<String>>,
    dispatcher: Dispatcher,
    shutdown_tx: watch::Sender<bool>,
    poller: Mutex<Option<JoinHandle<()>>>,
    poll_settings: PollSettings,
}

/// Cloneable handle to the running bot.
#[derive(Clone)]
pub struct Bot {
    shared: Arc<Shared>,
}

impl Bot {
    pub fn new(api: Arc<dyn TelegramApi>, config: Arc<AppConfig>) -> Self {
        Self::with_poll_settings(api, config, PollSettings::default())
    }

    pub fn with_poll_settings(
        api: Arc<dyn TelegramApi>,
        config: Arc<AppConfig>,
        poll_settings: PollSettings,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                api,
                config,
                status: AtomicU8::new(BotStatus::Starting as u8),
                username: Arc::new(OnceLock::new()),
                dispatcher: Dispatcher::new(DISPATCH_QUEUE_CAPACITY),
                shutdown_tx,
                poller: Mutex::new(None),
                poll_settings,
            }),
        }
    }

    pub fn api(&self) -> &Arc<dyn TelegramApi> {
        &self.shared.api
    }

    pub fn status(&self) -> BotStatus {
        BotStatus::from_u8(self.shared.status.load(Ordering::Acquire))
    }

    pub fn is_ready(&self) -> bool {
        self.status() == BotStatus::Ready
    }

    fn set_status(&self, status: BotStatus) {
        self.shared.status.store(status as u8, Ordering::Release);
    }

    /// Initialize the bot and attach its update source.
    pub async fn startup(&self) -> Result<(), BotError> {
        let config = &self.shared.config;
        tracing::info!("Initializing bot...");

        let me = self.shared.api.get_me().await.map_err(BotError::Init)?;
        if let Some(username) = me.username.clone() {
            let _ = self.shared.username.set(username);
        }

        self.shared.dispatcher.spawn_workers(
            config.bot.pool_size,
            Handlers::new(
                self.shared.api.clone(),
                config.bot.channel_id,
                self.shared.username.clone(),
            ),
        );
        self.set_status(BotStatus::Ready);
        tracing::info!(
            bot_id = me.id,
            username = me.username.as_deref().unwrap_or_default(),
            pool_size = config.bot.pool_size,
            "Bot initialized"
        );

        if config.webhook_active() {
            let url = config.webhook_full_url().ok_or(BotError::WebhookNotConfigured)?;
            tracing::info!(url = %redact_url(config, &url), "Setting webhook");

            self.shared
                .api
                .set_webhook(&SetWebhook {
                    url,
                    max_connections: Some(config.http.max_connections),
                    drop_pending_updates: true,
                    allowed_updates: ALLOWED_UPDATES.iter().map(|s| s.to_string()).collect(),
                })
                .await
                .map_err(BotError::Init)?;
            tracing::info!("Webhook set successfully");
        } else if config.development {
            tracing::info!("Starting polling (development mode)");
            let handle = tokio::spawn(polling::run_poller(
                self.shared.api.clone(),
                self.shared.dispatcher.clone(),
                self.shared.poll_settings,
                self.shared.shutdown_tx.subscribe(),
            ));
            if let Ok(mut poller) = self.shared.poller.lock() {
                *poller = Some(handle);
            }
        } else {
            tracing::warn!(
                "No update source configured: enable the webhook or run in development mode"
            );
        }

        Ok(())
    }

    /// Queue an update for processing.
    pub async fn submit(&self, update: Update) -> Result<oneshot::Receiver<()>, DispatchError> {
        self.shared.dispatcher.submit(update).await
    }

    /// Register the configured webhook URL with Telegram defaults.
    pub async fn register_webhook(&self) -> Result<String, BotError> {
        let url = self
            .shared
            .config
            .webhook_full_url()
            .ok_or(BotError::WebhookNotConfigured)?;

        let request = SetWebhook::url_only(url.clone());
        match tokio::time::timeout(
            Duration::from_secs(WEBHOOK_ADMIN_TIMEOUT_SECS),
            self.shared.api.set_webhook(&request),
        )
        .await
        {
            Ok(Ok(())) => {
                tracing::info!(
                    url = %redact_url(&self.shared.config, &url),
                    "Webhook registered"
                );
                Ok(url)
            }
            Ok(Err(e)) => Err(BotError::Webhook(e)),
            Err(_) => Err(BotError::Timeout("setWebhook")),
        }
    }

    pub async fn remove_webhook(&self) -> Result<(), BotError> {
        match tokio::time::timeout(
            Duration::from_secs(WEBHOOK_ADMIN_TIMEOUT_SECS),
            self.shared.api.delete_webhook(),
        )
        .await
        {
            Ok(Ok(())) => {
                tracing::info!("Webhook deleted");
                Ok(())
            }
            Ok(Err(e)) => Err(BotError::Webhook(e)),
            Err(_) => Err(BotError::Timeout("deleteWebhook")),
        }
    }

    /// Stop the poller and drain workers.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down bot...");
        self.set_status(BotStatus::Stopping);
        let _ = self.shared.shutdown_tx.send(true);

        let poller = self.shared.poller.lock().ok().and_then(|mut p| p.take());
        if let Some(handle) = poller {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Poller task failed");
            }
        }

        self.shared
            .dispatcher
            .shutdown(Duration::from_secs(BOT_SHUTDOWN_DRAIN_SECS))
            .await;
        tracing::info!("Shutdown complete");
    }
}

/// Replace the token inside a webhook URL for logging.
fn redact_url(config: &AppConfig, url: &str) -> String {
    if config.bot.token.is_empty() {
        url.to_string()
    } else {
        url.replace(&config.bot.token, &config.redacted_token())
    }
}
