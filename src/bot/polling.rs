//! Long-polling update source for development mode.
//!
//! Removes any registered webhook, skips the pending backlog, then loops on
//! getUpdates and feeds each update to the dispatcher. Transport failures are
//! retried after a fixed delay; the loop stops when the shutdown signal fires
//! or the dispatcher closes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::config::{ALLOWED_UPDATES, POLL_RECONNECT_DELAY_SECS, POLL_TIMEOUT_SECS};
use crate::telegram::{TelegramApi, Update};

use super::dispatcher::{DispatchError, Dispatcher};

/// Poll loop timing.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub timeout_secs: u64,
    pub reconnect_delay: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout_secs: POLL_TIMEOUT_SECS,
            reconnect_delay: Duration::from_secs(POLL_RECONNECT_DELAY_SECS),
        }
    }
}

/// Offset that acknowledges every update up to and including the batch.
fn next_offset(current: Option<i64>, batch: &[Update]) -> Option<i64> {
    batch
        .iter()
        .map(|u| u.update_id + 1)
        .max()
        .or(current)
}

pub async fn run_poller(
    api: Arc<dyn TelegramApi>,
    dispatcher: Dispatcher,
    settings: PollSettings,
    mut shutdown: watch::Receiver<bool>,
) {
    if let Err(e) = api.delete_webhook().await {
        tracing::warn!(error = %e, "Failed to remove webhook before polling");
    }

    // offset -1 returns only the newest pending update; acknowledging it drops the backlog
    let mut offset = match api.get_updates(Some(-1), 0, ALLOWED_UPDATES).await {
        Ok(batch) => {
            if !batch.is_empty() {
                tracing::info!("Dropped pending updates");
            }
            next_offset(None, &batch)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to drop pending updates");
            None
        }
    };

    tracing::info!("Polling for updates");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let result = tokio::select! {
            _ = shutdown.changed() => break,
            result = api.get_updates(offset, settings.timeout_secs, ALLOWED_UPDATES) => result,
        };

        match result {
            Ok(batch) => {
                if !batch.is_empty() {
                    tracing::debug!(count = batch.len(), "Received updates");
                }
                offset = next_offset(offset, &batch);
                for update in batch {
                    if let Err(DispatchError::Closed) = dispatcher.submit(update).await {
                        tracing::info!("Dispatcher closed, stopping poller");
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    retry_secs = settings.reconnect_delay.as_secs(),
                    "getUpdates failed, retrying"
                );
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(settings.reconnect_delay) => {}
                }
            }
        }
    }

    tracing::info!("Poller stopped");
}
