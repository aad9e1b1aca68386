//! Worker pool that processes updates.
//!
//! Updates are submitted to a bounded `async_channel` queue shared by
//! `pool_size` workers. Each job carries a oneshot sender that fires once the
//! update has been handled; submitters may await it (webhook) or drop it
//! (poller). Closing the queue lets workers drain what is left and exit.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_channel::{Receiver, Sender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::telegram::Update;

use super::handlers::Handlers;

/// Error type for update submission
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("Update queue closed")]
    Closed,

    #[error("Worker dropped update")]
    Dropped,
}

struct Job {
    update: Update,
    done: oneshot::Sender<()>,
}

/// Cloneable handle to the update queue and its workers.
#[derive(Clone)]
pub struct Dispatcher {
    tx: Sender<Job>,
    rx: Receiver<Job>,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Dispatcher {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = async_channel::bounded(capacity);
        Self {
            tx,
            rx,
            workers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Spawn `count` workers sharing the queue.
    pub fn spawn_workers(&self, count: usize, handlers: Handlers) {
        let mut spawned = Vec::with_capacity(count);
        for id in 0..count {
            let rx = self.rx.clone();
            let handlers = handlers.clone();
            let span = tracing::info_span!("bot.worker", worker = id);
            spawned.push(tokio::spawn(
                async move {
                    tracing::debug!("Worker started");
                    while let Ok(job) = rx.recv().await {
                        handlers.process(&job.update).await;
                        // Submitter may have stopped waiting
                        let _ = job.done.send(());
                    }
                    tracing::debug!("Worker stopped");
                }
                .instrument(span),
            ));
        }

        if let Ok(mut workers) = self.workers.lock() {
            workers.extend(spawned);
        }
        tracing::info!(count, "Spawned update workers");
    }

    /// Queue an update. Waits for queue space when the pool is saturated.
    pub async fn submit(&self, update: Update) -> Result<oneshot::Receiver<()>, DispatchError> {
        let (done, done_rx) = oneshot::channel();
        self.tx
            .send(Job { update, done })
            .await
            .map_err(|_| DispatchError::Closed)?;
        Ok(done_rx)
    }

    /// Number of queued, not yet picked up updates.
    pub fn queued(&self) -> usize {
        self.tx.len()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Close the queue and wait up to `drain` for workers to finish.
    pub async fn shutdown(&self, drain: Duration) {
        self.tx.close();

        let handles: Vec<JoinHandle<()>> = match self.workers.lock() {
            Ok(mut workers) => workers.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        if handles.is_empty() {
            return;
        }

        let count = handles.len();
        match tokio::time::timeout(drain, futures::future::join_all(handles)).await {
            Ok(_) => tracing::info!(count, "Update workers drained"),
            Err(_) => tracing::warn!(
                count,
                drain_secs = drain.as_secs(),
                "Update workers did not finish before shutdown deadline"
            ),
        }
    }
}
