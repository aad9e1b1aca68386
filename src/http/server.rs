//! HTTP server startup logic.
//!
//! The server starts listening first so health probes succeed while the bot
//! initializes in the background. A failed bot startup stops the server and
//! is returned as the server's error.

use std::net::SocketAddr;

use axum::Router;
use axum_server::Handle;

use crate::bot::{Bot, BotError};
use crate::config::AppConfig;

use super::shutdown;

/// Server startup error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid http.host or http.port: {0}")]
    InvalidAddress(String),

    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error(transparent)]
    Startup(#[from] BotError),
}

/// Start the HTTP server and the bot, then shut both down on signal.
///
/// This function blocks until the server shuts down.
pub async fn start_server(app: Router, config: &AppConfig, bot: Bot) -> Result<(), ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.http.host, config.http.port)
        .parse()
        .map_err(|e| ServerError::InvalidAddress(format!("{}", e)))?;

    let handle = Handle::new();
    shutdown::setup_shutdown_handler(handle.clone());

    let startup = tokio::spawn({
        let bot = bot.clone();
        let handle = handle.clone();
        async move {
            let result = bot.startup().await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "Bot startup failed, stopping server");
                handle.shutdown();
            }
            result
        }
    });

    tracing::info!(%addr, "Starting HTTP server");
    let served = axum_server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service())
        .await;

    let startup_result = if startup.is_finished() {
        startup.await.ok()
    } else {
        startup.abort();
        None
    };

    bot.shutdown().await;

    served?;
    match startup_result {
        Some(Err(e)) => Err(e.into()),
        _ => Ok(()),
    }
}
