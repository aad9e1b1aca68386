//! unbanbot: a Telegram bot service that unbans users from a channel.
//!
//! The service answers Telegram webhook deliveries (or long-polls in
//! development), exposes health and info endpoints for orchestration, and
//! ships a `healthcheck` probe for the container image.

pub mod bot;
pub mod config;
pub mod error;
pub mod http;
pub mod middleware;
pub mod probe;
pub mod routes;
pub mod state;
pub mod telegram;

pub use error::AppError;
pub use state::AppState;
