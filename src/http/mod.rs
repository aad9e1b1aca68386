//! HTTP server module.
//!
//! Plain HTTP only; TLS is terminated by the platform in front of the
//! container. The server includes:
//! - Background bot startup with fail-fast shutdown
//! - Graceful shutdown on SIGTERM/SIGINT

mod server;
mod shutdown;

pub use server::{start_server, ServerError};
