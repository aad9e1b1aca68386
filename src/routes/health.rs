//! Health check endpoint for container orchestration.
//!
//! Liveness probe: always 200 once the HTTP server is up, including while the
//! bot is still initializing. The bot state is reported in the body.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub bot: String,
    pub timestamp: String,
    /// Process start time (ISO-8601)
    pub uptime: String,
    pub uptime_seconds: i64,
}

/// Health check handler.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let now = Utc::now();
    Json(HealthResponse {
        status: "healthy".to_string(),
        bot: state.bot.status().as_str().to_string(),
        timestamp: now.to_rfc3339(),
        uptime: state.started_at.to_rfc3339(),
        uptime_seconds: (now - state.started_at).num_seconds().max(0),
    })
}
