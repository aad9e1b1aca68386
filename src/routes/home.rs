//! Service index and configuration summary.

use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::config::{HEALTH_PATH, SERVICE_NAME};
use crate::state::AppState;

/// `GET /`: service identity and endpoint map. The webhook path is redacted.
pub async fn index(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "online",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
        "endpoints": {
            "health": HEALTH_PATH,
            "info": "/info",
            "webhook": state.config.redacted_webhook_path(),
        }
    }))
}

/// `GET /info`: non-secret runtime configuration.
pub async fn info(State(state): State<AppState>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "channel_id": config.bot.channel_id,
        "webhook_enabled": config.webhook.enabled,
        "webhook_url": config.webhook.url,
        "pool_size": config.bot.pool_size,
        "max_connections": config.http.max_connections,
        "mode": config.mode_name(),
    }))
}
