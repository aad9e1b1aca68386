//! Telegram webhook delivery and manual webhook management.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::instrument;

use crate::bot::DispatchError;
use crate::error::AppError;
use crate::state::AppState;
use crate::telegram::Update;

/// Decode a webhook body into an update.
///
/// Empty, non-JSON and empty-object bodies count as "no data"; JSON that is
/// not an update is rejected separately.
fn parse_update(body: &[u8]) -> Result<Update, AppError> {
    if body.is_empty() {
        return Err(AppError::NoData);
    }
    let value: Value = serde_json::from_slice(body).map_err(|_| AppError::NoData)?;
    match &value {
        Value::Null => return Err(AppError::NoData),
        Value::Object(map) if map.is_empty() => return Err(AppError::NoData),
        _ => {}
    }
    serde_json::from_value(value).map_err(|_| AppError::InvalidUpdate)
}

/// `POST /{token}`: process one update, waiting a bounded time for the result.
#[instrument(name = "webhook.receive", skip_all, fields(update_id = tracing::field::Empty))]
pub async fn receive(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if !state.bot.is_ready() {
        return Err(AppError::BotNotReady);
    }

    let update = parse_update(&body)?;
    tracing::Span::current().record("update_id", update.update_id);

    let done = state.bot.submit(update).await?;
    match tokio::time::timeout(state.webhook_timeout, done).await {
        Ok(Ok(())) => Ok((StatusCode::OK, Json(json!({ "status": "ok" })))),
        Ok(Err(_)) => Err(DispatchError::Dropped.into()),
        Err(_) => {
            tracing::warn!("Webhook processing timeout");
            Ok((StatusCode::ACCEPTED, Json(json!({ "status": "processing" }))))
        }
    }
}

/// `POST /webhook/set`
pub async fn set(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let url = state.bot.register_webhook().await?;
    Ok(Json(json!({
        "success": true,
        "webhook_url": url,
    })))
}

/// `POST /webhook/delete`
pub async fn delete(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    state.bot.remove_webhook().await?;
    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_update_rejects_empty_bodies() {
        assert!(matches!(parse_update(b""), Err(AppError::NoData)));
        assert!(matches!(parse_update(b"{}"), Err(AppError::NoData)));
        assert!(matches!(parse_update(b"null"), Err(AppError::NoData)));
        assert!(matches!(parse_update(b"not json"), Err(AppError::NoData)));
    }

    #[test]
    fn test_parse_update_rejects_non_update() {
        assert!(matches!(
            parse_update(br#"{"hello": "world"}"#),
            Err(AppError::InvalidUpdate)
        ));
    }

    #[test]
    fn test_parse_update_accepts_update() {
        let update = parse_update(br#"{"update_id": 5}"#).unwrap();
        assert_eq!(update.update_id, 5);
    }
}
