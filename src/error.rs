use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::bot::{BotError, DispatchError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bot not initialized")]
    BotNotReady,

    #[error("No data")]
    NoData,

    #[error("Invalid update")]
    InvalidUpdate,

    #[error(transparent)]
    Bot(#[from] BotError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BotNotReady => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NoData | AppError::InvalidUpdate => StatusCode::BAD_REQUEST,
            AppError::Bot(BotError::WebhookNotConfigured) => StatusCode::BAD_REQUEST,
            AppError::Bot(_) | AppError::Dispatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
