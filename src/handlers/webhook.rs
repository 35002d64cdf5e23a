use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use teloxide::types::Update;

use crate::errors::AppError;
use crate::services::dispatch;
use crate::state::AppState;

pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Acknowledges the update straight away and processes it on its own task,
/// so a dropped connection cannot cancel model calls halfway through.
pub async fn telegram_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> Response {
    if let Some(secret) = &state.config.webhook_secret {
        let provided = headers
            .get(SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if provided != secret {
            tracing::warn!(update_id = ?update.id, "webhook secret mismatch");
            return AppError::Unauthorized.into_response();
        }
    }

    tokio::spawn(async move {
        dispatch::handle_update(&state, update).await;
    });

    StatusCode::OK.into_response()
}
