use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Command, InboundMessage, Payload};
use crate::services::conversation;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct DevMessage {
    #[serde(default)]
    pub chat_id: i64,
    pub text: String,
    /// Pins "now" so relative dates are reproducible.
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct DevResponse {
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Runs a text message through the pipeline and returns the reply instead of
/// sending it to Telegram.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DevMessage>,
) -> Json<DevResponse> {
    let text = payload.text.trim().to_string();
    tracing::info!(chat_id = payload.chat_id, text = %text, "dev message");

    let inbound = InboundMessage {
        chat_id: payload.chat_id,
        first_name: None,
        received_at: payload.received_at.unwrap_or_else(Utc::now),
        payload: match Command::parse(&text) {
            Some(command) => Payload::Command(command),
            None => Payload::Text(text),
        },
    };

    let reply = conversation::process_message(&state, inbound).await;

    Json(DevResponse {
        reply: reply.text,
        link: reply.link.map(|l| l.url),
    })
}
