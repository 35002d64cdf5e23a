use teloxide::types::{Message, Update, UpdateKind};
use tracing::Instrument;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Command, InboundMessage, OutboundReply, Payload};
use crate::services::conversation;
use crate::state::AppState;

pub const IMAGE_TOO_LARGE_REPLY: &str =
    "This image is too large for me to process. Please send a smaller image.";

pub const VOICE_TOO_LONG_REPLY: &str =
    "This voice message is too long. Please keep it under a minute or send the details as text.";

const DEFAULT_IMAGE_MIME: &str = "image/jpeg";
const DEFAULT_VOICE_MIME: &str = "audio/ogg";

/// What a Telegram message turns into before the pipeline sees it.
enum Inbound {
    Message(InboundMessage),
    /// Refused at the door (over a size limit); the reply explains why.
    Rejected(OutboundReply),
    Ignored,
}

/// Entry point for webhook deliveries: only new messages are handled.
pub async fn handle_update(state: &AppState, update: Update) {
    match update.kind {
        UpdateKind::Message(message) => handle_message(state, message).await,
        _ => tracing::debug!(update_id = ?update.id, "ignoring non-message update"),
    }
}

/// Handles one Telegram message end to end: download, process, reply.
/// A failed delivery is logged and dropped; nothing is retried.
pub async fn handle_message(state: &AppState, message: Message) {
    let chat_id = message.chat.id.0;
    let span = tracing::info_span!(
        "message",
        request_id = %Uuid::new_v4(),
        message_id = message.id.0,
        chat_id
    );

    async move {
        let reply = match to_inbound(state, &message).await {
            Ok(Inbound::Message(inbound)) => conversation::process_message(state, inbound).await,
            Ok(Inbound::Rejected(reply)) => reply,
            Ok(Inbound::Ignored) => {
                tracing::debug!("ignoring unsupported message");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to fetch message content");
                OutboundReply::text(conversation::PROVIDER_ERROR_REPLY)
            }
        };

        if let Err(e) = state.messaging.send_reply(chat_id, &reply).await {
            tracing::warn!(error = %e, "failed to deliver reply, discarding");
        }
    }
    .instrument(span)
    .await
}

async fn to_inbound(state: &AppState, message: &Message) -> Result<Inbound, AppError> {
    let payload = if let Some(text) = message.text() {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Inbound::Ignored);
        }
        tracing::info!(text = %text, "incoming text");
        match Command::parse(text) {
            Some(command) => Payload::Command(command),
            None => Payload::Text(text.to_string()),
        }
    } else if let Some(photos) = message.photo() {
        // Telegram sends every resolution; the largest reads best.
        let Some(photo) = photos
            .iter()
            .max_by_key(|p| u64::from(p.width) * u64::from(p.height))
        else {
            return Ok(Inbound::Ignored);
        };
        let limit = state.config.max_image_bytes();
        if u64::from(photo.file.size) > limit {
            tracing::info!(size = photo.file.size, limit, "image rejected");
            return Ok(Inbound::Rejected(OutboundReply::text(IMAGE_TOO_LARGE_REPLY)));
        }

        let bytes = state.messaging.download_file(&photo.file.id).await?;
        if bytes.len() as u64 > limit {
            tracing::info!(size = bytes.len(), limit, "image rejected after download");
            return Ok(Inbound::Rejected(OutboundReply::text(IMAGE_TOO_LARGE_REPLY)));
        }
        tracing::info!(size = bytes.len(), "incoming image");
        Payload::Image {
            bytes,
            mime_type: DEFAULT_IMAGE_MIME.to_string(),
        }
    } else if let Some(voice) = message.voice() {
        let duration = voice.duration.seconds();
        let limit = state.config.max_audio_duration_seconds;
        if duration > limit {
            tracing::info!(duration, limit, "voice rejected");
            return Ok(Inbound::Rejected(OutboundReply::text(VOICE_TOO_LONG_REPLY)));
        }

        let bytes = state.messaging.download_file(&voice.file.id).await?;
        tracing::info!(size = bytes.len(), duration, "incoming voice");
        Payload::Voice {
            bytes,
            mime_type: voice
                .mime_type
                .as_ref()
                .map(|m| m.essence_str().to_string())
                .unwrap_or_else(|| DEFAULT_VOICE_MIME.to_string()),
        }
    } else {
        return Ok(Inbound::Ignored);
    };

    Ok(Inbound::Message(InboundMessage {
        chat_id: message.chat.id.0,
        first_name: message.from.as_ref().map(|u| u.first_name.clone()),
        received_at: message.date,
        payload,
    }))
}
