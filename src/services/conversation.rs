use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::errors::AppError;
use crate::models::{
    CanonicalEvent, Command, InboundMessage, Intent, OutboundReply, Payload, RawExtraction,
};
use crate::services::ai::{parser, prompts, CompletionRequest};
use crate::services::{calendar, normalizer};
use crate::state::AppState;

pub const BUTTON_LABEL: &str = "Add to my Calendar";

/// Image extractions the model is less sure about than this get no link.
pub const IMAGE_CONFIDENCE_THRESHOLD: f64 = 0.5;

const DESCRIPTION_MAX_CHARS: usize = 200;

pub const GREETING_REPLY: &str = "Hello! How can I help you with your calendar today?";

pub const HELP_REPLY: &str = "I can help you manage your calendar. Here are some examples of what you can do:\n\n\
- \"Remind me to buy milk tomorrow at 10am\"\n\
- \"Add work meeting on Monday at 9:00\"\n\
- Send an image of an event poster\n\
- Send a voice message describing an event\n\n\
To get started, simply type or send a message with the event information.";

pub const OTHER_REPLY: &str = "I'm not sure what you want to do. Can you be more specific? \
For example, \"Add meeting with Peter on Friday at 3:00 PM\".";

pub const RESTATE_REPLY: &str = "I couldn't work out when this event takes place. \
Could you restate it with a clear date and time? For example, \"Dentist next Tuesday at 2:30pm\".";

pub const PROVIDER_ERROR_REPLY: &str =
    "Sorry, an error occurred while processing your message. Please try again in a moment.";

pub const QUOTA_REPLY: &str =
    "Sorry, I'm receiving too many requests right now. Please try again in a minute.";

pub const IMAGE_NO_EVENT_REPLY: &str = "I couldn't detect event information in this image. \
Please send a clearer image or provide the event details in text.";

pub const NO_TRANSCRIPT_REPLY: &str = "Sorry, I couldn't transcribe your audio message. \
Please try again or send your message as text.";

/// Where a message is in the pipeline. Only used for logging; nothing is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Transcribing,
    ClassifyingIntent,
    ExtractingFields,
    Normalizing,
    LinkBuilding,
    Replying,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Transcribing => "transcribing",
            Stage::ClassifyingIntent => "classifying_intent",
            Stage::ExtractingFields => "extracting_fields",
            Stage::Normalizing => "normalizing",
            Stage::LinkBuilding => "link_building",
            Stage::Replying => "replying",
            Stage::Done => "done",
        }
    }
}

/// Runs one inbound message through the pipeline and always produces exactly
/// one reply: every failure is turned into user-facing text here.
pub async fn process_message(state: &AppState, message: InboundMessage) -> OutboundReply {
    let mut pipeline = Pipeline {
        state,
        chat_id: message.chat_id,
        received_at: message.received_at,
        now: message
            .received_at
            .with_timezone(&state.config.default_timezone),
        stage: Stage::Received,
    };

    let reply = match pipeline
        .run(message.payload, message.first_name.as_deref())
        .await
    {
        Ok(reply) => reply,
        Err(e) => pipeline.recover(e),
    };

    pipeline.enter(Stage::Replying);
    pipeline.enter(Stage::Done);
    reply
}

struct Pipeline<'a> {
    state: &'a AppState,
    chat_id: i64,
    received_at: DateTime<Utc>,
    /// Receipt time in the configured timezone, as shown to the model.
    now: DateTime<Tz>,
    stage: Stage,
}

impl Pipeline<'_> {
    fn enter(&mut self, stage: Stage) {
        tracing::debug!(chat_id = self.chat_id, from = self.stage.as_str(), to = stage.as_str(), "stage");
        self.stage = stage;
    }

    fn temperature(&self) -> f32 {
        self.state.config.llm_temperature
    }

    async fn run(
        &mut self,
        payload: Payload,
        first_name: Option<&str>,
    ) -> Result<OutboundReply, AppError> {
        match payload {
            Payload::Command(Command::Start) => Ok(OutboundReply::text(start_reply(first_name))),
            Payload::Command(Command::Help) => Ok(OutboundReply::text(HELP_REPLY)),
            Payload::Text(text) => self.handle_text(&text).await,
            Payload::Voice { bytes, mime_type } => {
                self.enter(Stage::Transcribing);
                let transcript = self
                    .state
                    .transcriber
                    .transcribe(&bytes, &mime_type)
                    .await?;
                if transcript.is_empty() {
                    return Ok(OutboundReply::text(NO_TRANSCRIPT_REPLY));
                }
                tracing::info!(chat_id = self.chat_id, transcript = %transcript, "voice transcribed");

                let mut reply = self.handle_text(&transcript).await?;
                reply.text = format!("I heard: \"{}\"\n\n{}", escape_html(&transcript), reply.text);
                Ok(reply)
            }
            Payload::Image { bytes, mime_type } => self.handle_image(bytes, mime_type).await,
        }
    }

    async fn handle_text(&mut self, text: &str) -> Result<OutboundReply, AppError> {
        self.enter(Stage::ClassifyingIntent);
        let request =
            CompletionRequest::text(prompts::intent_prompt(text, &self.now), self.temperature());
        let raw = self.state.llm.complete(&request).await?;
        let intent = parser::parse_intent(&raw).unwrap_or_else(|e| {
            tracing::warn!(chat_id = self.chat_id, error = %e, "intent unreadable, treating as other");
            Intent::Other
        });

        tracing::info!(chat_id = self.chat_id, intent = intent.as_str(), "intent classified");

        match intent {
            Intent::AddEvent => {
                self.enter(Stage::ExtractingFields);
                let request = CompletionRequest::json(
                    prompts::extraction_prompt(text, &self.now),
                    self.temperature(),
                );
                let raw = self.state.llm.complete(&request).await?;
                let extraction = parser::parse_extraction(&raw)?;
                self.event_reply(&extraction)
            }
            Intent::Greeting => Ok(OutboundReply::text(GREETING_REPLY)),
            Intent::HelpRequest => Ok(OutboundReply::text(HELP_REPLY)),
            Intent::Other => Ok(OutboundReply::text(OTHER_REPLY)),
        }
    }

    /// Images skip classification: a picture sent to the bot is taken to be an event.
    async fn handle_image(
        &mut self,
        bytes: Vec<u8>,
        mime_type: String,
    ) -> Result<OutboundReply, AppError> {
        self.enter(Stage::ExtractingFields);
        let request = CompletionRequest::json(
            prompts::image_extraction_prompt(&self.now),
            self.temperature(),
        )
        .with_image(bytes, mime_type);
        let raw = self.state.llm.complete(&request).await?;

        let extraction = match parser::parse_extraction(&raw) {
            Ok(extraction) => extraction,
            Err(e) => {
                tracing::warn!(chat_id = self.chat_id, error = %e, "no event in image");
                return Ok(OutboundReply::text(IMAGE_NO_EVENT_REPLY));
            }
        };

        if extraction
            .confidence
            .is_some_and(|c| c < IMAGE_CONFIDENCE_THRESHOLD)
        {
            tracing::info!(chat_id = self.chat_id, confidence = ?extraction.confidence, "image extraction below threshold");
            return Ok(OutboundReply::text(IMAGE_NO_EVENT_REPLY));
        }

        match self.event_reply(&extraction) {
            Err(AppError::Extraction(failure)) => {
                tracing::warn!(chat_id = self.chat_id, error = %failure, "image event unresolved");
                Ok(OutboundReply::text(IMAGE_NO_EVENT_REPLY))
            }
            other => other,
        }
    }

    fn event_reply(&mut self, extraction: &RawExtraction) -> Result<OutboundReply, AppError> {
        self.enter(Stage::Normalizing);
        let defaults = self.state.config.event_defaults();
        let event = normalizer::normalize(extraction, self.received_at, &defaults)?;

        self.enter(Stage::LinkBuilding);
        let link = calendar::build_link(&event);

        tracing::info!(
            chat_id = self.chat_id,
            title = %event.title,
            start = %event.start,
            "event resolved"
        );

        Ok(OutboundReply::text(event_summary(&event)).with_link(BUTTON_LABEL, link.into_string()))
    }

    fn recover(&mut self, err: AppError) -> OutboundReply {
        let stage = self.stage.as_str();
        match &err {
            AppError::Quota(_) => {
                tracing::warn!(chat_id = self.chat_id, stage, error = %err, "provider quota exhausted");
                OutboundReply::text(QUOTA_REPLY)
            }
            AppError::MalformedResponse(_) | AppError::Extraction(_) => {
                tracing::warn!(chat_id = self.chat_id, stage, error = %err, "could not resolve event");
                OutboundReply::text(RESTATE_REPLY)
            }
            AppError::Provider { .. }
            | AppError::Messaging(_)
            | AppError::Config(_)
            | AppError::Unauthorized => {
                tracing::error!(chat_id = self.chat_id, stage, error = %err, "message processing failed");
                OutboundReply::text(PROVIDER_ERROR_REPLY)
            }
        }
    }
}

fn start_reply(first_name: Option<&str>) -> String {
    let greeting = match first_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("Hello {}!", escape_html(name)),
        None => "Hello!".to_string(),
    };
    format!(
        "{greeting} I'm your calendar assistant. You can ask me to add events to your calendar. \
         For example: \"Remind me about meeting with John on Friday at 3:00 PM\" \
         or send me an image of an event."
    )
}

/// The reply body shown above the calendar button.
pub fn event_summary(event: &CanonicalEvent) -> String {
    let mut lines = vec![
        "I extracted the following event details:".to_string(),
        String::new(),
        format!("📅 <b>{}</b>", escape_html(&event.title)),
        format!("📆 {}", event.start.format("%A, %-d %B %Y at %H:%M")),
    ];
    if let Some(location) = &event.location {
        lines.push(format!("📍 {}", escape_html(location)));
    }
    if let Some(description) = &event.description {
        lines.push(format!("📝 {}", escape_html(&truncate_chars(description, DESCRIPTION_MAX_CHARS))));
    }
    lines.push(String::new());
    lines.push("You can add it to your calendar with the button below:".to_string());
    lines.join("\n")
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

/// Telegram's HTML parse mode only needs these three escaped.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
