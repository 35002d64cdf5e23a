use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::ai::LlmProvider;
use crate::services::messaging::MessagingProvider;
use crate::services::transcription::Transcriber;

/// Read-only after startup; every in-flight message shares it through an `Arc`.
pub struct AppState {
    pub config: AppConfig,
    pub llm: Box<dyn LlmProvider>,
    pub transcriber: Box<dyn Transcriber>,
    pub messaging: Arc<dyn MessagingProvider>,
}
