pub mod mistral;
pub mod parser;
pub mod prompts;
pub mod retry;

use async_trait::async_trait;

use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub image: Option<ImagePayload>,
    pub temperature: f32,
    /// Ask the provider to constrain output to a single JSON object.
    pub json_output: bool,
}

impl CompletionRequest {
    pub fn text(prompt: String, temperature: f32) -> Self {
        Self {
            prompt,
            image: None,
            temperature,
            json_output: false,
        }
    }

    pub fn json(prompt: String, temperature: f32) -> Self {
        Self {
            json_output: true,
            ..Self::text(prompt, temperature)
        }
    }

    pub fn with_image(mut self, bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        self.image = Some(ImagePayload {
            bytes,
            mime_type: mime_type.into(),
        });
        self
    }
}

/// Raw completion text in, raw completion text out. No business logic.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AppError>;
}
