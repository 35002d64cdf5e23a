use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::errors::AppError;
use crate::services::ai::retry::{with_retry, RetryPolicy};

/// Speech-to-text. Returns an empty string when nothing intelligible was said.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, AppError>;
}

/// OpenAI-compatible `/audio/transcriptions` endpoint, as served by Mistral.
pub struct MistralTranscriber {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

impl MistralTranscriber {
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("failed to build transcription client: {e}")))?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            client,
        })
    }
}

/// Same one-retry policy as the completion client, applied to transcription.
pub struct RetryingTranscriber<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Transcriber> RetryingTranscriber<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<T: Transcriber> Transcriber for RetryingTranscriber<T> {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, AppError> {
        with_retry(&self.policy, "transcription", move || {
            self.inner.transcribe(audio, mime_type)
        })
        .await
    }
}

fn file_name_for(mime_type: &str) -> &'static str {
    match mime_type {
        "audio/mpeg" | "audio/mp3" => "voice.mp3",
        "audio/wav" | "audio/x-wav" => "voice.wav",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "voice.m4a",
        _ => "voice.ogg",
    }
}

#[async_trait]
impl Transcriber for MistralTranscriber {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, AppError> {
        if audio.is_empty() {
            return Ok(String::new());
        }

        let part = Part::bytes(audio.to_vec())
            .file_name(file_name_for(mime_type))
            .mime_str(mime_type)
            .map_err(|e| AppError::provider(format!("invalid audio mime type {mime_type}: {e}")))?;
        let form = Form::new()
            .part("file", part)
            .text("model", self.model.clone());

        tracing::debug!(bytes = audio.len(), mime_type, "transcription request");

        let resp = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::from_http("failed to call transcription API", e))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::Quota(format!("transcription rate limit ({status})")));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = format!("transcription API error ({status}): {body}");
            return Err(if status.is_server_error() {
                AppError::transient(message)
            } else {
                AppError::provider(message)
            });
        }

        let data: TranscriptionResponse = resp
            .json()
            .await
            .map_err(|e| AppError::from_http("failed to parse transcription response", e))?;

        Ok(data.text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// Fails with `error` for the first `failures` calls.
    struct FlakyTranscriber {
        calls: AtomicUsize,
        failures: usize,
        error: fn() -> AppError,
    }

    #[async_trait]
    impl Transcriber for FlakyTranscriber {
        async fn transcribe(&self, _audio: &[u8], _mime_type: &str) -> Result<String, AppError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err((self.error)())
            } else {
                Ok("lunch tomorrow at noon".to_string())
            }
        }
    }

    fn flaky(failures: usize, error: fn() -> AppError) -> RetryingTranscriber<FlakyTranscriber> {
        RetryingTranscriber::new(
            FlakyTranscriber {
                calls: AtomicUsize::new(0),
                failures,
                error,
            },
            RetryPolicy::once(Duration::ZERO),
        )
    }

    #[tokio::test]
    async fn test_retrying_transcriber_recovers_from_one_failure() {
        let transcriber = flaky(1, || AppError::transient("502 Bad Gateway"));
        let text = transcriber.transcribe(b"ogg", "audio/ogg").await.unwrap();
        assert_eq!(text, "lunch tomorrow at noon");
        assert_eq!(transcriber.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retrying_transcriber_gives_up_after_one_retry() {
        let transcriber = flaky(5, || AppError::Quota("429".to_string()));
        let result = transcriber.transcribe(b"ogg", "audio/ogg").await;
        assert!(matches!(result, Err(AppError::Quota(_))));
        assert_eq!(transcriber.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retrying_transcriber_skips_client_errors() {
        let transcriber = flaky(5, || AppError::provider("400 Bad Request"));
        assert!(transcriber.transcribe(b"ogg", "audio/ogg").await.is_err());
        assert_eq!(transcriber.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_file_name_for_mime() {
        assert_eq!(file_name_for("audio/ogg"), "voice.ogg");
        assert_eq!(file_name_for("audio/mpeg"), "voice.mp3");
        assert_eq!(file_name_for("application/octet-stream"), "voice.ogg");
    }

    #[test]
    fn test_response_without_text() {
        let data: TranscriptionResponse = serde_json::from_str(r#"{"model":"voxtral"}"#).unwrap();
        assert_eq!(data.text, "");
    }
}
