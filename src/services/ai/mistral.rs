use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::StatusCode;
use serde_json::json;

use super::{CompletionRequest, LlmProvider};
use crate::errors::AppError;

pub struct MistralProvider {
    api_key: String,
    base_url: String,
    model: String,
    vision_model: String,
    client: reqwest::Client,
}

impl MistralProvider {
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        vision_model: String,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("failed to build Mistral client: {e}")))?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            vision_model,
            client,
        })
    }
}

fn request_body(request: &CompletionRequest, model: &str, vision_model: &str) -> serde_json::Value {
    let (model, content) = match &request.image {
        Some(image) => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&image.bytes);
            (
                vision_model,
                json!([
                    { "type": "text", "text": request.prompt },
                    {
                        "type": "image_url",
                        "image_url": format!("data:{};base64,{encoded}", image.mime_type),
                    },
                ]),
            )
        }
        None => (model, json!(request.prompt)),
    };

    let mut body = json!({
        "model": model,
        "messages": [{ "role": "user", "content": content }],
        "temperature": request.temperature,
    });

    if request.json_output {
        body["response_format"] = json!({ "type": "json_object" });
    }

    body
}

/// Classifies a non-success status: 429 is quota, 5xx may clear up on
/// its own, everything else is the request's fault.
fn status_error(status: StatusCode, body: &str) -> AppError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        AppError::Quota(format!("Mistral API rate limit ({status}): {body}"))
    } else if status.is_server_error() {
        AppError::transient(format!("Mistral API error ({status}): {body}"))
    } else {
        AppError::provider(format!("Mistral API error ({status}): {body}"))
    }
}

fn extract_content(data: &serde_json::Value) -> Result<String, AppError> {
    let choice = &data["choices"][0];
    if choice["finish_reason"].as_str() == Some("content_filter") {
        return Err(AppError::provider("Mistral rejected the content"));
    }

    choice["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::provider("missing content in Mistral response"))
}

#[async_trait]
impl LlmProvider for MistralProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AppError> {
        let body = request_body(request, &self.model, &self.vision_model);

        tracing::debug!(
            model = body["model"].as_str().unwrap_or_default(),
            with_image = request.image.is_some(),
            "Mistral chat request"
        );

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::from_http("failed to call Mistral API", e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AppError::from_http("failed to parse Mistral response", e))?;

        extract_content(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_body() {
        let request = CompletionRequest::text("classify this".to_string(), 0.0);
        let body = request_body(&request, "mistral-large-latest", "pixtral-large-latest");
        assert_eq!(body["model"], "mistral-large-latest");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "classify this");
        assert_eq!(body["temperature"], 0.0);
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_image_body_uses_vision_model_and_data_url() {
        let request = CompletionRequest::json("extract".to_string(), 0.0)
            .with_image(vec![1, 2, 3], "image/jpeg");
        let body = request_body(&request, "mistral-large-latest", "pixtral-large-latest");
        assert_eq!(body["model"], "pixtral-large-latest");
        assert_eq!(body["response_format"]["type"], "json_object");

        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "extract");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"], "data:image/jpeg;base64,AQID");
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, ""),
            AppError::Quota(_)
        ));
        assert!(status_error(StatusCode::BAD_GATEWAY, "").is_retryable());
        let bad_request = status_error(StatusCode::BAD_REQUEST, "invalid model");
        assert!(!bad_request.is_retryable());
        assert!(bad_request.to_string().contains("invalid model"));
    }

    #[test]
    fn test_extract_content() {
        let ok = json!({"choices":[{"message":{"content":"greeting"},"finish_reason":"stop"}]});
        assert_eq!(extract_content(&ok).unwrap(), "greeting");

        let filtered = json!({"choices":[{"message":{"content":""},"finish_reason":"content_filter"}]});
        assert!(extract_content(&filtered).is_err());

        let empty = json!({"choices":[]});
        assert!(extract_content(&empty).is_err());
    }
}
