use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::NaiveDateTime;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("AI provider error: {message}")]
    Provider { message: String, transient: bool },

    #[error("rate limited: {0}")]
    Quota(String),

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionFailure),

    #[error("messaging error: {0}")]
    Messaging(String),

    /// Webhook call without the shared secret.
    #[error("invalid secret token")]
    Unauthorized,
}

impl AppError {
    /// A provider failure that should not be retried (4xx, bad payload, rejection).
    pub fn provider(message: impl Into<String>) -> Self {
        AppError::Provider {
            message: message.into(),
            transient: false,
        }
    }

    /// A provider failure worth one more attempt (5xx, timeout, connection reset).
    pub fn transient(message: impl Into<String>) -> Self {
        AppError::Provider {
            message: message.into(),
            transient: true,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Provider { transient: true, .. } | AppError::Quota(_)
        )
    }

    /// Maps a reqwest failure to a provider error, treating timeouts and
    /// connection failures as transient.
    pub fn from_http(context: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            AppError::transient(format!("{context}: {err}"))
        } else {
            AppError::provider(format!("{context}: {err}"))
        }
    }
}

/// The model answered, but the event it described cannot be pinned to an instant.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractionFailure {
    #[error("no date was given")]
    MissingDate,

    #[error("could not resolve date {0:?}")]
    DateUnresolved(String),

    #[error("could not resolve time {0:?}")]
    TimeUnresolved(String),

    #[error("local time {0} does not exist in the configured timezone")]
    NonexistentLocalTime(NaiveDateTime),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Provider { .. } => StatusCode::BAD_GATEWAY,
            AppError::Quota(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
            AppError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Messaging(_) => StatusCode::BAD_GATEWAY,
            AppError::Unauthorized => StatusCode::FORBIDDEN,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(AppError::transient("502").is_retryable());
        assert!(AppError::Quota("slow down".into()).is_retryable());
        assert!(!AppError::provider("400").is_retryable());
        assert!(!AppError::MalformedResponse("".into()).is_retryable());
        assert!(!AppError::Extraction(ExtractionFailure::MissingDate).is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Unauthorized.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Quota("slow down".into()).into_response().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::transient("503").into_response().status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_extraction_failure_converts() {
        let err: AppError = ExtractionFailure::DateUnresolved("sometime soon".into()).into();
        assert!(matches!(
            err,
            AppError::Extraction(ExtractionFailure::DateUnresolved(_))
        ));
        assert_eq!(
            err.to_string(),
            "extraction failed: could not resolve date \"sometime soon\""
        );
    }
}
