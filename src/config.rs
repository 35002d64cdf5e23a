use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;

use crate::errors::AppError;
use crate::services::normalizer::EventDefaults;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub telegram_token: String,
    pub telegram_api_url: String,
    /// Public base URL; when set the bot registers a webhook instead of polling.
    pub app_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub mistral_api_key: String,
    pub mistral_api_url: String,
    pub mistral_model: String,
    pub mistral_vision_model: String,
    pub transcription_model: String,
    pub llm_temperature: f32,
    pub llm_timeout: Duration,
    pub transcription_timeout: Duration,
    pub retry_backoff: Duration,
    pub default_timezone: Tz,
    pub default_event_duration_minutes: i64,
    pub default_event_time: NaiveTime,
    pub max_audio_duration_seconds: u32,
    pub max_image_size_mb: u64,
    pub dev_endpoints: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            port: parse_var("PORT", 8443)?,
            telegram_token: env::var("TELEGRAM_TOKEN").unwrap_or_default(),
            telegram_api_url: env::var("TELEGRAM_API_URL")
                .unwrap_or_else(|_| "https://api.telegram.org".to_string()),
            app_url: non_empty_var("APP_URL").map(|u| u.trim_end_matches('/').to_string()),
            webhook_secret: non_empty_var("TELEGRAM_WEBHOOK_SECRET"),
            mistral_api_key: env::var("MISTRAL_API_KEY").unwrap_or_default(),
            mistral_api_url: env::var("MISTRAL_API_URL")
                .unwrap_or_else(|_| "https://api.mistral.ai/v1".to_string()),
            mistral_model: env::var("MISTRAL_MODEL")
                .unwrap_or_else(|_| "mistral-large-latest".to_string()),
            mistral_vision_model: env::var("MISTRAL_VISION_MODEL")
                .unwrap_or_else(|_| "pixtral-large-latest".to_string()),
            transcription_model: env::var("TRANSCRIPTION_MODEL")
                .unwrap_or_else(|_| "voxtral-mini-latest".to_string()),
            llm_temperature: parse_var("LLM_TEMPERATURE", 0.0)?,
            llm_timeout: Duration::from_secs(parse_var("LLM_TIMEOUT_SECS", 30)?),
            transcription_timeout: Duration::from_secs(parse_var(
                "TRANSCRIPTION_TIMEOUT_SECS",
                60,
            )?),
            retry_backoff: Duration::from_millis(parse_var("LLM_RETRY_BACKOFF_MS", 500)?),
            default_timezone: parse_timezone(
                &env::var("DEFAULT_TIMEZONE").unwrap_or_else(|_| "America/Santiago".to_string()),
            )?,
            default_event_duration_minutes: parse_var("DEFAULT_EVENT_DURATION_MINUTES", 60)?,
            default_event_time: parse_clock(
                &env::var("DEFAULT_EVENT_TIME").unwrap_or_else(|_| "09:00".to_string()),
            )?,
            max_audio_duration_seconds: parse_var("MAX_AUDIO_DURATION_SECONDS", 60)?,
            max_image_size_mb: parse_var("MAX_IMAGE_SIZE_MB", 5)?,
            dev_endpoints: parse_var("DEV_ENDPOINTS", false)?,
        })
    }

    pub fn event_defaults(&self) -> EventDefaults {
        EventDefaults {
            timezone: self.default_timezone,
            duration: chrono::Duration::minutes(self.default_event_duration_minutes),
            start_time: self.default_event_time,
            title: EventDefaults::DEFAULT_TITLE.to_string(),
        }
    }

    pub fn max_image_bytes(&self) -> u64 {
        self.max_image_size_mb * 1024 * 1024
    }

    pub fn webhook_url(&self) -> Option<String> {
        self.app_url
            .as_ref()
            .map(|base| format!("{base}/webhook/telegram"))
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match non_empty_var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw}"))),
        None => Ok(default),
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz, AppError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| AppError::Config(format!("unknown timezone: {name}")))
}

fn parse_clock(s: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| AppError::Config(format!("DEFAULT_EVENT_TIME must be HH:MM, got {s}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone("America/Santiago").unwrap(), Tz::America__Santiago);
        assert_eq!(parse_timezone(" UTC ").unwrap(), Tz::UTC);
        assert!(matches!(parse_timezone("Mars/Olympus"), Err(AppError::Config(_))));
    }

    #[test]
    fn test_parse_clock() {
        assert_eq!(
            parse_clock("09:00").unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap()
        );
        assert!(parse_clock("9am").is_err());
    }

    #[test]
    fn test_parse_var_default_and_invalid() {
        assert_eq!(parse_var("CALBOT_TEST_UNSET_VAR", 42u16).unwrap(), 42);

        env::set_var("CALBOT_TEST_BAD_PORT", "not-a-port");
        let err = parse_var::<u16>("CALBOT_TEST_BAD_PORT", 3000).unwrap_err();
        assert!(err.to_string().contains("CALBOT_TEST_BAD_PORT"));
        env::remove_var("CALBOT_TEST_BAD_PORT");
    }
}
