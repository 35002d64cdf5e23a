use std::future::IntoFuture;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use calbot::config::AppConfig;
use calbot::handlers;
use calbot::services::ai::mistral::MistralProvider;
use calbot::services::ai::retry::{RetryPolicy, RetryingLlm};
use calbot::services::messaging::telegram::TelegramProvider;
use calbot::services::polling;
use calbot::services::transcription::{MistralTranscriber, RetryingTranscriber};
use calbot::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env()?;
    anyhow::ensure!(!config.telegram_token.is_empty(), "TELEGRAM_TOKEN must be set");
    anyhow::ensure!(!config.mistral_api_key.is_empty(), "MISTRAL_API_KEY must be set");

    let mistral = MistralProvider::new(
        config.mistral_api_key.clone(),
        config.mistral_api_url.clone(),
        config.mistral_model.clone(),
        config.mistral_vision_model.clone(),
        config.llm_timeout,
    )?;
    let llm = RetryingLlm::new(mistral, RetryPolicy::once(config.retry_backoff));
    let transcriber = RetryingTranscriber::new(
        MistralTranscriber::new(
            config.mistral_api_key.clone(),
            config.mistral_api_url.clone(),
            config.transcription_model.clone(),
            config.transcription_timeout,
        )?,
        RetryPolicy::once(config.retry_backoff),
    );
    let telegram = Arc::new(TelegramProvider::new(
        &config.telegram_api_url,
        config.telegram_token.clone(),
    )?);

    tracing::info!(
        model = %config.mistral_model,
        vision_model = %config.mistral_vision_model,
        timezone = %config.default_timezone,
        "using Mistral LLM provider"
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        llm: Box::new(llm),
        transcriber: Box::new(transcriber),
        messaging: telegram.clone(),
    });

    let mut app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/webhook/telegram", post(handlers::webhook::telegram_webhook));
    if config.dev_endpoints {
        tracing::warn!("dev endpoints enabled");
        app = app.route("/api/dev/message", post(handlers::dev::send_message));
    }
    let app = app.layer(TraceLayer::new_for_http()).with_state(Arc::clone(&state));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("starting server on {addr}");

    match config.webhook_url() {
        Some(url) => {
            telegram
                .set_webhook(&url, config.webhook_secret.as_deref())
                .await?;
            tracing::info!(%url, "webhook registered");
            axum::serve(listener, app).await?;
        }
        None => {
            tracing::info!("APP_URL not set, falling back to long polling");
            tokio::select! {
                res = axum::serve(listener, app).into_future() => res?,
                _ = polling::run(state, telegram.bot()) => {}
                _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
            }
        }
    }

    Ok(())
}
