use std::sync::Arc;

use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;

use crate::services::dispatch;
use crate::state::AppState;

/// Long-polling mode for running without a public URL. teloxide drops any
/// registered webhook, tracks the update offset, and runs chats concurrently
/// while keeping each chat's messages in order.
pub async fn run(state: Arc<AppState>, bot: Bot) {
    tracing::info!("polling Telegram for updates");

    let handler = Update::filter_message().endpoint(move |msg: Message| {
        let state = Arc::clone(&state);
        async move {
            dispatch::handle_message(&state, msg).await;
            respond(())
        }
    });

    Dispatcher::builder(bot, handler)
        .default_handler(|upd| async move {
            tracing::debug!(update_id = ?upd.id, "ignoring non-message update");
        })
        .build()
        .dispatch()
        .await;
}
