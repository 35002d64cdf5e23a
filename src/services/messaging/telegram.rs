use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{
    AllowedUpdate, FileId, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode,
};

use super::MessagingProvider;
use crate::errors::AppError;
use crate::models::OutboundReply;

/// Bot API transport. Wraps a teloxide [`Bot`]; clones share one HTTP client.
#[derive(Clone)]
pub struct TelegramProvider {
    bot: Bot,
}

impl TelegramProvider {
    pub fn new(api_url: &str, token: String) -> Result<Self, AppError> {
        let url = reqwest::Url::parse(api_url)
            .map_err(|e| AppError::Config(format!("invalid TELEGRAM_API_URL {api_url}: {e}")))?;

        Ok(Self {
            bot: Bot::new(token).set_api_url(url),
        })
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    pub async fn set_webhook(&self, url: &str, secret: Option<&str>) -> Result<(), AppError> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| AppError::Config(format!("invalid webhook url {url}: {e}")))?;

        let mut request = self
            .bot
            .set_webhook(url)
            .allowed_updates(vec![AllowedUpdate::Message]);
        if let Some(secret) = secret {
            request = request.secret_token(secret.to_string());
        }

        request
            .await
            .map_err(|e| AppError::Messaging(format!("setWebhook failed: {e}")))?;
        Ok(())
    }
}

/// The "Add to my Calendar" button, if the reply carries a link.
pub fn reply_markup(reply: &OutboundReply) -> Result<Option<InlineKeyboardMarkup>, AppError> {
    let Some(link) = &reply.link else {
        return Ok(None);
    };
    let url = reqwest::Url::parse(&link.url)
        .map_err(|e| AppError::Messaging(format!("reply link is not a valid url: {e}")))?;

    Ok(Some(InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::url(link.label.clone(), url),
    ]])))
}

#[async_trait]
impl MessagingProvider for TelegramProvider {
    async fn send_reply(&self, chat_id: i64, reply: &OutboundReply) -> Result<(), AppError> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), &reply.text)
            .parse_mode(ParseMode::Html);
        if let Some(markup) = reply_markup(reply)? {
            request = request.reply_markup(markup);
        }

        request
            .await
            .map_err(|e| AppError::Messaging(format!("sendMessage failed: {e}")))?;
        Ok(())
    }

    async fn download_file(&self, file_id: &FileId) -> Result<Vec<u8>, AppError> {
        let file = self
            .bot
            .get_file(file_id.clone())
            .await
            .map_err(|e| AppError::Messaging(format!("getFile failed: {e}")))?;

        let mut bytes = Vec::new();
        self.bot
            .download_file(&file.path, &mut bytes)
            .await
            .map_err(|e| AppError::Messaging(format!("file download failed: {e}")))?;

        Ok(bytes)
    }
}
