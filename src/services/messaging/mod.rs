pub mod telegram;

use async_trait::async_trait;
use teloxide::types::FileId;

use crate::errors::AppError;
use crate::models::OutboundReply;

#[async_trait]
pub trait MessagingProvider: Send + Sync {
    async fn send_reply(&self, chat_id: i64, reply: &OutboundReply) -> Result<(), AppError>;

    async fn download_file(&self, file_id: &FileId) -> Result<Vec<u8>, AppError>;
}
