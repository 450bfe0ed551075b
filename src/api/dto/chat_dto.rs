//! Chat history DTOs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::persistence::StoredMessage;

/// One stored chat message.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageDto {
    /// Message identifier.
    pub id: i64,
    /// Chat the message belongs to.
    pub chat_id: i64,
    /// Author.
    pub user_id: i64,
    /// Message text.
    pub content: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<StoredMessage> for MessageDto {
    fn from(m: StoredMessage) -> Self {
        Self {
            id: m.id,
            chat_id: m.chat_id.get(),
            user_id: m.user_id.get(),
            content: m.content,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Response body for `GET /chats/{chat_id}/messages`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChatMessagesResponse {
    /// Messages, oldest first.
    pub messages: Vec<MessageDto>,
    /// Number of messages in this page.
    pub count: usize,
    /// Page number served.
    pub page: u32,
    /// Page size used.
    pub per_page: u32,
}
