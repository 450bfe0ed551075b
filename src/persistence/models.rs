//! Database models for chat messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ChatId, UserId};

/// A message about to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Chat the message was sent in.
    pub chat_id: ChatId,
    /// Author of the message.
    pub user_id: UserId,
    /// Message text.
    pub content: String,
}

/// A stored row from the `messages` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Auto-increment row ID.
    pub id: i64,
    /// Chat the message belongs to.
    pub chat_id: ChatId,
    /// Author of the message.
    pub user_id: UserId,
    /// Message text.
    pub content: String,
    /// Server-side creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Offset-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Maximum number of rows to return.
    pub limit: u32,
    /// Number of rows to skip.
    pub offset: u32,
}

impl Page {
    /// Builds a page from a 1-indexed page number and a page size.
    #[must_use]
    pub const fn numbered(page: u32, per_page: u32) -> Self {
        Self {
            limit: per_page,
            offset: page.saturating_sub(1).saturating_mul(per_page),
        }
    }
}
