//! In-process message store.
//!
//! Used by the test suite and when `PERSISTENCE_ENABLED=false`. Contents
//! are lost on restart.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::MessageStore;
use super::models::{NewMessage, Page, StoredMessage};
use crate::domain::ChatId;
use crate::error::RelayError;

/// Message store backed by a `Vec` behind a [`tokio::sync::RwLock`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    messages: RwLock<Vec<StoredMessage>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of stored messages.
    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    /// Returns `true` if nothing has been stored.
    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn persist_message(&self, message: NewMessage) -> Result<StoredMessage, RelayError> {
        let mut messages = self.messages.write().await;
        let id = i64::try_from(messages.len())
            .map_err(|e| RelayError::Persistence(e.to_string()))?
            + 1;
        let now = Utc::now();
        let stored = StoredMessage {
            id,
            chat_id: message.chat_id,
            user_id: message.user_id,
            content: message.content,
            created_at: now,
            updated_at: now,
        };
        messages.push(stored.clone());
        Ok(stored)
    }

    async fn messages_for_chat(
        &self,
        chat_id: ChatId,
        page: Page,
    ) -> Result<Vec<StoredMessage>, RelayError> {
        let messages = self.messages.read().await;
        Ok(messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }
}
