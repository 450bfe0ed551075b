//! PostgreSQL implementation of the persistence layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::MessageStore;
use super::models::{NewMessage, Page, StoredMessage};
use crate::auth::{IdentityResolver, Principal};
use crate::domain::{ChatId, UserId};
use crate::error::RelayError;

type MessageRow = (i64, i64, i64, String, DateTime<Utc>, DateTime<Utc>);

/// PostgreSQL-backed store using `sqlx::PgPool`.
///
/// Serves both collaborators the relay consumes: message persistence and
/// username to user-id resolution.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new store over the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations in `migrations/`.
    ///
    /// # Errors
    ///
    /// Returns a [`RelayError::Persistence`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), RelayError> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .map_err(|e| RelayError::Persistence(e.to_string()))
    }
}

fn into_stored((id, chat_id, user_id, content, created_at, updated_at): MessageRow) -> StoredMessage {
    StoredMessage {
        id,
        chat_id: ChatId::new(chat_id),
        user_id: UserId::new(user_id),
        content,
        created_at,
        updated_at,
    }
}

#[async_trait]
impl MessageStore for PostgresStore {
    async fn persist_message(&self, message: NewMessage) -> Result<StoredMessage, RelayError> {
        let row = sqlx::query_as::<_, MessageRow>(
            "INSERT INTO messages (chat_id, user_id, content) VALUES ($1, $2, $3) \
             RETURNING id, chat_id, user_id, content, created_at, updated_at",
        )
        .bind(message.chat_id.get())
        .bind(message.user_id.get())
        .bind(&message.content)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RelayError::Persistence(e.to_string()))?;

        Ok(into_stored(row))
    }

    async fn messages_for_chat(
        &self,
        chat_id: ChatId,
        page: Page,
    ) -> Result<Vec<StoredMessage>, RelayError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, chat_id, user_id, content, created_at, updated_at FROM messages \
             WHERE chat_id = $1 ORDER BY created_at ASC, id ASC LIMIT $2 OFFSET $3",
        )
        .bind(chat_id.get())
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RelayError::Persistence(e.to_string()))?;

        Ok(rows.into_iter().map(into_stored).collect())
    }
}

#[async_trait]
impl IdentityResolver for PostgresStore {
    async fn resolve(&self, principal: &Principal) -> Result<UserId, RelayError> {
        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = $1")
            .bind(&principal.username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RelayError::Persistence(e.to_string()))?;

        id.map(UserId::new)
            .ok_or_else(|| RelayError::UserNotFound(principal.username.clone()))
    }
}
