//! Persistence layer: durable chat messages and user lookup.
//!
//! The relay core only needs [`MessageStore`]. Delivery never waits on a
//! successful write: a failed insert is logged by the caller and the
//! message is still fanned out.
//!
//! Two backends are provided: [`PostgresStore`] over `sqlx::PgPool`, and
//! [`MemoryStore`] for tests and for running with persistence disabled.

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;

pub use memory::MemoryStore;
pub use models::{NewMessage, Page, StoredMessage};
pub use postgres::PostgresStore;

use crate::domain::ChatId;
use crate::error::RelayError;

/// Durable message storage consumed by the inbound pump and the history API.
#[async_trait]
pub trait MessageStore: Send + Sync + fmt::Debug {
    /// Writes one message and returns it with its storage-assigned id and
    /// timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] if the write fails.
    async fn persist_message(&self, message: NewMessage) -> Result<StoredMessage, RelayError>;

    /// Returns one page of a chat's messages, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Persistence`] if the read fails.
    async fn messages_for_chat(
        &self,
        chat_id: ChatId,
        page: Page,
    ) -> Result<Vec<StoredMessage>, RelayError>;
}
