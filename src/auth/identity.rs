//! Principal to user-id resolution.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::Principal;
use crate::domain::UserId;
use crate::error::RelayError;

/// Maps an authenticated caller to a stable user identifier.
#[async_trait]
pub trait IdentityResolver: Send + Sync + fmt::Debug {
    /// Resolves `principal` to its stored user id.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::UserNotFound`] if no such user exists, or
    /// [`RelayError::Persistence`] if the lookup itself fails.
    async fn resolve(&self, principal: &Principal) -> Result<UserId, RelayError>;
}

/// In-memory user directory.
///
/// In strict mode only usernames added with [`MemoryDirectory::insert`]
/// resolve. With auto-enrolment every verified principal is assigned the
/// next free id on first sight, which is how the relay runs when
/// persistence is disabled.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    users: RwLock<HashMap<String, UserId>>,
    next_id: AtomicI64,
    auto_enroll: bool,
}

impl MemoryDirectory {
    /// Creates a strict, empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory that enrols unknown principals on first sight.
    #[must_use]
    pub fn auto_enrolling() -> Self {
        Self {
            auto_enroll: true,
            ..Self::default()
        }
    }

    /// Adds `username`, returning its id. Existing users keep their id.
    pub async fn insert(&self, username: &str) -> UserId {
        let mut users = self.users.write().await;
        *users
            .entry(username.to_string())
            .or_insert_with(|| UserId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1))
    }
}

#[async_trait]
impl IdentityResolver for MemoryDirectory {
    async fn resolve(&self, principal: &Principal) -> Result<UserId, RelayError> {
        if let Some(id) = self.users.read().await.get(&principal.username) {
            return Ok(*id);
        }
        if self.auto_enroll {
            return Ok(self.insert(&principal.username).await);
        }
        Err(RelayError::UserNotFound(principal.username.clone()))
    }
}
