//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::{IdentityResolver, TokenVerifier};
use crate::persistence::MessageStore;
use crate::ws::{ConnectionSettings, HubHandle};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Capability for submitting requests to the hub loop.
    pub hub: HubHandle,
    /// Message persistence collaborator.
    pub store: Arc<dyn MessageStore>,
    /// Principal to user-id resolution collaborator.
    pub identities: Arc<dyn IdentityResolver>,
    /// Bearer token verification.
    pub tokens: TokenVerifier,
    /// Tunables handed to every new connection.
    pub settings: ConnectionSettings,
}

impl AppState {
    /// Bundles the relay's collaborators.
    #[must_use]
    pub fn new(
        hub: HubHandle,
        store: Arc<dyn MessageStore>,
        identities: Arc<dyn IdentityResolver>,
        tokens: TokenVerifier,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            hub,
            store,
            identities,
            tokens,
            settings,
        }
    }
}
