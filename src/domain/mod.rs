//! Domain layer: typed identifiers shared by the hub, the connection pumps,
//! and the persistence collaborators.
//!
//! User and chat identifiers come from storage and are plain integers on
//! the wire; connection identifiers are allocated per WebSocket upgrade.

pub mod connection_id;
pub mod ids;

pub use connection_id::ConnectionId;
pub use ids::{ChatId, UserId};
