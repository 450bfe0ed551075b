//! WebSocket layer: the relay core.
//!
//! - [`envelope`] — wire format for chat messages.
//! - [`hub`] — single-task registry of live connections and fan-out.
//! - [`connection`] — per-socket inbound and outbound pumps.
//! - [`scope`] — per-connection delivery filter.
//! - [`handler`] — the `/ws` upgrade endpoint.

pub mod connection;
pub mod envelope;
pub mod handler;
pub mod hub;
pub mod scope;

pub use connection::{Connection, ConnectionIdentity, ConnectionSettings, PumpExit};
pub use envelope::{Envelope, EnvelopeError};
pub use hub::{BackpressurePolicy, Hub, HubHandle, Registration};
pub use scope::ScopeFilter;
