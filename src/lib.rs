//! # chat-relay
//!
//! Real-time chat relay: clients open a WebSocket bound to one chat and
//! every message they send is fanned out to every other connection in the
//! same chat.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── Auth middleware (auth/)
//!     ├── WS upgrade + pumps (ws/)
//!     │
//!     ├── Hub actor (ws/hub)  ── single owner of the connection registry
//!     │
//!     └── MessageStore / IdentityResolver (persistence/, auth/)
//! ```
//!
//! Each connection runs an inbound pump (socket to hub) and an outbound
//! pump (bounded queue to socket). The hub never writes to sockets; it
//! only enqueues into per-connection queues.

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod ws;
