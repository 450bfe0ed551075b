//! Connection hub: registry of live connections and fan-out dispatcher.
//!
//! The registry is owned by a single task running [`Hub::run`]. Every other
//! part of the system talks to it through a cloneable [`HubHandle`], which
//! only enqueues commands. Registration, deregistration, and fan-out are
//! therefore applied one at a time, in arrival order, without any lock.
//!
//! Fan-out never waits on a recipient. Each enqueue uses
//! [`mpsc::Sender::try_send`]; what happens when a recipient's queue is full
//! is decided by the configured [`BackpressurePolicy`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use axum::body::Bytes;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::connection::ConnectionIdentity;
use crate::domain::ConnectionId;
use crate::error::RelayError;

/// What the hub does when a recipient's outbound queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackpressurePolicy {
    /// Remove the recipient from the registry and close its queue. Its
    /// outbound pump drains what is already queued, sends a close frame,
    /// and shuts the socket.
    #[default]
    Disconnect,
    /// Discard the new payload for that recipient only; it stays registered.
    DropNewest,
}

impl FromStr for BackpressurePolicy {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disconnect" => Ok(Self::Disconnect),
            "drop_newest" | "drop-newest" => Ok(Self::DropNewest),
            other => Err(RelayError::InvalidRequest(format!(
                "unknown backpressure policy: {other}"
            ))),
        }
    }
}

impl fmt::Display for BackpressurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnect => f.write_str("disconnect"),
            Self::DropNewest => f.write_str("drop_newest"),
        }
    }
}

/// A connection as the hub sees it: identity plus the producer side of its
/// outbound queue.
///
/// The hub holds the only [`mpsc::Sender`] for the queue, so dropping the
/// registration is what closes the queue.
#[derive(Debug)]
pub struct Registration {
    identity: ConnectionIdentity,
    outbound: mpsc::Sender<Bytes>,
}

impl Registration {
    /// Pairs a connection identity with its outbound queue.
    #[must_use]
    pub const fn new(identity: ConnectionIdentity, outbound: mpsc::Sender<Bytes>) -> Self {
        Self { identity, outbound }
    }

    /// Returns the registered identity.
    #[must_use]
    pub const fn identity(&self) -> &ConnectionIdentity {
        &self.identity
    }
}

#[derive(Debug)]
enum HubCommand {
    Register(Registration),
    Unregister(ConnectionId),
    Broadcast(Bytes),
    ConnectionCount(oneshot::Sender<usize>),
    Shutdown,
}

/// Capability for submitting requests to the hub loop.
///
/// Cloning a handle is cheap. A handle grants no access to the registry
/// itself; the loop keeps running while at least one handle is alive.
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    /// Asks the hub to add a connection to the registry.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::HubClosed`] if the hub loop has stopped.
    pub fn register(&self, registration: Registration) -> Result<(), RelayError> {
        self.submit(HubCommand::Register(registration))
    }

    /// Asks the hub to remove a connection and close its outbound queue.
    ///
    /// Removing an id that is not registered is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::HubClosed`] if the hub loop has stopped.
    pub fn unregister(&self, id: ConnectionId) -> Result<(), RelayError> {
        self.submit(HubCommand::Unregister(id))
    }

    /// Asks the hub to enqueue `payload` on every registered connection.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::HubClosed`] if the hub loop has stopped.
    pub fn broadcast(&self, payload: Bytes) -> Result<(), RelayError> {
        self.submit(HubCommand::Broadcast(payload))
    }

    /// Returns the number of registered connections once every command
    /// submitted before this call has been applied.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::HubClosed`] if the hub loop has stopped.
    pub async fn connection_count(&self) -> Result<usize, RelayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(HubCommand::ConnectionCount(reply_tx))?;
        reply_rx.await.map_err(|_| RelayError::HubClosed)
    }

    /// Asks the hub loop to stop once every command submitted before this
    /// call has been applied.
    ///
    /// Stopping drops the registry, which closes every outbound queue; each
    /// outbound pump then sends a close frame and the connection winds down
    /// even though it still holds a handle.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::HubClosed`] if the hub loop has already stopped.
    pub fn shutdown(&self) -> Result<(), RelayError> {
        self.submit(HubCommand::Shutdown)
    }

    fn submit(&self, command: HubCommand) -> Result<(), RelayError> {
        self.commands
            .send(command)
            .map_err(|_| RelayError::HubClosed)
    }
}

/// The hub control loop and the registry it exclusively owns.
#[derive(Debug)]
pub struct Hub {
    registry: HashMap<ConnectionId, Registration>,
    commands: mpsc::UnboundedReceiver<HubCommand>,
    policy: BackpressurePolicy,
}

impl Hub {
    /// Creates a hub and the first handle to it. Nothing runs until
    /// [`Hub::run`] is awaited.
    #[must_use]
    pub fn new(policy: BackpressurePolicy) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Self {
            registry: HashMap::new(),
            commands: rx,
            policy,
        };
        (hub, HubHandle { commands: tx })
    }

    /// Creates a hub and spawns its loop on the current runtime.
    #[must_use]
    pub fn spawn(policy: BackpressurePolicy) -> (HubHandle, JoinHandle<()>) {
        let (hub, handle) = Self::new(policy);
        (handle, tokio::spawn(hub.run()))
    }

    /// Processes commands until [`HubHandle::shutdown`] is called or every
    /// [`HubHandle`] has been dropped.
    ///
    /// On exit the registry is dropped, which closes every outbound queue.
    pub async fn run(mut self) {
        tracing::info!(policy = %self.policy, "hub started");
        while let Some(command) = self.commands.recv().await {
            if matches!(command, HubCommand::Shutdown) {
                break;
            }
            self.apply(command);
        }
        tracing::info!(
            remaining = self.registry.len(),
            "hub stopped; closing outbound queues"
        );
    }

    fn apply(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register(registration) => self.register(registration),
            HubCommand::Unregister(id) => self.unregister(id),
            HubCommand::Broadcast(payload) => self.broadcast(&payload),
            HubCommand::ConnectionCount(reply) => {
                let _ = reply.send(self.registry.len());
            }
            HubCommand::Shutdown => {}
        }
    }

    fn register(&mut self, registration: Registration) {
        let identity = *registration.identity();
        if self.registry.insert(identity.id(), registration).is_some() {
            tracing::warn!(
                connection_id = %identity.id(),
                "connection registered twice; previous entry replaced"
            );
        }
        tracing::info!(
            connection_id = %identity.id(),
            user_id = %identity.user_id(),
            chat_id = %identity.chat_id(),
            connections = self.registry.len(),
            "connection registered"
        );
    }

    fn unregister(&mut self, id: ConnectionId) {
        match self.registry.remove(&id) {
            Some(_) => tracing::info!(
                connection_id = %id,
                connections = self.registry.len(),
                "connection unregistered"
            ),
            None => tracing::debug!(connection_id = %id, "unregister for absent connection"),
        }
    }

    fn broadcast(&mut self, payload: &Bytes) {
        let mut evicted = Vec::new();
        for (id, registration) in &self.registry {
            match registration.outbound.try_send(payload.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => match self.policy {
                    BackpressurePolicy::Disconnect => {
                        tracing::warn!(connection_id = %id, "outbound queue full; disconnecting slow consumer");
                        evicted.push(*id);
                    }
                    BackpressurePolicy::DropNewest => {
                        tracing::warn!(connection_id = %id, "outbound queue full; message dropped");
                    }
                },
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(connection_id = %id, "outbound pump already stopped");
                }
            }
        }
        for id in evicted {
            self.registry.remove(&id);
        }
    }
}
