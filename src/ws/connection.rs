//! One live WebSocket connection and its two pumps.
//!
//! A [`Connection`] is registered with the hub and then driven by two tasks:
//!
//! - the **inbound pump** reads frames, persists messages, re-tags them
//!   with this connection's chat, and submits them to the hub;
//! - the **outbound pump** drains the connection's private queue, filters
//!   by scope, coalesces writes, and sends keepalive pings.
//!
//! Teardown is asymmetric. Only the inbound pump unregisters, through a
//! drop guard, so every exit path (read error, close frame, liveness
//! timeout, oversize frame, panic, task cancellation) removes the registry
//! entry exactly once. The outbound pump never unregisters: it stops when
//! the hub closes its queue or when a write fails, and closes its half of
//! the socket on the way out, which the inbound side then observes.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::envelope::Envelope;
use super::hub::{HubHandle, Registration};
use super::scope::ScopeFilter;
use crate::domain::{ChatId, ConnectionId, UserId};
use crate::error::RelayError;
use crate::persistence::{MessageStore, NewMessage};

/// Default per-connection outbound queue capacity.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Default largest inbound frame, in bytes.
pub const MAX_FRAME_BYTES: usize = 512;

/// Default time allowed between frames from the peer.
pub const PONG_WAIT: Duration = Duration::from_secs(60);

/// Default time allowed for one socket write.
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Tunables shared by every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Outbound queue capacity.
    pub outbound_capacity: usize,
    /// Largest inbound frame accepted; larger frames end the connection.
    pub max_frame_bytes: usize,
    /// Read-liveness timeout.
    pub pong_wait: Duration,
    /// Deadline for each socket write.
    pub write_wait: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            outbound_capacity: OUTBOUND_QUEUE_CAPACITY,
            max_frame_bytes: MAX_FRAME_BYTES,
            pong_wait: PONG_WAIT,
            write_wait: WRITE_WAIT,
        }
    }
}

impl ConnectionSettings {
    /// Interval between keepalive pings: 9/10 of the liveness timeout, so a
    /// ping always goes out before the peer's deadline.
    #[must_use]
    pub fn ping_period(&self) -> Duration {
        self.pong_wait * 9 / 10
    }
}

/// Who a connection belongs to and which chat it is scoped to.
///
/// Fixed when the upgrade is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionIdentity {
    id: ConnectionId,
    user_id: UserId,
    chat_id: ChatId,
}

impl ConnectionIdentity {
    /// Allocates a fresh connection id for `user_id` in `chat_id`.
    #[must_use]
    pub fn new(user_id: UserId, chat_id: ChatId) -> Self {
        Self {
            id: ConnectionId::new(),
            user_id,
            chat_id,
        }
    }

    /// Registry key.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Authenticated user.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Chat scope.
    #[must_use]
    pub const fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    /// Returns `true` when both user and chat are real storage ids, which is
    /// required before anything is persisted on this connection's behalf.
    #[must_use]
    pub const fn is_established(&self) -> bool {
        self.user_id.is_assigned() && self.chat_id.is_assigned()
    }
}

/// Why a pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// The peer sent a close frame or the stream ended.
    PeerClosed,
    /// Reading from the socket failed.
    ReadError,
    /// Nothing arrived within the liveness timeout.
    LivenessTimeout,
    /// A frame exceeded the size limit.
    FrameTooLarge,
    /// The hub loop is gone.
    HubClosed,
    /// The hub closed the outbound queue.
    QueueClosed,
    /// Writing to the socket failed.
    WriteError,
    /// A write did not finish before its deadline.
    WriteTimeout,
}

/// A live connection: identity plus the collaborators its pumps use.
#[derive(Debug, Clone)]
pub struct Connection {
    identity: ConnectionIdentity,
    hub: HubHandle,
    store: Arc<dyn MessageStore>,
    settings: ConnectionSettings,
}

impl Connection {
    /// Creates a connection that has not been registered yet.
    #[must_use]
    pub fn new(
        identity: ConnectionIdentity,
        hub: HubHandle,
        store: Arc<dyn MessageStore>,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            identity,
            hub,
            store,
            settings,
        }
    }

    /// Returns this connection's identity.
    #[must_use]
    pub const fn identity(&self) -> &ConnectionIdentity {
        &self.identity
    }

    /// Serves an upgraded socket until the connection ends.
    pub async fn run(self, socket: WebSocket) -> PumpExit {
        let (sink, stream) = socket.split();
        self.serve(sink, stream).await
    }

    /// Registers with the hub, spawns the outbound pump on `sink`, and runs
    /// the inbound pump on `stream` in the current task.
    ///
    /// Returns once both pumps have stopped, with the inbound pump's reason.
    pub async fn serve<S, R, E>(self, sink: S, stream: R) -> PumpExit
    where
        S: Sink<Message> + Unpin + Send + 'static,
        S::Error: fmt::Display,
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: fmt::Display,
    {
        let id = self.identity.id();
        let (outbound_tx, outbound_rx) = mpsc::channel(self.settings.outbound_capacity.max(1));
        if let Err(err) = self
            .hub
            .register(Registration::new(self.identity, outbound_tx))
        {
            tracing::error!(connection_id = %id, error = %err, "could not register connection");
            return PumpExit::HubClosed;
        }

        let writer = tokio::spawn(outbound_pump(
            sink,
            outbound_rx,
            ScopeFilter::new(self.identity.chat_id()),
            self.settings,
            id,
        ));

        let exit = self.inbound_pump(stream).await;

        match writer.await {
            Ok(writer_exit) => tracing::debug!(connection_id = %id, exit = ?writer_exit, "outbound pump joined"),
            Err(err) => tracing::warn!(connection_id = %id, error = %err, "outbound pump aborted"),
        }
        tracing::info!(connection_id = %id, exit = ?exit, "connection closed");
        exit
    }

    async fn inbound_pump<R, E>(&self, mut stream: R) -> PumpExit
    where
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: fmt::Display,
    {
        let id = self.identity.id();
        let _registered = UnregisterOnDrop { hub: &self.hub, id };
        let mut deadline = Instant::now() + self.settings.pong_wait;

        loop {
            let frame = match time::timeout_at(deadline, stream.next()).await {
                Err(_) => {
                    tracing::info!(connection_id = %id, "read deadline elapsed");
                    return PumpExit::LivenessTimeout;
                }
                Ok(None) => return PumpExit::PeerClosed,
                Ok(Some(Err(err))) => {
                    tracing::debug!(connection_id = %id, error = %err, "socket read failed");
                    return PumpExit::ReadError;
                }
                Ok(Some(Ok(frame))) => frame,
            };
            deadline = Instant::now() + self.settings.pong_wait;

            let payload = match frame {
                Message::Text(text) => Bytes::from(text),
                Message::Binary(data) => data,
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(_) => return PumpExit::PeerClosed,
            };

            if payload.len() > self.settings.max_frame_bytes {
                tracing::warn!(
                    connection_id = %id,
                    size = payload.len(),
                    limit = self.settings.max_frame_bytes,
                    "frame too large"
                );
                return PumpExit::FrameTooLarge;
            }

            if self.relay(payload).await.is_err() {
                tracing::error!(connection_id = %id, "hub stopped; dropping connection");
                return PumpExit::HubClosed;
            }
        }
    }

    async fn relay(&self, raw: Bytes) -> Result<(), RelayError> {
        let id = self.identity.id();
        let outbound = match Envelope::decode(&raw) {
            Ok(envelope) => {
                self.persist(&envelope.content).await;
                match envelope.rescoped(self.identity.chat_id()).encode() {
                    Ok(encoded) => encoded,
                    Err(err) => {
                        tracing::warn!(connection_id = %id, error = %err, "re-encoding failed; forwarding raw frame");
                        raw
                    }
                }
            }
            Err(err) => {
                tracing::warn!(connection_id = %id, error = %err, "malformed payload; forwarding raw frame");
                raw
            }
        };
        self.hub.broadcast(outbound)
    }

    /// Stores `content` on behalf of this connection; failures are logged
    /// and swallowed.
    ///
    /// Identities built by the `/ws` handler always carry positive user and
    /// chat ids, so the incomplete-identity branch is only reachable for
    /// connections constructed directly.
    async fn persist(&self, content: &str) {
        if !self.identity.is_established() {
            tracing::debug!(
                connection_id = %self.identity.id(),
                user_id = %self.identity.user_id(),
                chat_id = %self.identity.chat_id(),
                "identity incomplete; skipping persistence"
            );
            return;
        }

        let message = NewMessage {
            chat_id: self.identity.chat_id(),
            user_id: self.identity.user_id(),
            content: content.to_string(),
        };
        match self.store.persist_message(message).await {
            Ok(stored) => tracing::debug!(
                connection_id = %self.identity.id(),
                message_id = stored.id,
                "message persisted"
            ),
            Err(err) => tracing::warn!(
                connection_id = %self.identity.id(),
                error = %err,
                "failed to persist message; delivering anyway"
            ),
        }
    }
}

#[derive(Debug)]
struct UnregisterOnDrop<'a> {
    hub: &'a HubHandle,
    id: ConnectionId,
}

impl Drop for UnregisterOnDrop<'_> {
    fn drop(&mut self) {
        if self.hub.unregister(self.id).is_err() {
            tracing::debug!(connection_id = %self.id, "hub already stopped at unregister");
        }
    }
}

async fn outbound_pump<S>(
    mut sink: S,
    mut queue: mpsc::Receiver<Bytes>,
    filter: ScopeFilter,
    settings: ConnectionSettings,
    id: ConnectionId,
) -> PumpExit
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    let period = settings.ping_period();
    let mut keepalive = time::interval_at(Instant::now() + period, period);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let exit = loop {
        tokio::select! {
            queued = queue.recv() => {
                let Some(first) = queued else {
                    let _ = write(&mut sink, Message::Close(None), settings.write_wait).await;
                    break PumpExit::QueueClosed;
                };
                let Some(frame) = coalesce(first, &mut queue, &filter) else {
                    continue;
                };
                if let Err(exit) = write(&mut sink, frame, settings.write_wait).await {
                    break exit;
                }
            }
            _ = keepalive.tick() => {
                if let Err(exit) = write(&mut sink, Message::Ping(Bytes::new()), settings.write_wait).await {
                    break exit;
                }
            }
        }
    };

    if let Ok(Err(err)) = time::timeout(settings.write_wait, sink.close()).await {
        tracing::debug!(connection_id = %id, error = %err, "socket close failed");
    }
    tracing::debug!(connection_id = %id, exit = ?exit, "outbound pump stopped");
    exit
}

/// Builds one frame from `first` plus whatever is already queued, keeping
/// only payloads the filter admits. Returns `None` if `first` is filtered out.
fn coalesce(
    first: Bytes,
    queue: &mut mpsc::Receiver<Bytes>,
    filter: &ScopeFilter,
) -> Option<Message> {
    if !filter.admits(&first) {
        return None;
    }

    let mut batch = Vec::from(first.as_ref());
    for _ in 0..queue.len() {
        let Ok(next) = queue.try_recv() else {
            break;
        };
        if filter.admits(&next) {
            batch.push(b'\n');
            batch.extend_from_slice(&next);
        }
    }

    Some(match String::from_utf8(batch) {
        Ok(text) => Message::text(text),
        Err(err) => Message::Binary(Bytes::from(err.into_bytes())),
    })
}

async fn write<S>(sink: &mut S, frame: Message, deadline: Duration) -> Result<(), PumpExit>
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    match time::timeout(deadline, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => {
            tracing::debug!(error = %err, "socket write failed");
            Err(PumpExit::WriteError)
        }
        Err(_) => {
            tracing::warn!("socket write deadline exceeded");
            Err(PumpExit::WriteTimeout)
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::io;
    use std::pin::Pin;

    use async_trait::async_trait;
    use futures_util::{sink, stream};

    use super::*;
    use crate::persistence::{MemoryStore, Page, StoredMessage};
    use crate::ws::hub::{BackpressurePolicy, Hub};

    type TestSink = Pin<Box<dyn Sink<Message, Error = io::Error> + Send>>;

    fn recording_sink() -> (TestSink, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = sink::unfold(tx, |tx, frame: Message| async move {
            tx.send(frame)
                .map_err(|_| io::Error::other("recorder dropped"))?;
            Ok::<_, io::Error>(tx)
        });
        (Box::pin(sink), rx)
    }

    fn stalled_sink() -> TestSink {
        Box::pin(sink::unfold((), |(), _frame: Message| {
            futures_util::future::pending::<Result<(), io::Error>>()
        }))
    }

    fn incoming(
        items: Vec<Result<Message, io::Error>>,
    ) -> stream::Iter<std::vec::IntoIter<Result<Message, io::Error>>> {
        stream::iter(items)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Message> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            out.push(frame);
        }
        out
    }

    fn texts(messages: &[Message]) -> Vec<String> {
        messages
            .iter()
            .filter_map(|m| match m {
                Message::Text(t) => Some(t.as_str().to_string()),
                _ => None,
            })
            .collect()
    }

    #[derive(Debug)]
    struct FailingStore;

    #[async_trait]
    impl MessageStore for FailingStore {
        async fn persist_message(&self, _message: NewMessage) -> Result<StoredMessage, RelayError> {
            Err(RelayError::Persistence("database unavailable".into()))
        }

        async fn messages_for_chat(
            &self,
            _chat_id: ChatId,
            _page: Page,
        ) -> Result<Vec<StoredMessage>, RelayError> {
            Err(RelayError::Persistence("database unavailable".into()))
        }
    }

    fn connection(hub: &HubHandle, store: Arc<dyn MessageStore>, chat: i64) -> Connection {
        Connection::new(
            ConnectionIdentity::new(UserId::new(1), ChatId::new(chat)),
            hub.clone(),
            store,
            ConnectionSettings::default(),
        )
    }

    async fn count(hub: &HubHandle) -> usize {
        let Ok(n) = hub.connection_count().await else {
            panic!("hub closed");
        };
        n
    }

    #[test]
    fn ping_period_precedes_liveness_deadline() {
        let settings = ConnectionSettings::default();
        assert_eq!(settings.ping_period(), Duration::from_secs(54));
        assert!(settings.ping_period() < settings.pong_wait);
    }

    #[test]
    fn identity_requires_real_ids() {
        assert!(ConnectionIdentity::new(UserId::new(1), ChatId::new(1)).is_established());
        assert!(!ConnectionIdentity::new(UserId::new(0), ChatId::new(1)).is_established());
        assert!(!ConnectionIdentity::new(UserId::new(1), ChatId::new(0)).is_established());
    }

    #[tokio::test]
    async fn sender_scope_overrides_client_scope() {
        let (hub, _task) = Hub::spawn(BackpressurePolicy::Disconnect);
        let store = Arc::new(MemoryStore::new());
        let (sink, mut written) = recording_sink();
        let inbound = incoming(vec![Ok(Message::text(r#"{"content":"hello","chat_id":99}"#))]);

        let exit = connection(&hub, store, 7).serve(sink, inbound).await;

        assert_eq!(exit, PumpExit::PeerClosed);
        let frames = drain(&mut written);
        assert_eq!(texts(&frames), [r#"{"content":"hello","chat_id":7}"#]);
        assert!(matches!(frames.last(), Some(Message::Close(_))));
    }

    #[tokio::test]
    async fn messages_are_persisted_with_connection_identity() {
        let (hub, _task) = Hub::spawn(BackpressurePolicy::Disconnect);
        let store = Arc::new(MemoryStore::new());
        let (sink, _written) = recording_sink();
        let inbound = incoming(vec![Ok(Message::text(r#"{"content":"kept"}"#))]);

        let _ = connection(&hub, Arc::clone(&store) as Arc<dyn MessageStore>, 3)
            .serve(sink, inbound)
            .await;

        let Ok(history) = store.messages_for_chat(ChatId::new(3), Page::numbered(1, 10)).await else {
            panic!("history failed");
        };
        assert_eq!(history.len(), 1);
        assert!(history.iter().all(|m| m.content == "kept" && m.user_id == UserId::new(1)));
    }

    #[tokio::test]
    async fn persistence_failure_does_not_block_delivery() {
        let (hub, _task) = Hub::spawn(BackpressurePolicy::Disconnect);
        let (sink, mut written) = recording_sink();
        let inbound = incoming(vec![Ok(Message::text(r#"{"content":"still here"}"#))]);

        let exit = connection(&hub, Arc::new(FailingStore), 2).serve(sink, inbound).await;

        assert_eq!(exit, PumpExit::PeerClosed);
        assert_eq!(texts(&drain(&mut written)), [r#"{"content":"still here","chat_id":2}"#]);
    }

    #[tokio::test]
    async fn malformed_payload_is_forwarded_raw_and_not_persisted() {
        let (hub, _task) = Hub::spawn(BackpressurePolicy::Disconnect);
        let store = Arc::new(MemoryStore::new());
        let (sink, mut written) = recording_sink();
        let inbound = incoming(vec![Ok(Message::text("plain text, not json"))]);

        let _ = connection(&hub, Arc::clone(&store) as Arc<dyn MessageStore>, 1)
            .serve(sink, inbound)
            .await;

        assert_eq!(texts(&drain(&mut written)), ["plain text, not json"]);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn oversized_frame_ends_connection() {
        let (hub, _task) = Hub::spawn(BackpressurePolicy::Disconnect);
        let (sink, mut written) = recording_sink();
        let big = format!(r#"{{"content":"{}"}}"#, "x".repeat(MAX_FRAME_BYTES));
        let inbound = incoming(vec![
            Ok(Message::text(big)),
            Ok(Message::text(r#"{"content":"never read"}"#)),
        ]);

        let exit = connection(&hub, Arc::new(MemoryStore::new()), 1)
            .serve(sink, inbound)
            .await;

        assert_eq!(exit, PumpExit::FrameTooLarge);
        assert!(texts(&drain(&mut written)).is_empty());
        assert_eq!(count(&hub).await, 0);
    }

    #[tokio::test]
    async fn read_errors_leave_no_registry_entries() {
        let (hub, _task) = Hub::spawn(BackpressurePolicy::Disconnect);
        let mut sessions = Vec::new();
        for chat in 1..=8 {
            let (sink, _written) = recording_sink();
            let inbound = incoming(vec![Err(io::Error::other("connection reset"))]);
            let conn = connection(&hub, Arc::new(MemoryStore::new()), chat);
            sessions.push(tokio::spawn(conn.serve(sink, inbound)));
        }
        for session in sessions {
            assert!(matches!(session.await, Ok(PumpExit::ReadError)));
        }
        assert_eq!(count(&hub).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_hits_liveness_timeout() {
        let (hub, _task) = Hub::spawn(BackpressurePolicy::Disconnect);
        let (sink, mut written) = recording_sink();
        let started = Instant::now();

        let exit = connection(&hub, Arc::new(MemoryStore::new()), 1)
            .serve(sink, stream::pending::<Result<Message, io::Error>>())
            .await;

        assert_eq!(exit, PumpExit::LivenessTimeout);
        let elapsed = started.elapsed();
        assert!(elapsed >= PONG_WAIT);
        assert!(elapsed <= PONG_WAIT + WRITE_WAIT);
        let frames = drain(&mut written);
        assert!(matches!(frames.first(), Some(Message::Ping(_))));
        assert_eq!(count(&hub).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pong_pushes_back_liveness_deadline() {
        let (hub, _task) = Hub::spawn(BackpressurePolicy::Disconnect);
        let (sink, _written) = recording_sink();
        let pong_at = Duration::from_secs(50);
        let inbound = Box::pin(
            stream::once(async move {
                time::sleep(pong_at).await;
                Ok::<_, io::Error>(Message::Pong(Bytes::new()))
            })
            .chain(stream::pending()),
        );
        let started = Instant::now();

        let session = tokio::spawn(
            connection(&hub, Arc::new(MemoryStore::new()), 1).serve(sink, inbound),
        );

        time::sleep(PONG_WAIT + Duration::from_secs(1)).await;
        assert_eq!(count(&hub).await, 1);

        let Ok(exit) = session.await else {
            panic!("connection task failed");
        };
        assert_eq!(exit, PumpExit::LivenessTimeout);
        let elapsed = started.elapsed();
        assert!(elapsed >= pong_at + PONG_WAIT);
        assert!(elapsed <= pong_at + PONG_WAIT + WRITE_WAIT);
        assert_eq!(count(&hub).await, 0);
    }

    #[tokio::test]
    async fn outbound_filters_and_coalesces_queued_items() {
        let (tx, rx) = mpsc::channel(8);
        for payload in [
            r#"{"content":"a","chat_id":1}"#,
            r#"{"content":"b","chat_id":2}"#,
            r#"{"content":"c"}"#,
            "raw",
        ] {
            let _ = tx.try_send(Bytes::from(payload));
        }
        drop(tx);
        let (sink, mut written) = recording_sink();

        let exit = outbound_pump(
            sink,
            rx,
            ScopeFilter::new(ChatId::new(1)),
            ConnectionSettings::default(),
            ConnectionId::new(),
        )
        .await;

        assert_eq!(exit, PumpExit::QueueClosed);
        let frames = drain(&mut written);
        assert_eq!(
            texts(&frames),
            [concat!(r#"{"content":"a","chat_id":1}"#, "\n", r#"{"content":"c"}"#, "\n", "raw")]
        );
        assert!(matches!(frames.last(), Some(Message::Close(_))));
    }

    #[tokio::test]
    async fn outbound_skips_out_of_scope_head() {
        let (tx, rx) = mpsc::channel(8);
        let _ = tx.try_send(Bytes::from_static(br#"{"content":"elsewhere","chat_id":9}"#));
        drop(tx);
        let (sink, mut written) = recording_sink();

        let _ = outbound_pump(
            sink,
            rx,
            ScopeFilter::new(ChatId::new(1)),
            ConnectionSettings::default(),
            ConnectionId::new(),
        )
        .await;

        let frames = drain(&mut written);
        assert!(texts(&frames).is_empty());
        assert!(matches!(frames.as_slice(), [Message::Close(_)]));
    }

    #[tokio::test]
    async fn non_utf8_batches_go_out_as_binary() {
        let (tx, rx) = mpsc::channel(8);
        let _ = tx.try_send(Bytes::from_static(&[0xff, 0x00]));
        drop(tx);
        let (sink, mut written) = recording_sink();

        let _ = outbound_pump(
            sink,
            rx,
            ScopeFilter::new(ChatId::new(1)),
            ConnectionSettings::default(),
            ConnectionId::new(),
        )
        .await;

        assert!(matches!(
            drain(&mut written).first(),
            Some(Message::Binary(data)) if data.as_ref() == [0xff_u8, 0x00].as_slice()
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn outbound_sends_keepalive_pings() {
        let (tx, rx) = mpsc::channel::<Bytes>(8);
        let (sink, mut written) = recording_sink();
        let pump = tokio::spawn(outbound_pump(
            sink,
            rx,
            ScopeFilter::new(ChatId::new(1)),
            ConnectionSettings::default(),
            ConnectionId::new(),
        ));

        time::sleep(Duration::from_secs(110)).await;
        drop(tx);
        assert!(matches!(pump.await, Ok(PumpExit::QueueClosed)));

        let frames = drain(&mut written);
        let pings = frames.iter().filter(|m| matches!(m, Message::Ping(_))).count();
        assert_eq!(pings, 2);
        assert!(matches!(frames.last(), Some(Message::Close(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_write_hits_write_deadline() {
        let (tx, rx) = mpsc::channel(8);
        let _ = tx.try_send(Bytes::from_static(br#"{"content":"stuck"}"#));
        let started = Instant::now();

        let exit = outbound_pump(
            stalled_sink(),
            rx,
            ScopeFilter::new(ChatId::new(1)),
            ConnectionSettings::default(),
            ConnectionId::new(),
        )
        .await;

        assert_eq!(exit, PumpExit::WriteTimeout);
        assert!(started.elapsed() >= WRITE_WAIT);
        drop(tx);
    }
}
