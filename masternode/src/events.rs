//! Chain membership events and the collaborators around the event loop
//!
//! The registry contract announces joins and quits; how those
//! notifications reach us is up to the `ChainEventSource`. Peer connections
//! are delegated to a `PeerConnector`.

use crate::error::{MasternodeError, Result};
use crate::types::{MasternodeId, MasternodeRecord, NetworkEndpoint};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Buffer used for the contract watch channels
pub const EVENT_BUFFER: usize = 32;

fn default_protocol_version() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinEvent {
    pub id: MasternodeId,
    pub endpoint: NetworkEndpoint,
    pub join_height: u64,
    #[serde(default = "default_protocol_version")]
    pub protocol_version: u32,
}

impl From<JoinEvent> for MasternodeRecord {
    fn from(event: JoinEvent) -> Self {
        MasternodeRecord::new(event.id, event.endpoint, event.join_height, event.protocol_version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuitEvent {
    pub id: MasternodeId,
}

/// Membership change as replayed from a JSON lines feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChainEvent {
    Join(JoinEvent),
    Quit(QuitEvent),
}

impl ChainEvent {
    pub fn id(&self) -> &MasternodeId {
        match self {
            ChainEvent::Join(join) => &join.id,
            ChainEvent::Quit(quit) => &quit.id,
        }
    }
}

/// Parse a JSON lines event log. Blank lines and `#` comments are skipped;
/// events keep their line order.
pub fn parse_event_lines(content: &str) -> Result<Vec<ChainEvent>> {
    let mut events = Vec::new();
    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str(line).map_err(|e| {
            MasternodeError::InvalidInput(format!("event line {}: {}", line_num + 1, e))
        })?;
        events.push(event);
    }
    Ok(events)
}

/// Event tagged with its position in the contract log.
///
/// Positions are shared by every stream of one source and strictly
/// increase in log order, which lets the event loop put joins and quits
/// back in chain order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequenced<T> {
    pub seq: u64,
    pub event: T,
}

/// Receiving half of one contract event subscription
pub struct EventStream<T> {
    pub(crate) events: mpsc::Receiver<Sequenced<T>>,
    pub(crate) errors: mpsc::Receiver<String>,
}

impl<T> EventStream<T> {
    pub fn new(events: mpsc::Receiver<Sequenced<T>>, errors: mpsc::Receiver<String>) -> Self {
        Self { events, errors }
    }

    /// Stop receiving; the source sees both channels closed
    pub fn unsubscribe(&mut self) {
        self.events.close();
        self.errors.close();
    }
}

/// Sending half of one contract event subscription
#[derive(Clone)]
pub struct EventSender<T> {
    stream: &'static str,
    events: mpsc::Sender<Sequenced<T>>,
    errors: mpsc::Sender<String>,
    next_seq: Arc<Mutex<u64>>,
}

impl<T> EventSender<T> {
    /// Queue an event behind everything already sent on this source
    pub async fn send(&self, event: T) -> Result<()> {
        let permit = self
            .events
            .reserve()
            .await
            .map_err(|_| MasternodeError::stream_failure(self.stream, "subscriber gone"))?;

        // Stamping and queueing happen under one lock so a lower position
        // is always queued before a higher one
        let mut next_seq = self.next_seq.lock();
        permit.send(Sequenced {
            seq: *next_seq,
            event,
        });
        *next_seq += 1;
        Ok(())
    }

    /// Report a subscription failure to the subscriber
    pub async fn fail(&self, reason: impl Into<String>) -> Result<()> {
        self.errors
            .send(reason.into())
            .await
            .map_err(|_| MasternodeError::stream_failure(self.stream, "subscriber gone"))
    }

    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

/// Build a connected sender/stream pair
pub fn channel_stream<T>(stream: &'static str, buffer: usize) -> (EventSender<T>, EventStream<T>) {
    sequenced_stream(stream, buffer, Arc::new(Mutex::new(0)))
}

fn sequenced_stream<T>(
    stream: &'static str,
    buffer: usize,
    next_seq: Arc<Mutex<u64>>,
) -> (EventSender<T>, EventStream<T>) {
    let (events_tx, events_rx) = mpsc::channel(buffer);
    let (errors_tx, errors_rx) = mpsc::channel(1);
    (
        EventSender {
            stream,
            events: events_tx,
            errors: errors_tx,
            next_seq,
        },
        EventStream::new(events_rx, errors_rx),
    )
}

/// Source of registry contract notifications
pub trait ChainEventSource: Send + Sync {
    /// Masternodes already registered when the loop starts
    fn current_masternodes(&self) -> Result<Vec<MasternodeRecord>> {
        Ok(Vec::new())
    }

    fn watch_join(&self) -> Result<EventStream<JoinEvent>>;

    fn watch_quit(&self) -> Result<EventStream<QuitEvent>>;
}

/// In-process event source fed through an `EventFeed`
pub struct ChannelEventSource {
    initial: Vec<MasternodeRecord>,
    join: Mutex<Option<EventStream<JoinEvent>>>,
    quit: Mutex<Option<EventStream<QuitEvent>>>,
}

/// Producer side of a `ChannelEventSource`
#[derive(Clone)]
pub struct EventFeed {
    pub join: EventSender<JoinEvent>,
    pub quit: EventSender<QuitEvent>,
}

impl EventFeed {
    /// Feed one event; events are applied in the order they are sent,
    /// whichever stream carries them
    pub async fn send(&self, event: ChainEvent) -> Result<()> {
        match event {
            ChainEvent::Join(join) => self.join.send(join).await,
            ChainEvent::Quit(quit) => self.quit.send(quit).await,
        }
    }
}

impl ChannelEventSource {
    pub fn new(buffer: usize) -> (Self, EventFeed) {
        let next_seq = Arc::new(Mutex::new(0));
        let (join_tx, join_rx) = sequenced_stream("join", buffer, next_seq.clone());
        let (quit_tx, quit_rx) = sequenced_stream("quit", buffer, next_seq);
        let source = Self {
            initial: Vec::new(),
            join: Mutex::new(Some(join_rx)),
            quit: Mutex::new(Some(quit_rx)),
        };
        (
            source,
            EventFeed {
                join: join_tx,
                quit: quit_tx,
            },
        )
    }

    pub fn with_initial(mut self, records: Vec<MasternodeRecord>) -> Self {
        self.initial = records;
        self
    }
}

impl ChainEventSource for ChannelEventSource {
    fn current_masternodes(&self) -> Result<Vec<MasternodeRecord>> {
        Ok(self.initial.clone())
    }

    fn watch_join(&self) -> Result<EventStream<JoinEvent>> {
        self.join
            .lock()
            .take()
            .ok_or_else(|| MasternodeError::stream_failure("join", "already subscribed"))
    }

    fn watch_quit(&self) -> Result<EventStream<QuitEvent>> {
        self.quit
            .lock()
            .take()
            .ok_or_else(|| MasternodeError::stream_failure("quit", "already subscribed"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    UselessPeer,
    Requested,
}

/// Networking layer as seen by the coordinator
pub trait PeerConnector: Send + Sync {
    /// Best effort; failures stay inside the networking layer
    fn connect_peer(&self, endpoint: &NetworkEndpoint);

    fn disconnect_peer(&self, id: &MasternodeId, reason: DisconnectReason);
}

/// Connector that only logs, for running without a p2p stack
#[derive(Debug, Default)]
pub struct LoggingPeerConnector;

impl PeerConnector for LoggingPeerConnector {
    fn connect_peer(&self, endpoint: &NetworkEndpoint) {
        log::info!("🔗 Connect masternode peer {}", endpoint);
    }

    fn disconnect_peer(&self, id: &MasternodeId, reason: DisconnectReason) {
        log::info!("✂️  Disconnect masternode peer {} ({:?})", id.short(), reason);
    }
}
