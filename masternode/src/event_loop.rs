//! Membership event loop
//!
//! Sole writer of the registry. Applies contract joins and quits one at a
//! time and re-evaluates the local masternode whenever its own record
//! changes.

use crate::active::{ActiveMasternode, ActiveState};
use crate::error::{MasternodeError, Result};
use crate::events::{
    ChainEvent, ChainEventSource, EventStream, JoinEvent, PeerConnector, QuitEvent, Sequenced,
};
use crate::registry::SharedRegistry;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

pub struct MembershipEventLoop {
    registry: SharedRegistry,
    active: Arc<ActiveMasternode>,
    peers: Arc<dyn PeerConnector>,
}

impl MembershipEventLoop {
    pub fn new(
        registry: SharedRegistry,
        active: Arc<ActiveMasternode>,
        peers: Arc<dyn PeerConnector>,
    ) -> Self {
        Self {
            registry,
            active,
            peers,
        }
    }

    /// Re-run the local eligibility check against the registry
    pub fn update_active_masternode(&self) -> ActiveState {
        let record = self.registry.lookup(self.active.id());
        self.active.update(record.as_ref())
    }

    fn handle_join(&self, join: JoinEvent) {
        log::info!("➕ Masternode join {} at height {}", join.id.short(), join.join_height);
        let endpoint = join.endpoint;
        let id = join.id;
        self.registry.apply_join(join.into());

        if &id == self.active.id() {
            self.update_active_masternode();
        } else {
            self.peers.connect_peer(&endpoint);
        }
        self.registry.describe();
    }

    fn handle_quit(&self, quit: QuitEvent) {
        log::info!("➖ Masternode quit {}", quit.id.short());
        if self.registry.apply_quit(&quit.id).is_none() {
            log::debug!("Quit for unknown masternode {}", quit.id.short());
        }

        if &quit.id == self.active.id() {
            self.update_active_masternode();
        }
        self.registry.describe();
    }

    fn apply(&self, event: ChainEvent) {
        match event {
            ChainEvent::Join(join) => self.handle_join(join),
            ChainEvent::Quit(quit) => self.handle_quit(quit),
        }
    }

    /// Run until shutdown or until a subscription fails.
    ///
    /// Joins and quits are applied in contract log order even though they
    /// arrive on separate subscriptions. A failed stream ends the loop with
    /// `StreamFailure`; the registry can no longer follow the contract, so
    /// the caller must resubscribe or stop the masternode service.
    pub async fn run(
        self,
        source: Arc<dyn ChainEventSource>,
        mut shutdown: oneshot::Receiver<()>,
    ) -> Result<()> {
        for record in source.current_masternodes()? {
            self.registry.apply_join(record);
        }

        if self.update_active_masternode() == ActiveState::Started {
            log::info!("✅ Masternode {} started", self.active.id().short());
        } else {
            log::info!(
                "Masternode transaction data: {}",
                self.active.registration_call_data()
            );
        }
        self.registry.describe();

        let mut join = source.watch_join()?;
        let quit = match source.watch_quit() {
            Ok(quit) => quit,
            Err(e) => {
                join.unsubscribe();
                return Err(e);
            }
        };
        let EventStream {
            events: join_events,
            errors: mut join_errors,
        } = join;
        let EventStream {
            events: quit_events,
            errors: mut quit_errors,
        } = quit;
        let mut events = OrderedEvents::new(join_events, quit_events);

        // Shutdown wins over new arrivals; events already queued are still
        // applied before returning
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    log::info!("🛑 Masternode event loop shutting down");
                    events.close();
                    while let Some(event) = events.pop_ready() {
                        self.apply(event);
                    }
                    join_errors.close();
                    quit_errors.close();
                    return Ok(());
                }
                Some(err) = join_errors.recv() => {
                    log::error!("eventJoin err {}", err);
                    events.close();
                    join_errors.close();
                    quit_errors.close();
                    return Err(MasternodeError::stream_failure("join", err));
                }
                Some(err) = quit_errors.recv() => {
                    log::error!("eventQuit err {}", err);
                    events.close();
                    join_errors.close();
                    quit_errors.close();
                    return Err(MasternodeError::stream_failure("quit", err));
                }
                next = events.next() => match next {
                    Ok(event) => self.apply(event),
                    Err(e) => {
                        events.close();
                        join_errors.close();
                        quit_errors.close();
                        return Err(e);
                    }
                },
            }
        }
    }
}

/// Merges the join and quit subscriptions back into contract log order.
///
/// Holds at most one received event per stream. An event is released only
/// after the other stream has been checked for anything queued earlier.
struct OrderedEvents {
    join: mpsc::Receiver<Sequenced<JoinEvent>>,
    quit: mpsc::Receiver<Sequenced<QuitEvent>>,
    next_join: Option<Sequenced<JoinEvent>>,
    next_quit: Option<Sequenced<QuitEvent>>,
}

impl OrderedEvents {
    fn new(
        join: mpsc::Receiver<Sequenced<JoinEvent>>,
        quit: mpsc::Receiver<Sequenced<QuitEvent>>,
    ) -> Self {
        Self {
            join,
            quit,
            next_join: None,
            next_quit: None,
        }
    }

    /// Earliest event already queued on either stream
    fn pop_ready(&mut self) -> Option<ChainEvent> {
        if self.next_join.is_none() {
            self.next_join = self.join.try_recv().ok();
        }
        if self.next_quit.is_none() {
            self.next_quit = self.quit.try_recv().ok();
        }

        let join_first = match (&self.next_join, &self.next_quit) {
            (Some(join), Some(quit)) => join.seq < quit.seq,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return None,
        };
        if join_first {
            self.next_join.take().map(|join| ChainEvent::Join(join.event))
        } else {
            self.next_quit.take().map(|quit| ChainEvent::Quit(quit.event))
        }
    }

    /// Wait for the next event in log order. Cancel safe: a received event
    /// stays buffered until it is returned.
    async fn next(&mut self) -> Result<ChainEvent> {
        loop {
            if let Some(event) = self.pop_ready() {
                return Ok(event);
            }
            tokio::select! {
                event = self.join.recv() => match event {
                    Some(event) => self.next_join = Some(event),
                    None => return Err(MasternodeError::stream_failure("join", "stream closed")),
                },
                event = self.quit.recv() => match event {
                    Some(event) => self.next_quit = Some(event),
                    None => return Err(MasternodeError::stream_failure("quit", "stream closed")),
                },
            }
        }
    }

    /// Stop both subscriptions; events already queued can still be popped
    fn close(&mut self) {
        self.join.close();
        self.quit.close();
    }
}
