//! Masternode manager
//!
//! Entry point used by the node: owns the shared registry and the local
//! masternode state, starts the membership event loop and answers payment
//! and vote eligibility questions from registry snapshots.

use crate::active::{ActiveMasternode, ActiveState};
use crate::config::MasternodeConfig;
use crate::error::{MasternodeError, Result};
use crate::event_loop::MembershipEventLoop;
use crate::events::{ChainEventSource, DisconnectReason, PeerConnector};
use crate::payment::PaymentSelector;
use crate::quorum::{QuorumGate, VoteAuthorization};
use crate::ranking::{RankedEntry, RankingEngine};
use crate::registry::SharedRegistry;
use crate::types::{BlockHash, LockVote, MasternodeId, MasternodeRecord, PaymentVote};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Handle on a running membership event loop
pub struct MembershipHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl MembershipHandle {
    /// Signal shutdown and wait for the loop to stop
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.join().await
    }

    /// Wait for the loop to end on its own (stream failure).
    ///
    /// A panic inside the loop is resumed on the caller; a cancelled task is
    /// `EventLoopAborted`, never a stream failure.
    pub async fn join(self) -> Result<()> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(MasternodeError::EventLoopAborted(e.to_string())),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

pub struct MasternodeManager {
    config: MasternodeConfig,
    registry: SharedRegistry,
    active: Arc<ActiveMasternode>,
    peers: Arc<dyn PeerConnector>,
    ranking: RankingEngine,
    payments: PaymentSelector,
    quorum: QuorumGate,
}

impl MasternodeManager {
    pub fn new(config: MasternodeConfig, peers: Arc<dyn PeerConnector>) -> Self {
        let active = Arc::new(ActiveMasternode::new(config.node_id, config.listen_addr));
        let quorum = QuorumGate::new(
            RankingEngine::default(),
            config.quorum_size,
            config.min_protocol_version,
        );
        Self {
            config,
            registry: SharedRegistry::new(),
            active,
            peers,
            ranking: RankingEngine::default(),
            payments: PaymentSelector::default(),
            quorum,
        }
    }

    pub fn config(&self) -> &MasternodeConfig {
        &self.config
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn active_state(&self) -> ActiveState {
        self.active.state()
    }

    /// Spawn the membership event loop on the current runtime
    pub fn start(&self, source: Arc<dyn ChainEventSource>) -> MembershipHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let event_loop =
            MembershipEventLoop::new(self.registry.clone(), self.active.clone(), self.peers.clone());

        log::info!("🚀 Starting masternode event loop for {}", self.config.node_id.short());
        MembershipHandle {
            shutdown: Some(shutdown_tx),
            task: tokio::spawn(event_loop.run(source, shutdown_rx)),
        }
    }

    /// Deterministically select the senior masternode owed the payment for
    /// the block following `block_hash`
    pub fn next_masternode_for_payment(&self, block_hash: &BlockHash) -> Result<MasternodeRecord> {
        self.payments.select_winner(&self.registry.snapshot(), block_hash)
    }

    /// Payment-due hook: an empty registry skips the payment for this block
    pub fn process_block_payment(&self, block_hash: &BlockHash) -> Option<MasternodeRecord> {
        match self.next_masternode_for_payment(block_hash) {
            Ok(winner) => {
                log::info!("💰 Block after {} pays masternode {}", block_hash, winner.id.short());
                Some(winner)
            }
            Err(e) => {
                log::warn!("Skipping masternode payment after block {}: {}", block_hash, e);
                None
            }
        }
    }

    pub fn masternode_scores(&self, block_hash: &BlockHash) -> Vec<RankedEntry> {
        self.ranking
            .rank(&self.registry.snapshot(), block_hash, self.config.min_protocol_version)
    }

    pub fn masternode_rank(&self, id: &MasternodeId, block_hash: &BlockHash) -> Result<usize> {
        self.ranking
            .rank_of(id, &self.registry.snapshot(), block_hash, self.config.min_protocol_version)
            .ok_or(MasternodeError::NotFound(*id))
    }

    /// Whether this node may cast an instant-send lock vote right now
    pub fn can_vote_tx_lock(&self, block_hash: &BlockHash) -> VoteAuthorization {
        self.quorum
            .authorize_vote(self.active.id(), &self.registry.snapshot(), block_hash)
    }

    pub fn accept_lock_vote(&self, vote: &LockVote) -> bool {
        self.quorum
            .authorize_lock_vote(vote, &self.registry.snapshot())
            .authorized
    }

    pub fn accept_payment_vote(&self, vote: &PaymentVote) -> bool {
        match self
            .quorum
            .authorize_payment_vote(vote, &self.registry.snapshot(), &self.payments)
        {
            Ok(accepted) => accepted,
            Err(e) => {
                log::info!("Rejecting payment vote from {}: {}", vote.voter.short(), e);
                false
            }
        }
    }

    /// Drop a masternode peer at the networking layer
    pub fn remove_peer(&self, id: &MasternodeId) {
        log::debug!("Removing masternode peer {}", id.short());
        self.peers.disconnect_peer(id, DisconnectReason::UselessPeer);
    }
}
