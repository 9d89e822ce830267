//! Vote eligibility for masternode quorums
//!
//! Only the top `quorum_size` masternodes by rank may cast an instant-send
//! lock vote for a block context. Payment votes are checked against the
//! payment selector instead.

use crate::error::Result;
use crate::payment::PaymentSelector;
use crate::ranking::RankingEngine;
use crate::registry::RegistrySnapshot;
use crate::score::{Scorer, Sha256Scorer};
use crate::types::{BlockHash, LockVote, MasternodeId, PaymentVote};

/// Masternodes allowed to sign a transaction lock
pub const DEFAULT_QUORUM_SIZE: usize = 10;

/// Outcome of a quorum eligibility check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteAuthorization {
    pub authorized: bool,
    /// `None` when the voter is not in the eligible set
    pub rank: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct QuorumGate<S = Sha256Scorer> {
    ranking: RankingEngine<S>,
    quorum_size: usize,
    min_protocol_version: u32,
}

impl<S: Scorer> QuorumGate<S> {
    pub fn new(ranking: RankingEngine<S>, quorum_size: usize, min_protocol_version: u32) -> Self {
        Self {
            ranking,
            quorum_size,
            min_protocol_version,
        }
    }

    pub fn quorum_size(&self) -> usize {
        self.quorum_size
    }

    pub fn authorize_vote(
        &self,
        id: &MasternodeId,
        snapshot: &RegistrySnapshot,
        block_hash: &BlockHash,
    ) -> VoteAuthorization {
        let rank = self
            .ranking
            .rank_of(id, snapshot, block_hash, self.min_protocol_version);

        let authorized = match rank {
            None => {
                log::info!(
                    "InstantSend::Vote -- can't calculate rank for masternode {}",
                    id.short()
                );
                false
            }
            Some(rank) if rank > self.quorum_size => {
                log::info!(
                    "InstantSend::Vote -- masternode {} not in the top {} ({})",
                    id.short(),
                    self.quorum_size,
                    rank
                );
                false
            }
            Some(rank) => {
                log::debug!(
                    "InstantSend::Vote -- masternode {} in the top {} ({})",
                    id.short(),
                    self.quorum_size,
                    rank
                );
                true
            }
        };

        VoteAuthorization { authorized, rank }
    }

    /// Apply the gate to the voter of an incoming lock vote
    pub fn authorize_lock_vote(&self, vote: &LockVote, snapshot: &RegistrySnapshot) -> VoteAuthorization {
        self.authorize_vote(&vote.voter, snapshot, &vote.block_hash)
    }

    /// A payment vote only counts if it names the selector's winner
    pub fn authorize_payment_vote<P: Scorer>(
        &self,
        vote: &PaymentVote,
        snapshot: &RegistrySnapshot,
        selector: &PaymentSelector<P>,
    ) -> Result<bool> {
        let winner = selector.select_winner(snapshot, &vote.block_hash)?;
        if winner.id != vote.payee {
            log::info!(
                "Payment vote from {} names {}, expected {}",
                vote.voter.short(),
                vote.payee.short(),
                winner.id.short()
            );
            return Ok(false);
        }
        Ok(true)
    }
}

impl Default for QuorumGate<Sha256Scorer> {
    fn default() -> Self {
        Self::new(RankingEngine::default(), DEFAULT_QUORUM_SIZE, 1)
    }
}
