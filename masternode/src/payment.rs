//! Masternode payment selection
//!
//! Only the most senior tenth of the network is eligible for a block's
//! payment. Among those, the block hash decides the winner through the
//! score, so every senior node gets paid eventually and nobody can pick
//! the block it wins.

use crate::error::{MasternodeError, Result};
use crate::ranking::by_score_then_id;
use crate::registry::RegistrySnapshot;
use crate::score::{Score, Scorer, Sha256Scorer};
use crate::types::{BlockHash, MasternodeRecord};

/// Number of payment candidates for a registry of `total` masternodes
pub fn decile_size(total: usize) -> usize {
    (total / 10).max(1)
}

#[derive(Debug, Clone, Default)]
pub struct PaymentSelector<S = Sha256Scorer> {
    scorer: S,
}

impl<S: Scorer> PaymentSelector<S> {
    pub fn new(scorer: S) -> Self {
        Self { scorer }
    }

    /// Senior-decile candidates, most senior first
    pub fn candidates<'a>(&self, snapshot: &'a RegistrySnapshot) -> Vec<&'a MasternodeRecord> {
        let mut by_seniority: Vec<&MasternodeRecord> = snapshot.records().iter().collect();
        by_seniority.sort_by(|a, b| a.join_height.cmp(&b.join_height).then_with(|| a.id.cmp(&b.id)));
        by_seniority.truncate(decile_size(snapshot.len()));
        by_seniority
    }

    /// Pick the masternode owed the payment for the block after `block_hash`
    pub fn select_winner(
        &self,
        snapshot: &RegistrySnapshot,
        block_hash: &BlockHash,
    ) -> Result<MasternodeRecord> {
        if snapshot.is_empty() {
            return Err(MasternodeError::EmptyRegistry);
        }

        let mut best: Option<(Score, &MasternodeRecord)> = None;
        for candidate in self.candidates(snapshot) {
            let score = self.scorer.score(&candidate.id, block_hash);
            let replace = match &best {
                None => true,
                Some((best_score, best_record)) => {
                    by_score_then_id((&score, &candidate.id), (best_score, &best_record.id)).is_lt()
                }
            };
            if replace {
                best = Some((score, candidate));
            }
        }

        let (score, winner) = best.ok_or(MasternodeError::NoEligibleCandidate)?;
        log::debug!(
            "💰 Payment winner for block {}: {} (score {:?}, {} candidate(s))",
            block_hash,
            winner.id.short(),
            score,
            decile_size(snapshot.len())
        );
        Ok(winner.clone())
    }
}
