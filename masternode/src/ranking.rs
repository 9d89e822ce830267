//! Deterministic masternode ranking for a block context
//!
//! Masternodes are ordered by score, highest first. Equal scores fall back
//! to the identity so every node produces the same strict order.

use crate::registry::RegistrySnapshot;
use crate::score::{Score, Scorer, Sha256Scorer};
use crate::types::{BlockHash, MasternodeId, MasternodeRecord};
use serde::Serialize;
use std::cmp::Ordering;

/// Position of one masternode in a ranking
#[derive(Debug, Clone, Serialize)]
pub struct RankedEntry {
    /// 1-based
    pub rank: usize,
    pub score: Score,
    pub record: MasternodeRecord,
}

/// Ordering shared by ranking and payment selection: score descending,
/// then identity ascending.
pub(crate) fn by_score_then_id(
    a: (&Score, &MasternodeId),
    b: (&Score, &MasternodeId),
) -> Ordering {
    b.0.cmp(a.0).then_with(|| a.1.cmp(b.1))
}

#[derive(Debug, Clone, Default)]
pub struct RankingEngine<S = Sha256Scorer> {
    scorer: S,
}

impl<S: Scorer> RankingEngine<S> {
    pub fn new(scorer: S) -> Self {
        Self { scorer }
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    /// Rank every masternode running at least `min_protocol_version`
    pub fn rank(
        &self,
        snapshot: &RegistrySnapshot,
        block_hash: &BlockHash,
        min_protocol_version: u32,
    ) -> Vec<RankedEntry> {
        let mut scored: Vec<(Score, &MasternodeRecord)> = snapshot
            .records()
            .iter()
            .filter(|r| r.protocol_version >= min_protocol_version)
            .map(|r| (self.scorer.score(&r.id, block_hash), r))
            .collect();

        scored.sort_by(|a, b| by_score_then_id((&a.0, &a.1.id), (&b.0, &b.1.id)));

        scored
            .into_iter()
            .enumerate()
            .map(|(i, (score, record))| RankedEntry {
                rank: i + 1,
                score,
                record: record.clone(),
            })
            .collect()
    }

    /// 1-based rank of `id`, or `None` if it is not among the eligible set
    pub fn rank_of(
        &self,
        id: &MasternodeId,
        snapshot: &RegistrySnapshot,
        block_hash: &BlockHash,
        min_protocol_version: u32,
    ) -> Option<usize> {
        let target = snapshot.get(id)?;
        if target.protocol_version < min_protocol_version {
            return None;
        }
        let target_score = self.scorer.score(id, block_hash);

        // Count the eligible masternodes ordered ahead of the target
        let ahead = snapshot
            .records()
            .iter()
            .filter(|r| r.protocol_version >= min_protocol_version && &r.id != id)
            .filter(|r| {
                let score = self.scorer.score(&r.id, block_hash);
                by_score_then_id((&score, &r.id), (&target_score, id)) == Ordering::Less
            })
            .count();

        Some(ahead + 1)
    }
}
