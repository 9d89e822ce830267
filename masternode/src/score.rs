//! Block-hash seeded masternode score
//!
//! Every node derives the same score for the same (identity, block hash)
//! pair without talking to anyone, and nobody can predict it before the
//! block hash exists.

use crate::error::Result;
use crate::types::{hash_from_slice, BlockHash, MasternodeId};
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// 256-bit unsigned score, stored big-endian so byte order is numeric order
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Score([u8; 32]);

impl Score {
    pub const ZERO: Score = Score([0u8; 32]);

    pub const fn from_be_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Score(0x{}..)", hex::encode(&self.0[..6]))
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Source of masternode scores
pub trait Scorer {
    fn score(&self, id: &MasternodeId, block_hash: &BlockHash) -> Score;
}

/// SHA-256 over `identity || block_hash`
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Scorer;

impl Scorer for Sha256Scorer {
    fn score(&self, id: &MasternodeId, block_hash: &BlockHash) -> Score {
        let mut hasher = Sha256::new();
        hasher.update(id.as_bytes());
        hasher.update(block_hash.as_bytes());
        Score(hasher.finalize().into())
    }
}

impl<S: Scorer + ?Sized> Scorer for &S {
    fn score(&self, id: &MasternodeId, block_hash: &BlockHash) -> Score {
        (**self).score(id, block_hash)
    }
}

/// Score raw identity and block hash bytes, rejecting malformed lengths
pub fn calculate_score(identity: &[u8], block_hash: &[u8]) -> Result<Score> {
    let id = MasternodeId::from_bytes(hash_from_slice("masternode id", identity)?);
    let block_hash = BlockHash::from_bytes(hash_from_slice("block hash", block_hash)?);
    Ok(Sha256Scorer.score(&id, &block_hash))
}
