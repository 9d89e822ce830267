//! Masternode coordination layer
//!
//! Tracks the registered masternode set from contract join/quit events,
//! ranks it with a block-hash seeded score, selects the masternode owed
//! each block's payment and gates which masternodes may sign instant-send
//! transaction locks.

pub mod active;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod events;
pub mod manager;
pub mod payment;
pub mod quorum;
pub mod ranking;
pub mod registry;
pub mod score;
pub mod types;

pub use active::{ActiveMasternode, ActiveState};
pub use config::{ConfigError, MasternodeConfig};
pub use error::{MasternodeError, Result};
pub use event_loop::MembershipEventLoop;
pub use events::{
    parse_event_lines, ChainEvent, ChainEventSource, ChannelEventSource, DisconnectReason,
    EventFeed, JoinEvent, LoggingPeerConnector, PeerConnector, QuitEvent, Sequenced,
};
pub use manager::{MasternodeManager, MembershipHandle};
pub use payment::PaymentSelector;
pub use quorum::{QuorumGate, VoteAuthorization, DEFAULT_QUORUM_SIZE};
pub use ranking::{RankedEntry, RankingEngine};
pub use registry::{MasternodeRegistry, RegistrySnapshot, SharedRegistry};
pub use score::{calculate_score, Score, Scorer, Sha256Scorer};
pub use types::{BlockHash, LockVote, MasternodeId, MasternodeRecord, NetworkEndpoint, PaymentVote};

/// Masternode module version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(version(), "0.1.0");
    }
}
