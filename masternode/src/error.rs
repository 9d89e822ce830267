//! Masternode error types

use crate::types::MasternodeId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MasternodeError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Masternode registry is empty")]
    EmptyRegistry,

    #[error("No eligible payment candidate")]
    NoEligibleCandidate,

    #[error("Masternode not found: {0}")]
    NotFound(MasternodeId),

    #[error("{stream} event stream failed: {reason}")]
    StreamFailure { stream: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Membership event loop aborted: {0}")]
    EventLoopAborted(String),
}

impl MasternodeError {
    /// Errors a vote handler should answer with "reject" rather than escalate
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::NotFound(_)
                | Self::EmptyRegistry
                | Self::NoEligibleCandidate
        )
    }

    pub(crate) fn stream_failure(stream: &str, reason: impl Into<String>) -> Self {
        Self::StreamFailure {
            stream: stream.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MasternodeError>;
