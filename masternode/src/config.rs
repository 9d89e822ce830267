//! Masternode coordinator configuration (masternode.toml)
//!
//! Example:
//! ```toml
//! node_id = "2bcd3c84c84f87eaa86e4e56834c92927a07f9e18718810b92e0d0324456a67c"
//! listen_addr = "192.168.1.100:30303"
//! quorum_size = 10
//! min_protocol_version = 1
//! ```

use crate::error::MasternodeError;
use crate::quorum::DEFAULT_QUORUM_SIZE;
use crate::types::{MasternodeId, NetworkEndpoint};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

impl From<ConfigError> for MasternodeError {
    fn from(e: ConfigError) -> Self {
        MasternodeError::Config(e.to_string())
    }
}

fn default_quorum_size() -> usize {
    DEFAULT_QUORUM_SIZE
}

fn default_min_protocol_version() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MasternodeConfig {
    /// Identity this node registered with
    pub node_id: MasternodeId,

    /// Endpoint the node is bound to; must equal the registered one
    pub listen_addr: NetworkEndpoint,

    /// Top-ranked masternodes allowed to sign a transaction lock
    #[serde(default = "default_quorum_size")]
    pub quorum_size: usize,

    #[serde(default = "default_min_protocol_version")]
    pub min_protocol_version: u32,
}

impl MasternodeConfig {
    pub fn new(node_id: MasternodeId, listen_addr: NetworkEndpoint) -> Self {
        Self {
            node_id,
            listen_addr,
            quorum_size: DEFAULT_QUORUM_SIZE,
            min_protocol_version: default_min_protocol_version(),
        }
    }

    /// Load configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quorum_size == 0 {
            return Err(ConfigError::InvalidFormat(
                "quorum_size must be at least 1".to_string(),
            ));
        }

        if self.listen_addr.port == 0 {
            return Err(ConfigError::InvalidFormat(
                "listen_addr needs an explicit port".to_string(),
            ));
        }

        // A wildcard address never equals a registered endpoint
        if self.listen_addr.ip.is_unspecified() {
            return Err(ConfigError::InvalidFormat(format!(
                "listen_addr must be the public address, got {}",
                self.listen_addr.ip
            )));
        }

        Ok(())
    }
}
