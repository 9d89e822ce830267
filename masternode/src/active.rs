//! Local masternode eligibility
//!
//! The node is `Started` only while the registry holds a record for its
//! own identity announcing the endpoint it is actually bound to.

use crate::types::{MasternodeId, MasternodeRecord, NetworkEndpoint};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Function selector of the registry contract's `register` call
const REGISTER_SELECTOR: [u8; 4] = [0x4d, 0xa2, 0x74, 0xfd];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActiveState {
    NotCapable,
    Started,
}

impl std::fmt::Display for ActiveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotCapable => write!(f, "NotCapable"),
            Self::Started => write!(f, "Started"),
        }
    }
}

pub struct ActiveMasternode {
    id: MasternodeId,
    endpoint: NetworkEndpoint,
    state: RwLock<ActiveState>,
}

impl ActiveMasternode {
    pub fn new(id: MasternodeId, endpoint: NetworkEndpoint) -> Self {
        Self {
            id,
            endpoint,
            state: RwLock::new(ActiveState::NotCapable),
        }
    }

    pub fn id(&self) -> &MasternodeId {
        &self.id
    }

    pub fn endpoint(&self) -> &NetworkEndpoint {
        &self.endpoint
    }

    pub fn state(&self) -> ActiveState {
        *self.state.read()
    }

    pub fn is_started(&self) -> bool {
        self.state() == ActiveState::Started
    }

    /// Recompute the state from the registry's record for our identity
    pub fn update(&self, record: Option<&MasternodeRecord>) -> ActiveState {
        let state = match record {
            None => ActiveState::NotCapable,
            Some(record) if record.endpoint.port != self.endpoint.port => {
                log::error!(
                    "updateActiveMasternode: port {} registered, bound to {}",
                    record.endpoint.port,
                    self.endpoint.port
                );
                ActiveState::NotCapable
            }
            Some(record) if !record.endpoint.matches(&self.endpoint) => {
                log::error!(
                    "updateActiveMasternode: IP {} registered, bound to {}",
                    record.endpoint.ip,
                    self.endpoint.ip
                );
                ActiveState::NotCapable
            }
            Some(_) => ActiveState::Started,
        };

        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            log::info!("🔄 Active masternode {}: {} -> {}", self.id.short(), previous, state);
        }
        state
    }

    /// Contract call data that registers this node at its bound endpoint:
    /// selector, identity, then a 32-byte word holding a version byte, the
    /// 16-byte IP and the big-endian port.
    pub fn registration_call_data(&self) -> String {
        let mut misc = [0u8; 32];
        misc[0] = 1;
        let ip = match self.endpoint.ip {
            IpAddr::V4(v4) => v4.to_ipv6_mapped(),
            IpAddr::V6(v6) => v6,
        };
        misc[1..17].copy_from_slice(&ip.octets());
        misc[17..19].copy_from_slice(&self.endpoint.port.to_be_bytes());

        let mut data = Vec::with_capacity(4 + 32 + 32);
        data.extend_from_slice(&REGISTER_SELECTOR);
        data.extend_from_slice(self.id.as_bytes());
        data.extend_from_slice(&misc);
        format!("0x{}", hex::encode(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active() -> ActiveMasternode {
        ActiveMasternode::new(
            MasternodeId::from_bytes([1; 32]),
            "192.168.1.10:30303".parse().unwrap(),
        )
    }

    fn registered(endpoint: &str) -> MasternodeRecord {
        MasternodeRecord::new(MasternodeId::from_bytes([1; 32]), endpoint.parse().unwrap(), 10, 1)
    }

    #[test]
    fn test_initial_state() {
        assert_eq!(active().state(), ActiveState::NotCapable);
    }

    #[test]
    fn test_absent_is_not_capable() {
        let node = active();
        assert_eq!(node.update(None), ActiveState::NotCapable);
    }

    #[test]
    fn test_matching_endpoint_starts() {
        let node = active();
        assert_eq!(node.update(Some(&registered("192.168.1.10:30303"))), ActiveState::Started);
        assert!(node.is_started());
    }

    #[test]
    fn test_port_mismatch() {
        let node = active();
        assert_eq!(node.update(Some(&registered("192.168.1.10:30304"))), ActiveState::NotCapable);
    }

    #[test]
    fn test_ip_mismatch() {
        let node = active();
        assert_eq!(node.update(Some(&registered("192.168.1.11:30303"))), ActiveState::NotCapable);
    }

    #[test]
    fn test_update_is_idempotent() {
        let node = active();
        let record = registered("192.168.1.10:30303");
        let first = node.update(Some(&record));
        let second = node.update(Some(&record));
        assert_eq!(first, second);
        assert_eq!(node.state(), ActiveState::Started);
    }

    #[test]
    fn test_quit_demotes() {
        let node = active();
        node.update(Some(&registered("192.168.1.10:30303")));
        assert_eq!(node.update(None), ActiveState::NotCapable);
    }

    #[test]
    fn test_registration_call_data() {
        let data = active().registration_call_data();
        assert!(data.starts_with("0x4da274fd"));
        // 0x + (4 + 32 + 32) bytes
        assert_eq!(data.len(), 2 + 68 * 2);

        let bytes = hex::decode(&data[2..]).unwrap();
        let misc = &bytes[36..];
        assert_eq!(misc[0], 1);
        assert_eq!(&misc[13..17], &[192, 168, 1, 10]);
        assert_eq!(u16::from_be_bytes([misc[17], misc[18]]), 30303);
    }
}
