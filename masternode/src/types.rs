//! Masternode type definitions

use crate::error::{MasternodeError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// Length in bytes of a masternode identity and of a block hash
pub const HASH_LENGTH: usize = 32;

fn decode_hash(kind: &str, input: &str) -> Result<[u8; HASH_LENGTH]> {
    let trimmed = input.strip_prefix("0x").unwrap_or(input);
    let bytes = hex::decode(trimmed)
        .map_err(|e| MasternodeError::InvalidInput(format!("{} is not hex: {}", kind, e)))?;
    hash_from_slice(kind, &bytes)
}

pub(crate) fn hash_from_slice(kind: &str, bytes: &[u8]) -> Result<[u8; HASH_LENGTH]> {
    bytes.try_into().map_err(|_| {
        MasternodeError::InvalidInput(format!(
            "{} must be {} bytes, got {}",
            kind,
            HASH_LENGTH,
            bytes.len()
        ))
    })
}

/// Masternode identity, derived from the collateral owner's node key
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MasternodeId([u8; HASH_LENGTH]);

impl MasternodeId {
    pub const fn from_bytes(bytes: [u8; HASH_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        hash_from_slice("masternode id", bytes).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }

    /// Abbreviated form for log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for MasternodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for MasternodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasternodeId({})", self.short())
    }
}

impl FromStr for MasternodeId {
    type Err = MasternodeError;

    fn from_str(s: &str) -> Result<Self> {
        decode_hash("masternode id", s).map(Self)
    }
}

impl Serialize for MasternodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MasternodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Hash of the block that seeds scoring
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockHash([u8; HASH_LENGTH]);

impl BlockHash {
    pub const fn from_bytes(bytes: [u8; HASH_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        hash_from_slice("block hash", bytes).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", hex::encode(&self.0[..4]))
    }
}

impl FromStr for BlockHash {
    type Err = MasternodeError;

    fn from_str(s: &str) -> Result<Self> {
        decode_hash("block hash", s).map(Self)
    }
}

impl Serialize for BlockHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for BlockHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// IP address and TCP port a masternode claims to serve on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkEndpoint {
    pub ip: IpAddr,
    pub port: u16,
}

impl NetworkEndpoint {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Endpoint equality as seen on the wire: an IPv4 address equals its
    /// IPv4-mapped IPv6 form.
    pub fn matches(&self, other: &NetworkEndpoint) -> bool {
        self.port == other.port && canonical_ip(self.ip) == canonical_ip(other.ip)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}

impl From<SocketAddr> for NetworkEndpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

impl fmt::Display for NetworkEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

impl FromStr for NetworkEndpoint {
    type Err = MasternodeError;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<SocketAddr>()
            .map(Self::from)
            .map_err(|_| MasternodeError::InvalidInput(format!("Invalid IP:port format: {}", s)))
    }
}

impl Serialize for NetworkEndpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for NetworkEndpoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A registered masternode as announced by the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasternodeRecord {
    pub id: MasternodeId,
    pub endpoint: NetworkEndpoint,
    /// Block height of registration; lower is more senior
    pub join_height: u64,
    pub protocol_version: u32,
}

impl MasternodeRecord {
    pub fn new(
        id: MasternodeId,
        endpoint: NetworkEndpoint,
        join_height: u64,
        protocol_version: u32,
    ) -> Self {
        Self {
            id,
            endpoint,
            join_height,
            protocol_version,
        }
    }
}

/// Instant-send lock vote cast by a quorum member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockVote {
    pub voter: MasternodeId,
    pub block_hash: BlockHash,
    pub tx_hash: BlockHash,
}

/// Vote naming the masternode to be paid for a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentVote {
    pub voter: MasternodeId,
    pub block_hash: BlockHash,
    pub payee: MasternodeId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_id_hex_roundtrip() {
        let id = MasternodeId::from_bytes([0xab; 32]);
        let parsed: MasternodeId = format!("0x{}", id).parse().unwrap();
        assert_eq!(parsed, id);
        assert_eq!(id.short(), "abababab");
    }

    #[test]
    fn test_wrong_length_rejected() {
        let err = MasternodeId::from_slice(&[1u8; 20]).unwrap_err();
        assert!(matches!(err, MasternodeError::InvalidInput(_)));
        assert!("abcd".parse::<BlockHash>().is_err());
        assert!("zz".parse::<BlockHash>().is_err());
    }

    #[test]
    fn test_endpoint_parse() {
        let ep: NetworkEndpoint = "192.168.1.100:24000".parse().unwrap();
        assert_eq!(ep.port, 24000);
        assert_eq!(ep.ip, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 100)));
        assert!("192.168.1.100".parse::<NetworkEndpoint>().is_err());
    }

    #[test]
    fn test_endpoint_matches_mapped_ipv4() {
        let v4 = NetworkEndpoint::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 30303);
        let mapped = NetworkEndpoint::new(
            IpAddr::V6(Ipv4Addr::new(10, 0, 0, 1).to_ipv6_mapped()),
            30303,
        );
        assert!(v4.matches(&mapped));
        assert!(!v4.matches(&NetworkEndpoint::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 30303)));
        assert!(!v4.matches(&NetworkEndpoint::new(v4.ip, 30304)));
    }

    #[test]
    fn test_record_json() {
        let record = MasternodeRecord::new(
            MasternodeId::from_bytes([7; 32]),
            "127.0.0.1:9000".parse().unwrap(),
            42,
            1,
        );
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"endpoint\":\"127.0.0.1:9000\""));
        let back: MasternodeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
