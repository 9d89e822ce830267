//! Masternode registry for tracking all masternodes

use crate::types::*;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub struct MasternodeRegistry {
    masternodes: HashMap<MasternodeId, MasternodeRecord>,
}

impl MasternodeRegistry {
    pub fn new() -> Self {
        MasternodeRegistry {
            masternodes: HashMap::new(),
        }
    }

    /// Insert or replace the record for `record.id`. A re-join overwrites
    /// the previous record entirely.
    pub fn join(&mut self, record: MasternodeRecord) -> Option<MasternodeRecord> {
        self.masternodes.insert(record.id, record)
    }

    /// Remove a masternode; unknown ids are ignored
    pub fn quit(&mut self, id: &MasternodeId) -> Option<MasternodeRecord> {
        self.masternodes.remove(id)
    }

    pub fn lookup(&self, id: &MasternodeId) -> Option<&MasternodeRecord> {
        self.masternodes.get(id)
    }

    pub fn contains(&self, id: &MasternodeId) -> bool {
        self.masternodes.contains_key(id)
    }

    /// Copy of every record, in no particular order
    pub fn all(&self) -> Vec<MasternodeRecord> {
        self.masternodes.values().cloned().collect()
    }

    pub fn size(&self) -> usize {
        self.masternodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masternodes.is_empty()
    }
}

impl Default for MasternodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Consistent copy of the registry taken under the read lock
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    records: Vec<MasternodeRecord>,
}

impl RegistrySnapshot {
    pub fn new(records: Vec<MasternodeRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[MasternodeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &MasternodeId) -> Option<&MasternodeRecord> {
        self.records.iter().find(|r| &r.id == id)
    }
}

impl FromIterator<MasternodeRecord> for RegistrySnapshot {
    fn from_iter<I: IntoIterator<Item = MasternodeRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Registry shared between the membership event loop (sole writer) and
/// any number of readers.
#[derive(Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<RwLock<MasternodeRegistry>>,
}

impl SharedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot::new(self.inner.read().all())
    }

    pub fn lookup(&self, id: &MasternodeId) -> Option<MasternodeRecord> {
        self.inner.read().lookup(id).cloned()
    }

    pub fn size(&self) -> usize {
        self.inner.read().size()
    }

    pub(crate) fn apply_join(&self, record: MasternodeRecord) -> Option<MasternodeRecord> {
        self.inner.write().join(record)
    }

    pub(crate) fn apply_quit(&self, id: &MasternodeId) -> Option<MasternodeRecord> {
        self.inner.write().quit(id)
    }

    /// Log the current set, most senior first
    pub fn describe(&self) {
        let mut records = self.snapshot().records;
        records.sort_by(|a, b| a.join_height.cmp(&b.join_height).then(a.id.cmp(&b.id)));

        log::info!("📋 Masternode registry: {} node(s)", records.len());
        for record in &records {
            log::info!(
                "   {} {} height={} proto={}",
                record.id.short(),
                record.endpoint,
                record.join_height,
                record.protocol_version
            );
        }
    }
}
