use std::collections::BTreeMap;

use portall_common::model::host::{HostGroup, HostId};

/// The live host→ports view. The only shared mutable resource in the engine.
#[derive(Debug, Default)]
pub struct HostCollection {
    hosts: BTreeMap<HostId, HostGroup>,
}

impl HostCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &HostId) -> Option<&HostGroup> {
        self.hosts.get(id)
    }

    pub fn get_mut(&mut self, id: &HostId) -> Option<&mut HostGroup> {
        self.hosts.get_mut(id)
    }

    pub fn contains(&self, id: &HostId) -> bool {
        self.hosts.contains_key(id)
    }

    /// Inserts or replaces the group stored under its own id.
    pub fn insert(&mut self, host: HostGroup) -> Option<HostGroup> {
        self.hosts.insert(host.id.clone(), host)
    }

    pub fn remove(&mut self, id: &HostId) -> Option<HostGroup> {
        self.hosts.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HostGroup> {
        self.hosts.values()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn clear(&mut self) {
        self.hosts.clear();
    }
}

impl FromIterator<HostGroup> for HostCollection {
    fn from_iter<I: IntoIterator<Item = HostGroup>>(iter: I) -> Self {
        let mut collection = Self::new();
        for host in iter {
            collection.insert(host);
        }
        collection
    }
}
