use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::port::{PortAssignment, PortKey, PortState};

/// The address a host group is keyed by (e.g. `10.0.0.5`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(String);

impl HostId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HostId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for HostId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Relocate,
    Reorder,
    DiscoveryMerge,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Relocate => f.write_str("relocate"),
            OperationKind::Reorder => f.write_str("reorder"),
            OperationKind::DiscoveryMerge => f.write_str("discovery merge"),
        }
    }
}

/// Correlates a remote response with the operation that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostLock {
    #[default]
    Unlocked,
    Locked { kind: OperationKind, ticket: Ticket },
}

impl HostLock {
    pub fn is_locked(&self) -> bool {
        matches!(self, HostLock::Locked { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostGroup {
    pub id: HostId,
    pub nickname: Option<String>,
    pub ports: Vec<PortAssignment>,
    pub lock: HostLock,
}

impl HostGroup {
    pub fn new(id: impl Into<HostId>) -> Self {
        Self {
            id: id.into(),
            nickname: None,
            ports: Vec::new(),
            lock: HostLock::Unlocked,
        }
    }

    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    /// Builds a group from ports in display order, assigning dense positions.
    pub fn with_ports(mut self, ports: impl IntoIterator<Item = PortAssignment>) -> Self {
        self.ports = ports.into_iter().collect();
        self.renumber();
        self
    }

    /// Label shown to the user: `address (nickname)` when a nickname is set.
    pub fn label(&self) -> String {
        match &self.nickname {
            Some(nick) if !nick.is_empty() => format!("{} ({})", self.id, nick),
            _ => self.id.to_string(),
        }
    }

    pub fn find(&self, key: PortKey) -> Option<&PortAssignment> {
        self.ports.iter().find(|p| p.key() == key)
    }

    pub fn find_mut(&mut self, key: PortKey) -> Option<&mut PortAssignment> {
        self.ports.iter_mut().find(|p| p.key() == key)
    }

    pub fn index_of(&self, key: PortKey) -> Option<usize> {
        self.ports.iter().position(|p| p.key() == key)
    }

    pub fn contains(&self, key: PortKey) -> bool {
        self.index_of(key).is_some()
    }

    pub fn keys(&self) -> Vec<PortKey> {
        self.ports.iter().map(PortAssignment::key).collect()
    }

    /// Rewrites every `position` to match the sequence index.
    pub fn renumber(&mut self) {
        for (idx, port) in self.ports.iter_mut().enumerate() {
            port.position = idx;
        }
    }

    pub fn is_dense(&self) -> bool {
        self.ports
            .iter()
            .enumerate()
            .all(|(idx, port)| port.position == idx)
    }

    pub fn has_duplicates(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.ports.len());
        !self.ports.iter().all(|p| seen.insert(p.key()))
    }

    /// True when nothing in the group references a pending operation.
    pub fn is_at_rest(&self) -> bool {
        !self.lock.is_locked() && self.ports.iter().all(|p| p.state == PortState::Committed)
    }
}
