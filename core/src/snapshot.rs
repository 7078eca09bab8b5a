//! Pre-mutation copies of host port lists.
//!
//! A snapshot covers only the hosts an operation touches, so capturing and
//! restoring cost is proportional to those hosts, not to the collection.

use std::collections::HashMap;

use portall_common::model::host::HostId;
use portall_common::model::port::{PortAssignment, PortState};

use crate::collection::HostCollection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotHandle(u64);

#[derive(Debug, Default)]
pub struct SnapshotStore {
    next_id: u64,
    saved: HashMap<SnapshotHandle, Vec<(HostId, Vec<PortAssignment>)>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deep-copies the port list of every named host. Unknown ids are skipped
    /// and an id listed twice is captured once.
    pub fn capture(&mut self, hosts: &HostCollection, ids: &[HostId]) -> SnapshotHandle {
        let handle = SnapshotHandle(self.next_id);
        self.next_id += 1;

        let mut copies: Vec<(HostId, Vec<PortAssignment>)> = Vec::with_capacity(ids.len());
        for id in ids {
            if copies.iter().any(|(captured, _)| captured == id) {
                continue;
            }
            if let Some(host) = hosts.get(id) {
                copies.push((id.clone(), host.ports.clone()));
            }
        }

        self.saved.insert(handle, copies);
        handle
    }

    /// Puts the captured port lists back and consumes the snapshot. Every
    /// restored port ends up `Committed`. Returns the hosts that were restored;
    /// a host deleted since capture is not recreated.
    pub fn restore(&mut self, handle: SnapshotHandle, hosts: &mut HostCollection) -> Vec<HostId> {
        let Some(copies) = self.saved.remove(&handle) else {
            return Vec::new();
        };

        let mut restored = Vec::with_capacity(copies.len());
        for (id, mut ports) in copies {
            let Some(host) = hosts.get_mut(&id) else {
                continue;
            };
            for port in ports.iter_mut() {
                port.state = PortState::Committed;
            }
            host.ports = ports;
            restored.push(id);
        }
        restored
    }

    pub fn discard(&mut self, handle: SnapshotHandle) {
        self.saved.remove(&handle);
    }

    pub fn is_held(&self, handle: SnapshotHandle) -> bool {
        self.saved.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.saved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }

    pub fn clear(&mut self) {
        self.saved.clear();
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
