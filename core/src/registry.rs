//! Ticket-keyed lock table.
//!
//! Mutual exclusion here spans await points on a single logical thread, so it
//! is modelled as data (which ticket holds which host) rather than with a
//! blocking primitive. Nothing ever waits on a lock: a contended acquire
//! returns [`Busy`] immediately.

use std::collections::{BTreeSet, HashMap};

use portall_common::model::host::{HostId, HostLock, OperationKind, Ticket};

use crate::snapshot::SnapshotHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    pub kind: OperationKind,
    pub hosts: BTreeSet<HostId>,
    pub snapshot: Option<SnapshotHandle>,
}

/// Acquisition failed because `host` is held by `holder`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Busy {
    pub host: HostId,
    pub holder: Ticket,
    pub kind: OperationKind,
}

#[derive(Debug, Default)]
pub struct PendingRegistry {
    next_ticket: u64,
    locks: HashMap<HostId, Ticket>,
    active: HashMap<Ticket, PendingOperation>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks every listed host for a new ticket, or none of them. A host named
    /// more than once is locked once.
    pub fn try_acquire(&mut self, hosts: &[HostId], kind: OperationKind) -> Result<Ticket, Busy> {
        if let Some(busy) = hosts.iter().find_map(|host| self.holder_of(host)) {
            return Err(busy);
        }

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;

        let hosts: BTreeSet<HostId> = hosts.iter().cloned().collect();
        for host in &hosts {
            self.locks.insert(host.clone(), ticket);
        }
        self.active.insert(
            ticket,
            PendingOperation {
                kind,
                hosts,
                snapshot: None,
            },
        );

        Ok(ticket)
    }

    pub fn attach_snapshot(&mut self, ticket: Ticket, handle: SnapshotHandle) {
        if let Some(op) = self.active.get_mut(&ticket) {
            op.snapshot = Some(handle);
        }
    }

    /// Unlocks exactly the hosts `ticket` locked and hands back its record.
    /// Releasing an already released ticket is a no-op returning `None`.
    pub fn release(&mut self, ticket: Ticket) -> Option<PendingOperation> {
        let op = self.active.remove(&ticket)?;
        for host in &op.hosts {
            if self.locks.get(host) == Some(&ticket) {
                self.locks.remove(host);
            }
        }
        Some(op)
    }

    /// A ticket is stale once released, whether by settlement, cancellation or
    /// a reload. Responses carrying a stale ticket are dropped.
    pub fn is_stale(&self, ticket: Ticket) -> bool {
        !self.active.contains_key(&ticket)
    }

    pub fn operation(&self, ticket: Ticket) -> Option<&PendingOperation> {
        self.active.get(&ticket)
    }

    pub fn lock_of(&self, host: &HostId) -> HostLock {
        match self.holder_of(host) {
            Some(busy) => HostLock::Locked {
                kind: busy.kind,
                ticket: busy.holder,
            },
            None => HostLock::Unlocked,
        }
    }

    pub fn is_locked(&self, host: &HostId) -> bool {
        self.locks.contains_key(host)
    }

    pub fn pending_count(&self) -> usize {
        self.active.len()
    }

    /// Forgets every operation. Ticket numbering keeps increasing so tickets
    /// issued before the reset stay stale.
    pub fn clear(&mut self) {
        self.locks.clear();
        self.active.clear();
    }

    fn holder_of(&self, host: &HostId) -> Option<Busy> {
        let ticket = self.locks.get(host)?;
        let op = self.active.get(ticket)?;
        Some(Busy {
            host: host.clone(),
            holder: *ticket,
            kind: op.kind,
        })
    }
}
