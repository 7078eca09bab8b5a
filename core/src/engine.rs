//! # Relocation & Order-Reconciliation Engine
//!
//! Keeps a client-held host→ports view consistent with the remote authority
//! while mutations are in flight.
//!
//! Every entry point follows the same shape:
//! 1. take the state mutex, acquire host locks from the [`PendingRegistry`],
//!    snapshot, mutate optimistically, release the mutex;
//! 2. await exactly one call on the [`RemoteAuthority`];
//! 3. take the mutex again and either commit (discard snapshot) or roll back
//!    (restore snapshot), then release the locks and notify.
//!
//! The state mutex is never held across an await point, so operations on
//! disjoint hosts interleave freely while each host sees at most one
//! pending operation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use portall_common::authority::RemoteAuthority;
use portall_common::config::EngineConfig;
use portall_common::error::EngineError;
use portall_common::model::host::{HostGroup, HostId, HostLock, OperationKind, Ticket};
use portall_common::model::port::PortState;
use portall_common::notify::{Notifier, NotifyKind};
use portall_common::{info, warn};
use tracing::debug;

use crate::collection::HostCollection;
use crate::merge::DeferredMerges;
use crate::registry::{Busy, PendingOperation, PendingRegistry};
use crate::snapshot::SnapshotStore;

#[derive(Debug, Default)]
pub(crate) struct EngineState {
    pub(crate) hosts: HostCollection,
    pub(crate) registry: PendingRegistry,
    pub(crate) snapshots: SnapshotStore,
    pub(crate) deferred: DeferredMerges,
}

impl EngineState {
    pub(crate) fn acquire(&mut self, ids: &[HostId], kind: OperationKind) -> Result<Ticket, Busy> {
        let ticket = self.registry.try_acquire(ids, kind)?;
        self.sync_locks(ids.iter());
        Ok(ticket)
    }

    /// Releases `ticket` without touching port data.
    pub(crate) fn release(&mut self, ticket: Ticket) -> Option<PendingOperation> {
        let op = self.registry.release(ticket)?;
        self.sync_locks(op.hosts.iter());
        Some(op)
    }

    /// Keeps the optimistic mutation: drops the snapshot and unlocks.
    pub(crate) fn commit(&mut self, ticket: Ticket) -> Option<PendingOperation> {
        let op = self.release(ticket)?;
        if let Some(handle) = op.snapshot {
            self.snapshots.discard(handle);
        }
        Some(op)
    }

    /// Restores the pre-operation port lists and unlocks.
    pub(crate) fn rollback(&mut self, ticket: Ticket) -> Option<PendingOperation> {
        let op = self.release(ticket)?;
        if let Some(handle) = op.snapshot {
            self.snapshots.restore(handle, &mut self.hosts);
        }
        Some(op)
    }

    fn sync_locks<'a>(&mut self, ids: impl Iterator<Item = &'a HostId>) {
        for id in ids {
            let lock = self.registry.lock_of(id);
            if let Some(host) = self.hosts.get_mut(id) {
                host.lock = lock;
            }
        }
    }

    fn reset(&mut self, hosts: Vec<HostGroup>) {
        self.registry.clear();
        self.snapshots.clear();
        self.deferred.clear();
        self.hosts = hosts
            .into_iter()
            .map(|mut host| {
                host.lock = HostLock::Unlocked;
                for port in host.ports.iter_mut() {
                    port.state = PortState::Committed;
                }
                host.renumber();
                host
            })
            .collect();
    }
}

struct Inner {
    state: Mutex<EngineState>,
    authority: Arc<dyn RemoteAuthority>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
}

/// Cloneable handle to one engine instance.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    pub fn new(
        authority: Arc<dyn RemoteAuthority>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(EngineState::default()),
                authority,
                notifier,
                config,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Replaces the whole view. Every pending operation, snapshot and deferred
    /// merge is forgotten; late responses for them are dropped as stale.
    pub fn load(&self, hosts: Vec<HostGroup>) {
        let ids: Vec<HostId> = {
            let mut state = self.state();
            state.reset(hosts);
            state.hosts.iter().map(|h| h.id.clone()).collect()
        };
        debug!(hosts = ids.len(), "collection loaded");
        self.changed(&ids);
    }

    /// Re-derives the view from the authority.
    pub async fn reload(&self) -> Result<usize, EngineError> {
        match self.authority().fetch_collection().await {
            Ok(hosts) => {
                let count = hosts.len();
                self.load(hosts);
                info!("Loaded {count} hosts from the authority");
                Ok(count)
            }
            Err(e) => {
                self.notify_error(&format!("Error loading hosts: {e}"));
                Err(e.into())
            }
        }
    }

    pub fn hosts(&self) -> Vec<HostGroup> {
        self.state().hosts.iter().cloned().collect()
    }

    pub fn host(&self, id: &HostId) -> Option<HostGroup> {
        self.state().hosts.get(id).cloned()
    }

    pub fn is_locked(&self, id: &HostId) -> bool {
        self.state().registry.is_locked(id)
    }

    pub fn pending_count(&self) -> usize {
        self.state().registry.pending_count()
    }

    /// Patch hook for explicit host creation or replacement.
    pub fn insert_host(&self, mut host: HostGroup) -> Result<(), EngineError> {
        {
            let mut state = self.state();
            if state.registry.is_locked(&host.id) {
                return Err(EngineError::Busy);
            }
            host.lock = HostLock::Unlocked;
            host.renumber();
            state.hosts.insert(host.clone());
        }
        self.changed(&[host.id]);
        Ok(())
    }

    /// Patch hook for explicit host deletion.
    pub fn remove_host(&self, id: &HostId) -> Result<Option<HostGroup>, EngineError> {
        let removed = {
            let mut state = self.state();
            if state.registry.is_locked(id) {
                return Err(EngineError::Busy);
            }
            state.hosts.remove(id)
        };
        self.changed(std::slice::from_ref(id));
        Ok(removed)
    }

    pub fn set_nickname(&self, id: &HostId, nickname: Option<String>) -> Result<(), EngineError> {
        {
            let mut state = self.state();
            if state.registry.is_locked(id) {
                return Err(EngineError::Busy);
            }
            let host = state
                .hosts
                .get_mut(id)
                .ok_or_else(|| EngineError::UnknownHost(id.clone()))?;
            host.nickname = nickname;
        }
        self.changed(std::slice::from_ref(id));
        Ok(())
    }

    /// Cancellation hint for an in-flight relocation or reorder.
    ///
    /// Rolls the optimistic change back and marks the ticket stale so the
    /// eventual response is dropped on arrival. The remote call itself is not
    /// aborted. Returns `false` when the ticket already settled or belongs to
    /// a discovery merge.
    pub async fn cancel(&self, ticket: Ticket) -> bool {
        let released = {
            let mut state = self.state();
            match state.registry.operation(ticket).map(|op| op.kind) {
                Some(OperationKind::Relocate) | Some(OperationKind::Reorder) => {}
                _ => return false,
            }
            match state.rollback(ticket) {
                Some(op) => op.hosts.into_iter().collect::<Vec<HostId>>(),
                None => return false,
            }
        };

        warn!("Operation {ticket} cancelled, local changes rolled back");
        self.changed(&released);
        self.flush_deferred(&released).await;
        true
    }

    /// Rolls back an operation whose future went away before it settled.
    /// Discovery adds still in flight are pruned, and `created` is removed
    /// again if nothing settled on it. A ticket that already settled is left
    /// alone.
    pub(crate) fn abandon(&self, ticket: Ticket, created: Option<&HostId>) {
        let released: Vec<HostId> = {
            let mut state = self.state();
            let Some(op) = state.rollback(ticket) else {
                return;
            };
            if op.kind == OperationKind::DiscoveryMerge {
                for id in &op.hosts {
                    if let Some(group) = state.hosts.get_mut(id) {
                        group.ports.retain(|p| p.state == PortState::Committed);
                        group.renumber();
                    }
                }
                if let Some(id) = created {
                    if state.hosts.get(id).is_some_and(|h| h.ports.is_empty()) {
                        state.hosts.remove(id);
                    }
                }
            }
            op.hosts.into_iter().collect()
        };

        warn!("Operation {ticket} abandoned before it settled, local changes rolled back");
        self.changed(&released);
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, EngineState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn authority(&self) -> &dyn RemoteAuthority {
        self.inner.authority.as_ref()
    }

    pub(crate) fn notify_success(&self, message: &str) {
        self.inner.notifier.notify(message, NotifyKind::Success);
    }

    pub(crate) fn notify_error(&self, message: &str) {
        self.inner.notifier.notify(message, NotifyKind::Error);
    }

    pub(crate) fn changed(&self, hosts: &[HostId]) {
        if !hosts.is_empty() {
            self.inner.notifier.hosts_changed(hosts);
        }
    }
}

/// Hands a ticket back to [`Engine::abandon`] when the future awaiting its
/// remote call is dropped, e.g. by a timeout or an aborted task.
pub(crate) struct OperationGuard<'a> {
    engine: &'a Engine,
    ticket: Ticket,
    created: Option<HostId>,
}

impl<'a> OperationGuard<'a> {
    pub(crate) fn new(engine: &'a Engine, ticket: Ticket) -> Self {
        Self {
            engine,
            ticket,
            created: None,
        }
    }

    /// Marks `host` as created by this operation.
    pub(crate) fn created(mut self, host: HostId) -> Self {
        self.created = Some(host);
        self
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.engine.abandon(self.ticket, self.created.as_ref());
    }
}
