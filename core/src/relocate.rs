//! Drag-to-move of a single port, between hosts or within one host.

use portall_common::error::EngineError;
use portall_common::model::discovery::CanonicalPort;
use portall_common::model::host::{HostId, OperationKind, Ticket};
use portall_common::model::port::{PortKey, PortState};
use portall_common::notify::RelocationHooks;
use portall_common::warn;
use tracing::{Instrument, debug, info_span};

use crate::engine::{Engine, EngineState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocateRequest {
    pub port: PortKey,
    pub source: HostId,
    pub target: HostId,
    /// Drop index in the target's list. `None` appends; larger values clamp.
    pub position: Option<usize>,
}

impl RelocateRequest {
    pub fn new(port: PortKey, source: impl Into<HostId>, target: impl Into<HostId>) -> Self {
        Self {
            port,
            source: source.into(),
            target: target.into(),
            position: None,
        }
    }

    pub fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    fn hosts(&self) -> Vec<HostId> {
        if self.source == self.target {
            vec![self.source.clone()]
        } else {
            vec![self.source.clone(), self.target.clone()]
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelocateOutcome {
    /// Dropped onto its own position; nothing was sent.
    Unchanged,
    Committed(CanonicalPort),
    /// The response arrived for a ticket that was already released.
    Discarded,
}

pub enum Relocation {
    Unchanged,
    Pending(PendingRelocation),
}

/// A relocation whose optimistic local change is applied and whose remote
/// request has not been issued yet. Dropping it before it settles rolls the
/// change back and releases its hosts.
#[must_use = "a pending relocation is rolled back when dropped unsettled"]
pub struct PendingRelocation {
    engine: Engine,
    ticket: Ticket,
    request: RelocateRequest,
}

impl Engine {
    /// Moves a port and waits for the authority to settle the move.
    pub async fn relocate(
        &self,
        request: RelocateRequest,
        hooks: &dyn RelocationHooks,
    ) -> Result<RelocateOutcome, EngineError> {
        match self.begin_relocate(request, hooks)? {
            Relocation::Unchanged => Ok(RelocateOutcome::Unchanged),
            Relocation::Pending(pending) => pending.settle(hooks).await,
        }
    }

    /// Validates, locks, snapshots and applies the move locally.
    ///
    /// On any local failure the user is notified, `hooks.cancel_drop()` runs and
    /// nothing is left locked.
    pub fn begin_relocate(
        &self,
        request: RelocateRequest,
        hooks: &dyn RelocationHooks,
    ) -> Result<Relocation, EngineError> {
        let _span = info_span!(
            "relocate",
            port = %request.port,
            source = %request.source,
            target = %request.target
        )
        .entered();

        let staged = {
            let mut state = self.state();
            stage(&mut state, &request)
        };

        match staged {
            Ok(None) => {
                debug!("port dropped onto its own position");
                Ok(Relocation::Unchanged)
            }
            Ok(Some(ticket)) => {
                debug!(%ticket, "relocation staged");
                self.changed(&request.hosts());
                Ok(Relocation::Pending(PendingRelocation {
                    engine: self.clone(),
                    ticket,
                    request,
                }))
            }
            Err(e) => {
                let message = match &e {
                    EngineError::Busy => "Operation in progress, try again shortly".to_string(),
                    other => format!("Error moving port: {other}"),
                };
                self.notify_error(&message);
                hooks.cancel_drop();
                Err(e)
            }
        }
    }
}

impl PendingRelocation {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub fn request(&self) -> &RelocateRequest {
        &self.request
    }

    /// Issues the single remote request and commits or rolls back on its
    /// result. No retry: a failure is terminal for this attempt.
    pub async fn settle(self, hooks: &dyn RelocationHooks) -> Result<RelocateOutcome, EngineError> {
        let span = info_span!("relocate", ticket = %self.ticket, port = %self.request.port);
        self.settle_inner(hooks).instrument(span).await
    }

    async fn settle_inner(
        self,
        hooks: &dyn RelocationHooks,
    ) -> Result<RelocateOutcome, EngineError> {
        let engine = &self.engine;
        let ticket = self.ticket;
        let request = &self.request;

        let response = engine
            .authority()
            .request_relocate(request.port, &request.source, &request.target)
            .await;

        let settled = {
            let mut state = engine.state();
            if state.registry.is_stale(ticket) {
                debug!("dropping response for released ticket");
                return Ok(RelocateOutcome::Discarded);
            }
            match response {
                Ok(canonical) => {
                    adopt_canonical(&mut state, request, &canonical);
                    state.commit(ticket);
                    Ok(canonical)
                }
                Err(e) => {
                    state.rollback(ticket);
                    Err(EngineError::from(e))
                }
            }
        };

        let hosts = request.hosts();
        engine.changed(&hosts);

        let result = match settled {
            Ok(canonical) => {
                engine.notify_success(&format!(
                    "Port {} moved to {}",
                    request.port, request.target
                ));
                hooks.on_success(&canonical);
                Ok(RelocateOutcome::Committed(canonical))
            }
            Err(e) => {
                engine.notify_error(&format!("Error moving port: {e}"));
                hooks.cancel_drop();
                Err(e)
            }
        };

        engine.flush_deferred(&hosts).await;
        result
    }
}

impl Drop for PendingRelocation {
    fn drop(&mut self) {
        self.engine.abandon(self.ticket, None);
    }
}

/// Runs steps 1-4 under the state lock. `Ok(None)` is the no-op drop.
fn stage(
    state: &mut EngineState,
    request: &RelocateRequest,
) -> Result<Option<Ticket>, EngineError> {
    if is_same_slot(state, request) {
        return Ok(None);
    }

    let hosts = request.hosts();
    let ticket = state
        .acquire(&hosts, OperationKind::Relocate)
        .map_err(|busy| {
            debug!(host = %busy.host, holder = %busy.holder, kind = %busy.kind, "host is locked");
            EngineError::Busy
        })?;

    if let Err(e) = validate(state, request) {
        state.release(ticket);
        return Err(e);
    }

    let handle = state.snapshots.capture(&state.hosts, &hosts);
    state.registry.attach_snapshot(ticket, handle);

    if let Err(e) = apply_move(state, request) {
        state.rollback(ticket);
        return Err(e);
    }

    Ok(Some(ticket))
}

fn is_same_slot(state: &EngineState, request: &RelocateRequest) -> bool {
    if request.source != request.target {
        return false;
    }
    let Some(host) = state.hosts.get(&request.source) else {
        return false;
    };
    let Some(current) = host.index_of(request.port) else {
        return false;
    };
    let last = host.ports.len() - 1;
    request.position.unwrap_or(last).min(last) == current
}

fn validate(state: &EngineState, request: &RelocateRequest) -> Result<(), EngineError> {
    let source = state
        .hosts
        .get(&request.source)
        .ok_or_else(|| EngineError::UnknownHost(request.source.clone()))?;

    if !source.contains(request.port) {
        return Err(EngineError::UnknownPort {
            host: request.source.clone(),
            port: request.port,
        });
    }

    let target = state
        .hosts
        .get(&request.target)
        .ok_or_else(|| EngineError::UnknownHost(request.target.clone()))?;

    if request.source != request.target && target.contains(request.port) {
        return Err(EngineError::Duplicate {
            host: request.target.clone(),
            port: request.port,
        });
    }

    Ok(())
}

/// Detaches the port from its source and inserts it into the target at the
/// drop position, leaving both lists densely numbered.
fn apply_move(state: &mut EngineState, request: &RelocateRequest) -> Result<(), EngineError> {
    let unknown_port = || EngineError::UnknownPort {
        host: request.source.clone(),
        port: request.port,
    };

    let source = state
        .hosts
        .get_mut(&request.source)
        .ok_or_else(|| EngineError::UnknownHost(request.source.clone()))?;
    let idx = source.index_of(request.port).ok_or_else(unknown_port)?;
    let mut moved = source.ports.remove(idx);
    source.renumber();
    moved.state = PortState::PendingRelocate;

    let target = state
        .hosts
        .get_mut(&request.target)
        .ok_or_else(|| EngineError::UnknownHost(request.target.clone()))?;
    let dest = request
        .position
        .unwrap_or(target.ports.len())
        .min(target.ports.len());
    target.ports.insert(dest, moved);
    target.renumber();

    Ok(())
}

/// Marks the moved port committed and takes the authority's description. The
/// number and protocol are only taken over when they would not collide.
fn adopt_canonical(state: &mut EngineState, request: &RelocateRequest, canonical: &CanonicalPort) {
    let Some(target) = state.hosts.get_mut(&request.target) else {
        return;
    };

    let collides = canonical.key() != request.port && target.contains(canonical.key());
    if collides {
        warn!(
            "Authority reported {} for moved port {}, keeping local key",
            canonical.key(),
            request.port
        );
    }

    if let Some(port) = target.find_mut(request.port) {
        port.state = PortState::Committed;
        if !canonical.description.is_empty() {
            port.description = canonical.description.clone();
        }
        if !collides {
            port.number = canonical.number;
            port.protocol = canonical.protocol;
        }
    }
}
