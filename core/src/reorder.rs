use std::collections::HashSet;

use portall_common::error;
use portall_common::error::EngineError;
use portall_common::model::host::{HostGroup, HostId, OperationKind, Ticket};
use portall_common::model::port::{PortKey, PortState};
use tracing::{Instrument, debug, info_span};

use crate::engine::{Engine, EngineState, OperationGuard};

impl Engine {
    /// Persists a new port order for one host.
    ///
    /// `order` must be a permutation of the host's current ports. Anything else
    /// is a caller defect: it is logged and returned as
    /// [`EngineError::ContractViolation`] without notifying the user.
    pub async fn reorder(&self, host: &HostId, order: &[PortKey]) -> Result<(), EngineError> {
        let span = info_span!("reorder", host = %host, ports = order.len());
        self.reorder_inner(host, order).instrument(span).await
    }

    async fn reorder_inner(&self, host: &HostId, order: &[PortKey]) -> Result<(), EngineError> {
        let staged = {
            let mut state = self.state();
            stage(&mut state, host, order)
        };

        let ticket = match staged {
            Ok(ticket) => ticket,
            Err(EngineError::ContractViolation(msg)) => {
                error!("Rejected reorder for {host}: {msg}");
                return Err(EngineError::ContractViolation(msg));
            }
            Err(EngineError::Busy) => {
                self.notify_error("Operation in progress, try again shortly");
                return Err(EngineError::Busy);
            }
            Err(e) => {
                self.notify_error(&format!("Error updating port order: {e}"));
                return Err(e);
            }
        };
        debug!(%ticket, "reorder staged");
        let _guard = OperationGuard::new(self, ticket);
        self.changed(std::slice::from_ref(host));

        let response = self.authority().request_reorder(host, order).await;

        let settled = {
            let mut state = self.state();
            if state.registry.is_stale(ticket) {
                debug!("dropping response for released ticket");
                return Ok(());
            }
            match response {
                Ok(()) => {
                    if let Some(group) = state.hosts.get_mut(host) {
                        for port in group.ports.iter_mut() {
                            port.state = PortState::Committed;
                        }
                    }
                    state.commit(ticket);
                    Ok(())
                }
                Err(e) => {
                    state.rollback(ticket);
                    Err(EngineError::from(e))
                }
            }
        };

        self.changed(std::slice::from_ref(host));
        match &settled {
            Ok(()) => self.notify_success("Port order updated"),
            Err(e) => self.notify_error(&format!("Error updating port order: {e}")),
        }

        self.flush_deferred(std::slice::from_ref(host)).await;
        settled
    }
}

fn stage(state: &mut EngineState, host: &HostId, order: &[PortKey]) -> Result<Ticket, EngineError> {
    if !state.hosts.contains(host) {
        return Err(EngineError::UnknownHost(host.clone()));
    }

    let ticket = state
        .acquire(std::slice::from_ref(host), OperationKind::Reorder)
        .map_err(|_| EngineError::Busy)?;

    let Some(group) = state.hosts.get(host) else {
        state.release(ticket);
        return Err(EngineError::UnknownHost(host.clone()));
    };
    if let Err(msg) = check_permutation(group, order) {
        state.release(ticket);
        return Err(EngineError::ContractViolation(msg));
    }

    let handle = state.snapshots.capture(&state.hosts, std::slice::from_ref(host));
    state.registry.attach_snapshot(ticket, handle);

    if let Some(group) = state.hosts.get_mut(host) {
        apply_order(group, order);
    }
    Ok(ticket)
}

fn check_permutation(group: &HostGroup, order: &[PortKey]) -> Result<(), String> {
    let current: HashSet<PortKey> = group.keys().into_iter().collect();
    let requested: HashSet<PortKey> = order.iter().copied().collect();

    if requested.len() != order.len() {
        return Err(format!("order for {} lists a port twice", group.id));
    }
    if current != requested {
        return Err(format!(
            "order for {} is not a permutation of its {} ports",
            group.id,
            current.len()
        ));
    }
    Ok(())
}

/// Sorts the ports by their index in `order` and renumbers them.
fn apply_order(group: &mut HostGroup, order: &[PortKey]) {
    group.ports.sort_by_key(|port| {
        order
            .iter()
            .position(|key| *key == port.key())
            .unwrap_or(usize::MAX)
    });
    for port in group.ports.iter_mut() {
        port.state = PortState::PendingReorder;
    }
    group.renumber();
}
