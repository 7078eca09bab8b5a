//! Integration of externally discovered ports into the live collection.
//!
//! Unlike relocation and reorder, each discovered port becomes its own remote
//! record, so a batch can partially succeed: failed ports are pruned, their
//! siblings stay. Hosts held by another operation are not waited on; their
//! sub-batch is parked in [`DeferredMerges`] and retried when the holder
//! releases, up to [`EngineConfig::max_merge_deferrals`] times.
//!
//! [`EngineConfig::max_merge_deferrals`]: portall_common::config::EngineConfig

use std::collections::{BTreeMap, VecDeque};

use portall_common::error::AuthorityError;
use portall_common::model::discovery::DiscoveredPort;
use portall_common::model::host::{HostGroup, HostId, OperationKind, Ticket};
use portall_common::model::port::PortState;
use portall_common::warn;
use tracing::{Instrument, debug, info_span};

use crate::engine::{Engine, OperationGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeFailure {
    pub port: DiscoveredPort,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub added: usize,
    pub skipped_duplicates: usize,
    pub failed: Vec<MergeFailure>,
    /// Ports parked behind a locked host, still to be retried.
    pub deferred: usize,
    /// Ports given up on after too many deferrals.
    pub dropped: usize,
    pub created_hosts: Vec<HostId>,
}

impl MergeReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.dropped == 0
    }

    pub fn is_empty(&self) -> bool {
        self.added == 0
            && self.skipped_duplicates == 0
            && self.failed.is_empty()
            && self.deferred == 0
            && self.dropped == 0
    }

    fn absorb(&mut self, other: MergeReport) {
        self.added += other.added;
        self.skipped_duplicates += other.skipped_duplicates;
        self.failed.extend(other.failed);
        self.deferred += other.deferred;
        self.dropped += other.dropped;
        self.created_hosts.extend(other.created_hosts);
    }

    pub fn summary(&self) -> String {
        let mut parts = vec![format!("{} added", self.added)];
        if self.skipped_duplicates > 0 {
            parts.push(format!("{} duplicates skipped", self.skipped_duplicates));
        }
        if !self.failed.is_empty() {
            parts.push(format!("{} failed", self.failed.len()));
        }
        if self.deferred > 0 {
            parts.push(format!("{} deferred", self.deferred));
        }
        if self.dropped > 0 {
            parts.push(format!("{} dropped", self.dropped));
        }

        let head = if self.is_clean() {
            "Discovered ports merged"
        } else {
            "Discovered ports merged with errors"
        };
        format!("{head}: {}", parts.join(", "))
    }
}

#[derive(Debug)]
pub(crate) struct DeferredBatch {
    pub(crate) ports: Vec<DiscoveredPort>,
    /// Attempts of this batch that found its host locked.
    pub(crate) deferrals: u8,
}

/// Sub-batches waiting for a host lock, oldest first per host. Every batch
/// keeps its own deferral count.
#[derive(Debug, Default)]
pub(crate) struct DeferredMerges {
    queue: BTreeMap<HostId, VecDeque<DeferredBatch>>,
}

impl DeferredMerges {
    /// Parks `ports` after an attempt found `host` locked. `prior` is the
    /// count the batch already carries, zero for a fresh arrival. Returns the
    /// new count, or hands the ports back once it passes `cap`.
    pub(crate) fn defer(
        &mut self,
        host: HostId,
        ports: Vec<DiscoveredPort>,
        prior: u8,
        cap: u8,
    ) -> Result<u8, Vec<DiscoveredPort>> {
        let deferrals = prior.saturating_add(1);
        if deferrals > cap {
            return Err(ports);
        }
        self.queue
            .entry(host)
            .or_default()
            .push_back(DeferredBatch { ports, deferrals });
        Ok(deferrals)
    }

    /// Removes the oldest batch parked for `host`.
    pub(crate) fn take(&mut self, host: &HostId) -> Option<DeferredBatch> {
        let batches = self.queue.get_mut(host)?;
        let batch = batches.pop_front();
        if batches.is_empty() {
            self.queue.remove(host);
        }
        batch
    }

    pub(crate) fn pending_ports(&self) -> usize {
        self.queue
            .values()
            .flat_map(|batches| batches.iter())
            .map(|batch| batch.ports.len())
            .sum()
    }

    pub(crate) fn clear(&mut self) {
        self.queue.clear();
    }
}

enum Staged {
    Deferred { ports: usize, deferrals: u8 },
    Dropped { ports: usize },
    Locked {
        ticket: Ticket,
        created: bool,
        accepted: Vec<DiscoveredPort>,
        skipped: usize,
    },
}

impl Engine {
    /// Merges a batch of discovered ports and emits one summary notification.
    pub async fn merge_discovered(&self, batch: Vec<DiscoveredPort>) -> MergeReport {
        let span = info_span!("merge", ports = batch.len());
        self.merge_inner(batch).instrument(span).await
    }

    async fn merge_inner(&self, batch: Vec<DiscoveredPort>) -> MergeReport {
        let mut report = MergeReport::default();
        if batch.is_empty() {
            return report;
        }

        let mut merged = Vec::new();
        for (host, ports) in partition(batch) {
            let sub = self.merge_host(host.clone(), ports, 0).await;
            if sub.deferred == 0 && sub.dropped == 0 {
                merged.push(host);
            }
            report.absorb(sub);
        }

        self.notify_merge(&report);
        self.flush_deferred(&merged).await;
        report
    }

    /// Number of discovered ports parked behind locked hosts.
    pub fn deferred_ports(&self) -> usize {
        self.state().deferred.pending_ports()
    }

    /// Retries parked sub-batches for hosts that were just released, oldest
    /// first. A retry that finds the host locked again counts against that
    /// batch alone and ends the pass for the host.
    pub(crate) async fn flush_deferred(&self, hosts: &[HostId]) {
        for host in hosts {
            loop {
                let next = self.state().deferred.take(host);
                let Some(batch) = next else {
                    break;
                };

                debug!(
                    host = %host,
                    ports = batch.ports.len(),
                    attempt = batch.deferrals,
                    "retrying deferred merge"
                );
                let report = self
                    .merge_host(host.clone(), batch.ports, batch.deferrals)
                    .await;
                self.notify_merge(&report);
                if report.deferred > 0 {
                    break;
                }
            }
        }
    }

    async fn merge_host(&self, host: HostId, ports: Vec<DiscoveredPort>, prior: u8) -> MergeReport {
        let cap = self.config().max_merge_deferrals;
        let mut report = MergeReport::default();

        let staged = {
            let mut state = self.state();
            match state.acquire(std::slice::from_ref(&host), OperationKind::DiscoveryMerge) {
                Err(_) => {
                    let count = ports.len();
                    match state.deferred.defer(host.clone(), ports, prior, cap) {
                        Ok(deferrals) => Staged::Deferred {
                            ports: count,
                            deferrals,
                        },
                        Err(dropped) => Staged::Dropped {
                            ports: dropped.len(),
                        },
                    }
                }
                Ok(ticket) => {
                    let created = !state.hosts.contains(&host);
                    if created {
                        let mut group = HostGroup::new(host.clone());
                        group.lock = state.registry.lock_of(&host);
                        state.hosts.insert(group);
                    }

                    let mut accepted = Vec::new();
                    let mut skipped = 0;
                    if let Some(group) = state.hosts.get_mut(&host) {
                        for port in ports {
                            if group.contains(port.key()) {
                                skipped += 1;
                                continue;
                            }
                            let mut assignment = port.to_assignment();
                            assignment.state = PortState::PendingAdd;
                            group.ports.push(assignment);
                            accepted.push(port);
                        }
                        group.renumber();
                    }

                    Staged::Locked {
                        ticket,
                        created,
                        accepted,
                        skipped,
                    }
                }
            }
        };

        let (ticket, created, accepted) = match staged {
            Staged::Deferred { ports, deferrals } => {
                debug!(host = %host, ports, deferrals, "host locked, merge deferred");
                report.deferred = ports;
                return report;
            }
            Staged::Dropped { ports } => {
                warn!("Dropped {ports} discovered ports for {host}: host stayed locked");
                report.dropped = ports;
                return report;
            }
            Staged::Locked {
                ticket,
                created,
                accepted,
                skipped,
            } => {
                report.skipped_duplicates = skipped;
                (ticket, created, accepted)
            }
        };
        let guard = OperationGuard::new(self, ticket);
        let _guard = if created {
            guard.created(host.clone())
        } else {
            guard
        };
        self.changed(std::slice::from_ref(&host));

        for port in accepted {
            let result = self.authority().request_add_discovered_port(&port).await;
            if !self.record_add(&host, ticket, &port, &result) {
                debug!("dropping add response for released ticket");
                return report;
            }
            match result {
                Ok(()) => report.added += 1,
                Err(e) => {
                    warn!("Error adding discovered port {} on {host}: {e}", port.key());
                    report.failed.push(MergeFailure {
                        port,
                        message: e.to_string(),
                    });
                }
            }
        }

        let kept_host = {
            let mut state = self.state();
            if state.registry.is_stale(ticket) {
                return report;
            }
            state.release(ticket);
            let mut now_empty = false;
            if let Some(group) = state.hosts.get_mut(&host) {
                group.ports.retain(|p| p.state != PortState::Conflict);
                group.renumber();
                now_empty = group.ports.is_empty();
            }
            if created && now_empty {
                state.hosts.remove(&host);
                false
            } else {
                true
            }
        };

        if created && kept_host {
            report.created_hosts.push(host.clone());
        }
        self.changed(std::slice::from_ref(&host));
        report
    }

    /// Applies one add response. Returns `false` when the ticket went stale.
    fn record_add(
        &self,
        host: &HostId,
        ticket: Ticket,
        port: &DiscoveredPort,
        result: &Result<(), AuthorityError>,
    ) -> bool {
        let mut state = self.state();
        if state.registry.is_stale(ticket) {
            return false;
        }
        if let Some(slot) = state
            .hosts
            .get_mut(host)
            .and_then(|group| group.find_mut(port.key()))
        {
            slot.state = match result {
                Ok(()) => PortState::Committed,
                Err(_) => PortState::Conflict,
            };
        }
        true
    }

    fn notify_merge(&self, report: &MergeReport) {
        if report.is_empty() {
            return;
        }
        if report.is_clean() {
            self.notify_success(&report.summary());
        } else {
            self.notify_error(&report.summary());
        }
    }
}

fn partition(batch: Vec<DiscoveredPort>) -> BTreeMap<HostId, Vec<DiscoveredPort>> {
    let mut groups: BTreeMap<HostId, Vec<DiscoveredPort>> = BTreeMap::new();
    for port in batch {
        groups.entry(port.host.clone()).or_default().push(port);
    }
    groups
}
