//! # Update Propagation Engine
//!
//! Drives one [`DomainUpdate`] through
//! `PENDING -> DOMAIN_APPLIED -> HOSTS_DISPATCHED -> COMMITTED | ROLLING_BACK -> ROLLED_BACK`
//! (or `DOMAIN_FAILED`):
//!
//! 1. Apply the update to a working copy of the domain model. On failure no
//!    host is ever contacted.
//! 2. Compute the blast radius. An empty one commits immediately.
//! 3. Send each affected server the update that brings it to its resolved
//!    state in the working copy. One task per host runs concurrently, bounded
//!    by a semaphore and a per-host timeout.
//! 4. All hosts succeeded: commit the working copy.
//! 5. Some failed and the policy asks for a rollback: undo the domain change
//!    and send the servers on hosts that succeeded back to their resolved
//!    state in the untouched model.
//! 6. Otherwise commit with the hosts left as they are.
//!
//! The engine owns the model only for the duration of one call. Callers
//! serialize updates against the same model.

mod policy;

#[cfg(test)]
mod tests;

pub use policy::{CancellationHandle, FailureTolerance, PropagationOptions, RollbackPolicy};

use crate::config::ControllerConfig;
use crate::event_bus::{ControllerEvent, EventBus, UpdateState};
use crate::host::HostExecutor;
use domain_model::{
    DispatchPhase, DomainModel, DomainUpdate, HostFailure, HostId, PropagationOutcome,
    ServerIdentity, ServerUpdate, UpdateFailure,
};
use futures::future::join_all;
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use uuid::Uuid;

type DispatchResults = BTreeMap<HostId, Result<(), UpdateFailure>>;
type HostUpdates = BTreeMap<HostId, Vec<(ServerIdentity, ServerUpdate)>>;

pub struct UpdatePropagationEngine<H: HostExecutor> {
    hosts: Arc<H>,
    event_bus: EventBus,
    host_timeout: Duration,
    max_concurrent_dispatch: usize,
}

impl<H: HostExecutor + 'static> UpdatePropagationEngine<H> {
    pub fn new(hosts: Arc<H>, event_bus: EventBus, config: &ControllerConfig) -> Self {
        Self {
            hosts,
            event_bus,
            host_timeout: config.host_timeout(),
            max_concurrent_dispatch: config.max_concurrent_dispatch.max(1),
        }
    }

    pub fn hosts(&self) -> &Arc<H> {
        &self.hosts
    }

    /// Propagates `update` to `model` and the servers it governs.
    ///
    /// `model` is only written when the update commits; on every other
    /// outcome it is left exactly as it was passed in.
    pub async fn propagate(
        &self,
        model: &mut DomainModel,
        update: &DomainUpdate,
        options: &PropagationOptions,
    ) -> PropagationOutcome {
        let update_id = Uuid::new_v4();
        self.transition(update_id, update, UpdateState::Pending);

        // Computed against the pre-change model.
        let compensation = update.compensating_update(model);

        let mut working = model.clone();
        if let Err(cause) = update.apply(&mut working) {
            warn!("Engine: {} rejected by the domain model: {}", update, cause);
            self.transition(update_id, update, UpdateState::DomainFailed);
            return PropagationOutcome::DomainFailure(cause);
        }
        self.transition(update_id, update, UpdateState::DomainApplied);

        if options.is_cancelled() {
            info!("Engine: {} cancelled before contacting any host.", update);
            self.transition(update_id, update, UpdateState::Cancelled);
            return PropagationOutcome::Cancelled;
        }

        let mut affected = update.affected_servers(&working);
        if let Some(only) = &options.only_servers {
            affected.retain(|server| only.contains(server));
        }
        let subordinate = match update.subordinate_update() {
            Some(subordinate) if !affected.is_empty() => subordinate,
            _ => {
                debug!("Engine: {} is domain-only, committing.", update);
                *model = working;
                self.transition(update_id, update, UpdateState::Committed);
                return PropagationOutcome::Committed(BTreeSet::new());
            }
        };

        let targets = by_host(update.server_updates(&working, &affected));
        info!(
            "Engine: Dispatching {} to {} server(s) on {} host(s).",
            subordinate,
            affected.len(),
            targets.len()
        );
        self.transition(update_id, update, UpdateState::HostsDispatched);
        let results = self
            .dispatch(update_id, &targets, options.sequential, DispatchPhase::Forward)
            .await;

        let mut host_failures = BTreeMap::new();
        let mut succeeded = BTreeSet::new();
        for (host, result) in results {
            match result {
                Ok(()) => {
                    if let Some(updates) = targets.get(&host) {
                        succeeded.extend(updates.iter().map(|(server, _)| server.clone()));
                    }
                }
                Err(cause) => {
                    host_failures.insert(host, HostFailure::forward(cause));
                }
            }
        }

        if host_failures.is_empty() {
            *model = working;
            self.transition(update_id, update, UpdateState::Committed);
            return PropagationOutcome::Committed(affected);
        }

        let failed_servers: BTreeSet<ServerIdentity> = host_failures
            .keys()
            .filter_map(|host| targets.get(host))
            .flatten()
            .map(|(server, _)| server.clone())
            .collect();
        warn!(
            "Engine: {} failed on {} of {} host(s).",
            update,
            host_failures.len(),
            targets.len()
        );

        let compensation = match compensation {
            Some(compensation) if options.rollback.requires_rollback(&failed_servers, &affected) => {
                compensation
            }
            other => {
                if other.is_none() && options.rollback.is_enabled() {
                    warn!("Engine: {} cannot be compensated, keeping it.", update);
                }
                *model = working;
                self.transition(update_id, update, UpdateState::Committed);
                return PropagationOutcome::PartiallyFailed {
                    affected_servers: affected,
                    host_failures,
                    rolled_back: false,
                };
            }
        };

        self.transition(update_id, update, UpdateState::RollingBack);

        // The domain model is compensated before any host is.
        match compensation.apply(&mut working) {
            Ok(()) if working == *model => {}
            Ok(()) => warn!(
                "Engine: {} did not restore the domain model exactly, keeping the snapshot.",
                compensation
            ),
            Err(cause) => error!(
                "Engine: {} failed on the working copy ({}), keeping the snapshot.",
                compensation, cause
            ),
        }

        // Servers return to what the untouched model resolves for them.
        let undo = by_host(compensation.server_updates(model, &succeeded));
        if !undo.is_empty() {
            info!(
                "Engine: Compensating {} host(s) with {}.",
                undo.len(),
                compensation
            );
            let results = self
                .dispatch(update_id, &undo, options.sequential, DispatchPhase::Compensation)
                .await;
            for (host, result) in results {
                if let Err(cause) = result {
                    host_failures
                        .entry(host)
                        .or_insert_with(|| HostFailure::compensation(cause));
                }
            }
        }

        self.transition(update_id, update, UpdateState::RolledBack);
        PropagationOutcome::PartiallyFailed {
            affected_servers: affected,
            host_failures,
            rolled_back: true,
        }
    }

    /// Sends each target host its server updates and waits for all of them.
    async fn dispatch(
        &self,
        update_id: Uuid,
        targets: &HostUpdates,
        sequential: bool,
        phase: DispatchPhase,
    ) -> DispatchResults {
        let permits = if sequential {
            1
        } else {
            self.max_concurrent_dispatch
        };
        let semaphore = Arc::new(Semaphore::new(permits));
        let timeout = self.host_timeout;

        let mut hosts = Vec::with_capacity(targets.len());
        let mut tasks = Vec::with_capacity(targets.len());
        for (host, updates) in targets {
            self.event_bus.publish(ControllerEvent::HostDispatched {
                update_id,
                host: host.clone(),
                phase,
            });

            let executor = Arc::clone(&self.hosts);
            let semaphore = Arc::clone(&semaphore);
            let task_host = host.clone();
            let updates = updates.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.map_err(|_| {
                    UpdateFailure::HostUnreachable {
                        host: task_host.clone(),
                        reason: "dispatch pool closed".into(),
                    }
                })?;
                match tokio::time::timeout(
                    timeout,
                    executor.apply_to_host(&task_host, &updates, timeout),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(UpdateFailure::Timeout {
                        host: task_host,
                        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    }),
                }
            }));
            hosts.push(host.clone());
        }

        let joined = join_all(tasks).await;

        let mut results = BTreeMap::new();
        for (host, joined) in hosts.into_iter().zip(joined) {
            let result = joined.unwrap_or_else(|e| {
                Err(UpdateFailure::HostUnreachable {
                    host: host.clone(),
                    reason: format!("dispatch task failed: {}", e),
                })
            });
            if let Err(cause) = &result {
                warn!("Engine: Host '{}' failed ({:?}): {}", host, phase, cause);
                self.event_bus.publish(ControllerEvent::HostFailed {
                    update_id,
                    host: host.clone(),
                    phase,
                    cause: cause.clone(),
                });
            }
            results.insert(host, result);
        }
        results
    }

    fn transition(&self, update_id: Uuid, update: &DomainUpdate, state: UpdateState) {
        debug!("Engine: {} [{}] -> {:?}", update, update_id, state);
        self.event_bus.publish(ControllerEvent::UpdateStateChanged {
            update_id,
            kind: update.kind(),
            state,
        });
    }
}

fn by_host(updates: BTreeMap<ServerIdentity, ServerUpdate>) -> HostUpdates {
    let mut targets = HostUpdates::new();
    for (server, update) in updates {
        targets
            .entry(server.host().clone())
            .or_default()
            .push((server, update));
    }
    targets
}
