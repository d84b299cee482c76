use crate::host::traits::HostExecutor;
use async_trait::async_trait;
use domain_model::{
    DomainModel, ElementKind, HostId, ServerIdentity, ServerState, ServerUpdate, UpdateFailure,
};
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Runs every server of the domain in memory.
///
/// Each running server is represented by its [`ServerState`], seeded from the
/// domain model. Hosts can be marked unreachable to simulate outages.
pub struct LocalHostExecutor {
    servers: Mutex<BTreeMap<ServerIdentity, ServerState>>,
    unreachable: Mutex<BTreeSet<HostId>>,
}

impl LocalHostExecutor {
    pub fn new() -> Self {
        Self {
            servers: Mutex::new(BTreeMap::new()),
            unreachable: Mutex::new(BTreeSet::new()),
        }
    }

    /// Starts every active server of `model` with its resolved configuration.
    pub fn from_model(model: &DomainModel) -> Result<Self, UpdateFailure> {
        let executor = Self::new();
        {
            let mut servers = lock(&executor.servers);
            for (id, _, _) in model.active_servers() {
                let state = model.resolve_server_state(&id)?;
                servers.insert(id, state);
            }
            info!("Executor: Local hosts started {} server(s).", servers.len());
        }
        Ok(executor)
    }

    pub fn server_state(&self, server: &ServerIdentity) -> Option<ServerState> {
        lock(&self.servers).get(server).cloned()
    }

    pub fn set_unreachable(&self, host: HostId) {
        warn!("Executor: Host '{}' marked unreachable.", host);
        lock(&self.unreachable).insert(host);
    }

    pub fn set_reachable(&self, host: &HostId) {
        if lock(&self.unreachable).remove(host) {
            info!("Executor: Host '{}' reachable again.", host);
        }
    }
}

impl Default for LocalHostExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl HostExecutor for LocalHostExecutor {
    async fn apply_to_host(
        &self,
        host: &HostId,
        updates: &[(ServerIdentity, ServerUpdate)],
        _timeout: Duration,
    ) -> Result<(), UpdateFailure> {
        if lock(&self.unreachable).contains(host) {
            return Err(UpdateFailure::HostUnreachable {
                host: host.clone(),
                reason: "host is down".into(),
            });
        }

        let mut states = lock(&self.servers);

        // Stage on copies so a rejection leaves every server untouched.
        let mut staged = Vec::with_capacity(updates.len());
        for (server, update) in updates {
            let mut state = states.get(server).cloned().ok_or_else(|| {
                UpdateFailure::rejected(
                    host.clone(),
                    server.server_name(),
                    UpdateFailure::not_found(ElementKind::Server, server.server_name()),
                )
            })?;
            update
                .apply(&mut state)
                .map_err(|cause| UpdateFailure::rejected(host.clone(), server.server_name(), cause))?;
            debug!("Executor: {} staged {}", server, update);
            staged.push((server.clone(), state));
        }

        for (server, state) in staged {
            states.insert(server, state);
        }
        Ok(())
    }
}
