use domain_model::ServerIdentity;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How many failed servers a group tolerates before the update is rolled back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureTolerance {
    pub max_failures: u32,
    pub max_failure_percentage: u8,
}

impl FailureTolerance {
    /// The larger of the absolute and the percentage limit.
    pub fn allowed(&self, server_count: usize) -> usize {
        let by_percentage = server_count * usize::from(self.max_failure_percentage.min(100)) / 100;
        by_percentage.max(self.max_failures as usize)
    }
}

/// Decides whether host failures undo an update.
///
/// A disabled policy never rolls back. An enabled one rolls back as soon as
/// one server group has more failed servers than it tolerates (none by default).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackPolicy {
    enabled: bool,
    tolerances: BTreeMap<String, FailureTolerance>,
}

impl RollbackPolicy {
    pub fn never() -> Self {
        Self::default()
    }

    pub fn on_failure() -> Self {
        Self {
            enabled: true,
            tolerances: BTreeMap::new(),
        }
    }

    pub fn from_flag(enabled: bool) -> Self {
        if enabled {
            Self::on_failure()
        } else {
            Self::never()
        }
    }

    pub fn tolerate(mut self, server_group: impl Into<String>, tolerance: FailureTolerance) -> Self {
        self.tolerances.insert(server_group.into(), tolerance);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn requires_rollback(
        &self,
        failed: &BTreeSet<ServerIdentity>,
        affected: &BTreeSet<ServerIdentity>,
    ) -> bool {
        if !self.enabled || failed.is_empty() {
            return false;
        }
        let mut per_group: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for server in affected {
            let entry = per_group.entry(server.server_group()).or_default();
            entry.0 += 1;
            if failed.contains(server) {
                entry.1 += 1;
            }
        }
        per_group.into_iter().any(|(group, (total, failures))| {
            let tolerance = self.tolerances.get(group).copied().unwrap_or_default();
            failures > tolerance.allowed(total)
        })
    }
}

/// Cooperative cancellation shared between a caller and the engine.
///
/// Only honoured before an update contacts its first host and between the
/// actions of a plan.
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancellationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Per-update knobs of [`super::UpdatePropagationEngine::propagate`].
#[derive(Debug, Clone, Default)]
pub struct PropagationOptions {
    pub rollback: RollbackPolicy,
    /// Contact one host at a time.
    pub sequential: bool,
    /// Restrict dispatch to these servers.
    pub only_servers: Option<BTreeSet<ServerIdentity>>,
    pub cancellation: Option<CancellationHandle>,
}

impl PropagationOptions {
    pub fn with_rollback(rollback: bool) -> Self {
        Self {
            rollback: RollbackPolicy::from_flag(rollback),
            ..Default::default()
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationHandle::is_cancelled)
    }
}
