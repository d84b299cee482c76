use crate::error::UpdateFailure;
use crate::model::{HostId, ServerIdentity};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Whether a host failed while applying the update or while undoing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchPhase {
    Forward,
    Compensation,
}

/// Why a single host did not end up in the intended state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFailure {
    phase: DispatchPhase,
    cause: UpdateFailure,
}

impl HostFailure {
    pub fn forward(cause: UpdateFailure) -> Self {
        Self {
            phase: DispatchPhase::Forward,
            cause,
        }
    }

    pub fn compensation(cause: UpdateFailure) -> Self {
        Self {
            phase: DispatchPhase::Compensation,
            cause,
        }
    }

    pub fn phase(&self) -> DispatchPhase {
        self.phase
    }

    pub fn cause(&self) -> &UpdateFailure {
        &self.cause
    }
}

/// The terminal result of propagating one update. Exactly one variant holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropagationOutcome {
    /// The update was rejected by the domain model. No host was contacted.
    DomainFailure(UpdateFailure),

    /// The caller cancelled before any host was contacted. Nothing changed.
    Cancelled,

    /// The domain model and every affected server hold the change.
    Committed(BTreeSet<ServerIdentity>),

    /// At least one host failed.
    ///
    /// With `rolled_back`, the domain model was restored and every host that
    /// had succeeded was sent the compensating update. Without it, the domain
    /// model keeps the change and hosts are left as reported.
    PartiallyFailed {
        affected_servers: BTreeSet<ServerIdentity>,
        host_failures: BTreeMap<HostId, HostFailure>,
        rolled_back: bool,
    },
}

impl PropagationOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, PropagationOutcome::Committed(_))
    }

    pub fn is_rolled_back(&self) -> bool {
        matches!(
            self,
            PropagationOutcome::PartiallyFailed {
                rolled_back: true,
                ..
            }
        )
    }

    /// `true` when no host was ever contacted.
    pub fn nothing_attempted(&self) -> bool {
        matches!(
            self,
            PropagationOutcome::DomainFailure(_) | PropagationOutcome::Cancelled
        )
    }

    pub fn domain_failure(&self) -> Option<&UpdateFailure> {
        match self {
            PropagationOutcome::DomainFailure(cause) => Some(cause),
            _ => None,
        }
    }

    pub fn host_failures(&self) -> Option<&BTreeMap<HostId, HostFailure>> {
        match self {
            PropagationOutcome::PartiallyFailed { host_failures, .. } => Some(host_failures),
            _ => None,
        }
    }

    /// Every server in the blast radius, whatever happened to it.
    pub fn affected_servers(&self) -> Option<&BTreeSet<ServerIdentity>> {
        match self {
            PropagationOutcome::Committed(servers) => Some(servers),
            PropagationOutcome::PartiallyFailed {
                affected_servers, ..
            } => Some(affected_servers),
            _ => None,
        }
    }
}
