use crate::model::HostId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The kind of model element an update referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    Profile,
    Subsystem,
    ServerGroup,
    Host,
    Server,
    Path,
    SystemProperty,
    Deployment,
    ServerGroupDeployment,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementKind::Profile => "profile",
            ElementKind::Subsystem => "subsystem",
            ElementKind::ServerGroup => "server group",
            ElementKind::Host => "host",
            ElementKind::Server => "server",
            ElementKind::Path => "path",
            ElementKind::SystemProperty => "system property",
            ElementKind::Deployment => "deployment",
            ElementKind::ServerGroupDeployment => "server group deployment",
        };
        f.write_str(name)
    }
}

/// Why an update could not be applied.
///
/// `NotFound`, `Constraint` and `State` are raised while applying an update to
/// a model. The host variants only ever describe a host that could not be
/// driven to completion.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum UpdateFailure {
    /// The referenced model element is absent.
    #[error("{kind} '{name}' does not exist")]
    NotFound { kind: ElementKind, name: String },

    /// The update would break a model invariant (duplicate name, dangling reference).
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// The update is illegal in the current state.
    #[error("illegal state: {0}")]
    State(String),

    /// The host did not answer within the dispatch timeout.
    #[error("host '{host}' did not respond within {timeout_ms}ms")]
    Timeout { host: HostId, timeout_ms: u64 },

    /// The host could not be contacted at all.
    #[error("host '{host}' unreachable: {reason}")]
    HostUnreachable { host: HostId, reason: String },

    /// The host answered but refused the update for one of its servers.
    #[error("host '{host}' rejected update on server '{server}': {cause}")]
    Rejected {
        host: HostId,
        server: String,
        cause: Box<UpdateFailure>,
    },
}

impl UpdateFailure {
    pub fn not_found(kind: ElementKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::Constraint(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub fn rejected(host: HostId, server: impl Into<String>, cause: UpdateFailure) -> Self {
        Self::Rejected {
            host,
            server: server.into(),
            cause: Box::new(cause),
        }
    }

    /// `true` for failures that describe a host rather than the model.
    pub fn is_host_failure(&self) -> bool {
        matches!(
            self,
            UpdateFailure::Timeout { .. }
                | UpdateFailure::HostUnreachable { .. }
                | UpdateFailure::Rejected { .. }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, UpdateFailure::Timeout { .. })
    }
}
