use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a host registered with the domain controller.
/// e.g. "host-a", "dc-primary"
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(String);

impl HostId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one server of the domain: the host running it, its name on that
/// host and the server group it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServerIdentity {
    host: HostId,
    server: String,
    group: String,
}

impl ServerIdentity {
    pub fn new(host: HostId, server: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            host,
            server: server.into(),
            group: group.into(),
        }
    }

    pub fn host(&self) -> &HostId {
        &self.host
    }

    pub fn server_name(&self) -> &str {
        &self.server
    }

    pub fn server_group(&self) -> &str {
        &self.group
    }
}

impl fmt::Display for ServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host, self.server)
    }
}

/// Hash addressing deployment content in the domain content repository.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
