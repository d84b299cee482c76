use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Targets the plan's current actions at one server group.
///
/// Two directives are equal when they name the same group, whatever their
/// flags, so a phase holds at most one directive per group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerGroupDeploymentPlan {
    server_group_name: String,
    #[serde(default)]
    rollback: bool,
    #[serde(default)]
    rolling_to_servers: bool,
    #[serde(default)]
    max_server_failures: u32,
    #[serde(default)]
    max_server_failure_percentage: u8,
}

impl ServerGroupDeploymentPlan {
    pub fn new(server_group_name: impl Into<String>) -> Self {
        Self {
            server_group_name: server_group_name.into(),
            rollback: false,
            rolling_to_servers: false,
            max_server_failures: 0,
            max_server_failure_percentage: 0,
        }
    }

    pub fn with_rollback(mut self) -> Self {
        self.rollback = true;
        self
    }

    /// Apply to the group's hosts one at a time instead of all at once.
    pub fn rolling_to_servers(mut self) -> Self {
        self.rolling_to_servers = true;
        self
    }

    pub fn with_max_server_failures(mut self, count: u32) -> Self {
        self.max_server_failures = count;
        self
    }

    /// Capped at 100.
    pub fn with_max_server_failure_percentage(mut self, percentage: u8) -> Self {
        self.max_server_failure_percentage = percentage.min(100);
        self
    }

    pub fn server_group_name(&self) -> &str {
        &self.server_group_name
    }

    pub fn is_rollback(&self) -> bool {
        self.rollback
    }

    pub fn is_rolling_to_servers(&self) -> bool {
        self.rolling_to_servers
    }

    pub fn max_server_failures(&self) -> u32 {
        self.max_server_failures
    }

    pub fn max_server_failure_percentage(&self) -> u8 {
        self.max_server_failure_percentage
    }
}

impl PartialEq for ServerGroupDeploymentPlan {
    fn eq(&self, other: &Self) -> bool {
        self.server_group_name == other.server_group_name
    }
}

impl Eq for ServerGroupDeploymentPlan {}

impl Hash for ServerGroupDeploymentPlan {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.server_group_name.hash(state);
    }
}
