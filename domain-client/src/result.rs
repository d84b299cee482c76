//! Outcomes of executing a deployment plan, per server, per server group,
//! per action and for the plan as a whole.

use crate::action::DeploymentAction;
use domain_model::{HostFailure, HostId, ServerIdentity, UpdateFailure};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "cause", rename_all = "snake_case")]
pub enum ServerUpdateResult {
    Success,
    Failed(UpdateFailure),
    RolledBack,
    RollbackFailed(UpdateFailure),
    Cancelled,
}

impl ServerUpdateResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ServerUpdateResult::Success)
    }
}

/// Results of one action on the servers of one group, keyed by `host/server`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerGroupDeploymentActionResult {
    server_group: String,
    results_by_server: BTreeMap<String, ServerUpdateResult>,
}

impl ServerGroupDeploymentActionResult {
    pub fn new(server_group: impl Into<String>) -> Self {
        Self {
            server_group: server_group.into(),
            results_by_server: BTreeMap::new(),
        }
    }

    pub fn server_group(&self) -> &str {
        &self.server_group
    }

    pub fn results_by_server(&self) -> &BTreeMap<String, ServerUpdateResult> {
        &self.results_by_server
    }

    pub fn result_for(&self, server: &ServerIdentity) -> Option<&ServerUpdateResult> {
        self.results_by_server.get(&server.to_string())
    }

    pub fn record(&mut self, server: &ServerIdentity, result: ServerUpdateResult) {
        self.results_by_server.insert(server.to_string(), result);
    }

    /// Downgrades every successful server to `RolledBack`.
    pub fn mark_rolled_back(&mut self) {
        for result in self.results_by_server.values_mut() {
            if result.is_success() {
                *result = ServerUpdateResult::RolledBack;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionClassification {
    Succeeded,
    Cancelled,
    DomainFailed,
    HostFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentActionResult {
    action_id: Uuid,
    deployment_action: DeploymentAction,
    cancelled_by_domain: bool,
    rolled_back_on_domain: bool,
    domain_controller_failure: Option<UpdateFailure>,
    host_failures: BTreeMap<HostId, HostFailure>,
    results_by_server_group: BTreeMap<String, ServerGroupDeploymentActionResult>,
}

impl DeploymentActionResult {
    pub fn new(deployment_action: DeploymentAction) -> Self {
        Self {
            action_id: deployment_action.id(),
            deployment_action,
            cancelled_by_domain: false,
            rolled_back_on_domain: false,
            domain_controller_failure: None,
            host_failures: BTreeMap::new(),
            results_by_server_group: BTreeMap::new(),
        }
    }

    pub fn action_id(&self) -> Uuid {
        self.action_id
    }

    pub fn deployment_action(&self) -> &DeploymentAction {
        &self.deployment_action
    }

    /// The action was never submitted because the plan had already failed or
    /// was cancelled.
    pub fn is_cancelled_by_domain(&self) -> bool {
        self.cancelled_by_domain
    }

    /// The action's change to the domain model was undone.
    pub fn is_rolled_back_on_domain(&self) -> bool {
        self.rolled_back_on_domain
    }

    pub fn domain_controller_failure(&self) -> Option<&UpdateFailure> {
        self.domain_controller_failure.as_ref()
    }

    pub fn host_failures(&self) -> &BTreeMap<HostId, HostFailure> {
        &self.host_failures
    }

    pub fn results_by_server_group(&self) -> &BTreeMap<String, ServerGroupDeploymentActionResult> {
        &self.results_by_server_group
    }

    pub fn mark_cancelled_by_domain(&mut self) {
        self.cancelled_by_domain = true;
        for group in self.results_by_server_group.values_mut() {
            for result in group.results_by_server.values_mut() {
                *result = ServerUpdateResult::Cancelled;
            }
        }
    }

    pub fn mark_rolled_back_on_domain(&mut self) {
        self.rolled_back_on_domain = true;
        for group in self.results_by_server_group.values_mut() {
            group.mark_rolled_back();
        }
    }

    pub fn set_domain_controller_failure(&mut self, cause: UpdateFailure) {
        self.domain_controller_failure = Some(cause);
    }

    /// Keeps the first failure recorded for a host.
    pub fn record_host_failure(&mut self, host: HostId, failure: HostFailure) {
        self.host_failures.entry(host).or_insert(failure);
    }

    pub fn group_result_mut(&mut self, server_group: &str) -> &mut ServerGroupDeploymentActionResult {
        self.results_by_server_group
            .entry(server_group.to_string())
            .or_insert_with(|| ServerGroupDeploymentActionResult::new(server_group))
    }

    pub fn record_server(&mut self, server: &ServerIdentity, result: ServerUpdateResult) {
        self.group_result_mut(server.server_group())
            .record(server, result);
    }

    /// A domain failure wins over host failures, which win over cancellation.
    /// An action whose change was undone counts as cancelled.
    pub fn classification(&self) -> ActionClassification {
        if self.domain_controller_failure.is_some() {
            ActionClassification::DomainFailed
        } else if !self.host_failures.is_empty() {
            ActionClassification::HostFailed
        } else if self.cancelled_by_domain || self.rolled_back_on_domain {
            ActionClassification::Cancelled
        } else {
            ActionClassification::Succeeded
        }
    }

    /// `true` once the action's change reached the domain model.
    pub fn was_applied(&self) -> bool {
        !self.cancelled_by_domain && self.domain_controller_failure.is_none()
    }
}

/// What the caller needs to know to decide on manual remediation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanStatus {
    /// Nothing ever reached the domain model or a host.
    NothingApplied,
    /// Every action succeeded on the domain and on every affected server.
    Applied,
    /// Some changes were made, then undone.
    PartiallyAppliedRolledBack,
    /// Some changes were made and left in place. Needs reconciliation.
    PartiallyAppliedNotRolledBack,
}

/// The overall result of executing one plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainUpdateApplierResponse {
    plan_id: Uuid,
    cancelled: bool,
    rolled_back: bool,
    domain_failure: Option<UpdateFailure>,
    updated_servers: BTreeSet<ServerIdentity>,
    action_results: Vec<DeploymentActionResult>,
}

impl DomainUpdateApplierResponse {
    pub fn new(plan_id: Uuid) -> Self {
        Self {
            plan_id,
            cancelled: false,
            rolled_back: false,
            domain_failure: None,
            updated_servers: BTreeSet::new(),
            action_results: Vec::new(),
        }
    }

    pub fn plan_id(&self) -> Uuid {
        self.plan_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn is_rolled_back(&self) -> bool {
        self.rolled_back
    }

    /// The first domain-level failure of the plan.
    pub fn domain_failure(&self) -> Option<&UpdateFailure> {
        self.domain_failure.as_ref()
    }

    /// Servers left holding at least one change of the plan.
    pub fn updated_servers(&self) -> &BTreeSet<ServerIdentity> {
        &self.updated_servers
    }

    pub fn action_results(&self) -> &[DeploymentActionResult] {
        &self.action_results
    }

    pub fn action_result(&self, action_id: Uuid) -> Option<&DeploymentActionResult> {
        self.action_results.iter().find(|r| r.action_id == action_id)
    }

    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub fn mark_rolled_back(&mut self) {
        self.rolled_back = true;
    }

    pub fn record_domain_failure(&mut self, cause: UpdateFailure) {
        if self.domain_failure.is_none() {
            self.domain_failure = Some(cause);
        }
    }

    pub fn set_updated_servers(&mut self, servers: BTreeSet<ServerIdentity>) {
        self.updated_servers = servers;
    }

    pub fn push_action_result(&mut self, result: DeploymentActionResult) {
        self.action_results.push(result);
    }

    pub fn status(&self) -> PlanStatus {
        if !self.action_results.iter().any(|r| r.was_applied()) {
            PlanStatus::NothingApplied
        } else if self.rolled_back {
            PlanStatus::PartiallyAppliedRolledBack
        } else if self
            .action_results
            .iter()
            .all(|r| r.classification() == ActionClassification::Succeeded)
        {
            PlanStatus::Applied
        } else {
            PlanStatus::PartiallyAppliedNotRolledBack
        }
    }
}
