//! Deployment set plans.
//!
//! A [`DeploymentSetPlan`] is a persistent value. Every builder call returns a
//! new plan sharing the untouched prefix of its actions and every sealed phase
//! with the plan it was derived from, so any number of builder chains can fork
//! from one intermediate plan without observing each other.
//!
//! Actions are grouped into *phases*. Group directives added with
//! [`DeploymentSetPlan::to_server_group`] go to the current phase and target
//! every action recorded in it. Recording a new `DEPLOY`, `UNDEPLOY` or
//! `REPLACE` once the current phase already holds a directive seals that phase
//! and opens a new one.

mod group;
mod repr;


pub use group::ServerGroupDeploymentPlan;

use crate::action::{ContentReference, DeploymentAction, DeploymentActionType};
use crate::error::PlanError;
use repr::PlanRepr;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Graceful shutdown timeout meaning "wait as long as it takes".
pub const INDEFINITE_TIMEOUT_MS: i64 = -1;

#[derive(Debug)]
struct ActionNode {
    action: DeploymentAction,
    phase: usize,
    prev: Option<Arc<ActionNode>>,
}

#[derive(Debug)]
struct PhaseNode {
    phase: Arc<Phase>,
    prev: Option<Arc<PhaseNode>>,
}

/// Directives of one phase in first-insertion order.
#[derive(Debug, Clone, Default)]
struct Phase {
    directives: Vec<ServerGroupDeploymentPlan>,
    latest: Option<usize>,
}

impl Phase {
    fn from_directives(directives: Vec<ServerGroupDeploymentPlan>) -> Result<Self, PlanError> {
        for (i, directive) in directives.iter().enumerate() {
            if directives[..i].contains(directive) {
                return Err(PlanError::Malformed(format!(
                    "server group '{}' targeted twice in one phase",
                    directive.server_group_name()
                )));
            }
        }
        let latest = directives.len().checked_sub(1);
        Ok(Self { directives, latest })
    }

    /// Stores `directive`, overwriting an existing one for the same group in place.
    fn with(&self, directive: ServerGroupDeploymentPlan) -> Self {
        let mut next = self.clone();
        let index = match next.directives.iter().position(|d| d == &directive) {
            Some(index) => {
                next.directives[index] = directive;
                index
            }
            None => {
                next.directives.push(directive);
                next.directives.len() - 1
            }
        };
        next.latest = Some(index);
        next
    }

    fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}

/// An action together with the server groups it must reach.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetedAction {
    pub action: DeploymentAction,
    pub phase: usize,
    pub targets: Vec<ServerGroupDeploymentPlan>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "PlanRepr", try_from = "PlanRepr")]
pub struct DeploymentSetPlan {
    id: Uuid,
    head: Option<Arc<ActionNode>>,
    action_count: usize,
    sealed: Option<Arc<PhaseNode>>,
    sealed_count: usize,
    current: Arc<Phase>,
    rollback: bool,
    shutdown: bool,
    graceful_shutdown_timeout_ms: i64,
}

impl Default for DeploymentSetPlan {
    fn default() -> Self {
        Self::new()
    }
}

impl DeploymentSetPlan {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            head: None,
            action_count: 0,
            sealed: None,
            sealed_count: 0,
            current: Arc::new(Phase::default()),
            rollback: false,
            shutdown: false,
            graceful_shutdown_timeout_ms: INDEFINITE_TIMEOUT_MS,
        }
    }

    // --- Builder ---

    pub fn add_deploy(&self, unique_name: impl Into<String>, content: ContentReference) -> Self {
        self.record(DeploymentAction::deploy(unique_name, content))
    }

    pub fn add_undeploy(&self, unique_name: impl Into<String>) -> Self {
        self.record(DeploymentAction::undeploy(unique_name))
    }

    pub fn add_replace(
        &self,
        replaced_unique_name: impl Into<String>,
        unique_name: impl Into<String>,
        content: ContentReference,
    ) -> Self {
        self.record(DeploymentAction::replace(
            replaced_unique_name,
            unique_name,
            content,
        ))
    }

    /// Removes content from the repository. Only legal right after an
    /// `UNDEPLOY` of the same content.
    pub fn add_remove(&self, unique_name: impl Into<String>) -> Result<Self, PlanError> {
        let unique_name = unique_name.into();
        match self.last_action() {
            Some(last)
                if last.action_type() == DeploymentActionType::Undeploy
                    && last.unique_name() == unique_name =>
            {
                Ok(self.record(DeploymentAction::remove(unique_name)))
            }
            Some(last) => Err(PlanError::state(format!(
                "REMOVE of '{}' must follow an UNDEPLOY of the same content, last action is {}",
                unique_name, last
            ))),
            None => Err(PlanError::state(format!(
                "REMOVE of '{}' must follow an UNDEPLOY of the same content, plan is empty",
                unique_name
            ))),
        }
    }

    /// Adds a `REMOVE` for the content undeployed by the last action.
    pub fn and_remove_undeployed(&self) -> Result<Self, PlanError> {
        let last = self
            .last_action()
            .filter(|a| a.action_type() == DeploymentActionType::Undeploy)
            .ok_or_else(|| PlanError::state("last action is not an UNDEPLOY"))?;
        self.add_remove(last.unique_name())
    }

    /// Targets the current phase's actions at a server group. A directive for a
    /// group already in the phase replaces it but keeps its position.
    pub fn to_server_group(&self, directive: ServerGroupDeploymentPlan) -> Result<Self, PlanError> {
        self.require_action(&directive)?;
        let mut next = self.clone();
        next.current = Arc::new(self.current.with(directive));
        Ok(next)
    }

    /// Seals the current phase and starts a new one holding only `directive`.
    ///
    /// Until another action is recorded, the new phase extends the targets of
    /// the actions already recorded: they roll on to this group after the
    /// groups of the sealed phase.
    pub fn roll_to_server_group(
        &self,
        directive: ServerGroupDeploymentPlan,
    ) -> Result<Self, PlanError> {
        self.require_action(&directive)?;
        if self.current.is_empty() {
            return self.to_server_group(directive);
        }
        let mut next = self.sealed_copy();
        next.current = Arc::new(Phase::default().with(directive));
        Ok(next)
    }

    pub fn with_rollback(&self) -> Self {
        let mut next = self.clone();
        next.rollback = true;
        next
    }

    /// Servers are shut down (without waiting) to apply the plan.
    pub fn with_shutdown(&self) -> Self {
        self.with_graceful_shutdown(0)
    }

    /// Servers are shut down gracefully, waiting up to `timeout_ms`
    /// ([`INDEFINITE_TIMEOUT_MS`] for no limit).
    pub fn with_graceful_shutdown(&self, timeout_ms: i64) -> Self {
        let mut next = self.clone();
        next.shutdown = true;
        next.graceful_shutdown_timeout_ms = timeout_ms;
        next
    }

    fn require_action(&self, directive: &ServerGroupDeploymentPlan) -> Result<(), PlanError> {
        if self.head.is_none() {
            return Err(PlanError::state(format!(
                "cannot target server group '{}' before any action was added",
                directive.server_group_name()
            )));
        }
        Ok(())
    }

    /// A copy of this plan whose current phase has been sealed.
    fn sealed_copy(&self) -> Self {
        let mut next = self.clone();
        next.sealed = Some(Arc::new(PhaseNode {
            phase: Arc::clone(&self.current),
            prev: self.sealed.clone(),
        }));
        next.sealed_count += 1;
        next.current = Arc::new(Phase::default());
        next
    }

    fn record(&self, action: DeploymentAction) -> Self {
        let opens_phase = action.action_type() != DeploymentActionType::Remove;
        let mut next = if opens_phase && !self.current.is_empty() {
            self.sealed_copy()
        } else {
            self.clone()
        };
        next.head = Some(Arc::new(ActionNode {
            action,
            phase: next.sealed_count,
            prev: self.head.clone(),
        }));
        next.action_count += 1;
        next
    }

    // --- Queries ---

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_rollback(&self) -> bool {
        self.rollback
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    pub fn is_graceful_shutdown(&self) -> bool {
        self.shutdown && self.graceful_shutdown_timeout_ms != 0
    }

    pub fn graceful_shutdown_timeout_ms(&self) -> i64 {
        self.graceful_shutdown_timeout_ms
    }

    pub fn action_count(&self) -> usize {
        self.action_count
    }

    pub fn phase_count(&self) -> usize {
        self.sealed_count + 1
    }

    pub fn last_action(&self) -> Option<&DeploymentAction> {
        self.head.as_deref().map(|node| &node.action)
    }

    /// The actions in recording order. The returned vector is a copy.
    pub fn deployment_actions(&self) -> Vec<DeploymentAction> {
        self.action_nodes()
            .into_iter()
            .map(|node| node.action.clone())
            .collect()
    }

    /// The directives of every phase, oldest first. The returned vectors are copies.
    pub fn server_group_deployment_plans(&self) -> Vec<Vec<ServerGroupDeploymentPlan>> {
        self.phases()
            .into_iter()
            .map(|phase| phase.directives.clone())
            .collect()
    }

    pub fn has_server_group_plans(&self) -> bool {
        self.sealed_count > 0 || !self.current.is_empty()
    }

    /// The directive most recently stored into the current phase.
    pub fn latest_server_group_deployment_plan(&self) -> Option<&ServerGroupDeploymentPlan> {
        self.current
            .latest
            .and_then(|index| self.current.directives.get(index))
    }

    /// Every action with the groups it targets: the directives of its own
    /// phase followed by those of the action-less phases rolled to after it.
    pub fn targeted_actions(&self) -> Vec<TargetedAction> {
        let phases = self.phases();
        let nodes = self.action_nodes();
        let mut has_actions = vec![false; phases.len()];
        for node in &nodes {
            has_actions[node.phase] = true;
        }

        nodes
            .into_iter()
            .map(|node| {
                let mut targets: Vec<ServerGroupDeploymentPlan> = Vec::new();
                let rolled = (node.phase + 1..phases.len()).take_while(|&p| !has_actions[p]);
                for phase in std::iter::once(node.phase).chain(rolled) {
                    for directive in &phases[phase].directives {
                        if !targets.contains(directive) {
                            targets.push(directive.clone());
                        }
                    }
                }
                TargetedAction {
                    action: node.action.clone(),
                    phase: node.phase,
                    targets,
                }
            })
            .collect()
    }

    fn action_nodes(&self) -> Vec<&ActionNode> {
        let mut nodes = Vec::with_capacity(self.action_count);
        let mut cursor = self.head.as_deref();
        while let Some(node) = cursor {
            nodes.push(node);
            cursor = node.prev.as_deref();
        }
        nodes.reverse();
        nodes
    }

    fn phases(&self) -> Vec<Arc<Phase>> {
        let mut phases = Vec::with_capacity(self.sealed_count + 1);
        phases.push(Arc::clone(&self.current));
        let mut cursor = self.sealed.as_deref();
        while let Some(node) = cursor {
            phases.push(Arc::clone(&node.phase));
            cursor = node.prev.as_deref();
        }
        phases.reverse();
        phases
    }
}
