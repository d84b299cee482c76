use super::{ActionNode, DeploymentSetPlan, Phase, PhaseNode, ServerGroupDeploymentPlan};
use crate::action::{DeploymentAction, DeploymentActionType};
use crate::error::PlanError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Flat wire form of a plan: actions tagged with their phase index, then the
/// directives of every phase.
#[derive(Serialize, Deserialize)]
pub struct PlanRepr {
    #[serde(default = "Uuid::new_v4")]
    id: Uuid,
    #[serde(default)]
    actions: Vec<ActionEntry>,
    #[serde(default)]
    phases: Vec<Vec<ServerGroupDeploymentPlan>>,
    #[serde(default)]
    rollback: bool,
    #[serde(default)]
    shutdown: bool,
    #[serde(default = "indefinite")]
    graceful_shutdown_timeout_ms: i64,
}

#[derive(Serialize, Deserialize)]
struct ActionEntry {
    #[serde(default)]
    phase: usize,
    #[serde(flatten)]
    action: DeploymentAction,
}

fn indefinite() -> i64 {
    super::INDEFINITE_TIMEOUT_MS
}

impl From<DeploymentSetPlan> for PlanRepr {
    fn from(plan: DeploymentSetPlan) -> Self {
        let actions = plan
            .action_nodes()
            .into_iter()
            .map(|node| ActionEntry {
                phase: node.phase,
                action: node.action.clone(),
            })
            .collect();
        Self {
            id: plan.id,
            actions,
            phases: plan.server_group_deployment_plans(),
            rollback: plan.rollback,
            shutdown: plan.shutdown,
            graceful_shutdown_timeout_ms: plan.graceful_shutdown_timeout_ms,
        }
    }
}

impl TryFrom<PlanRepr> for DeploymentSetPlan {
    type Error = PlanError;

    fn try_from(repr: PlanRepr) -> Result<Self, Self::Error> {
        let mut plan = DeploymentSetPlan::new();
        plan.id = repr.id;
        plan.rollback = repr.rollback;
        plan.shutdown = repr.shutdown;
        plan.graceful_shutdown_timeout_ms = repr.graceful_shutdown_timeout_ms;

        if repr.actions.is_empty() && repr.phases.iter().any(|p| !p.is_empty()) {
            return Err(PlanError::Malformed(
                "server groups targeted by a plan without actions".into(),
            ));
        }

        let last_phase = repr.phases.len().saturating_sub(1);
        for (index, directives) in repr.phases.into_iter().enumerate() {
            let phase = Arc::new(Phase::from_directives(directives)?);
            if index < last_phase {
                if phase.is_empty() {
                    return Err(PlanError::Malformed(format!("phase {} is empty", index)));
                }
                plan.sealed = Some(Arc::new(PhaseNode {
                    phase,
                    prev: plan.sealed.take(),
                }));
                plan.sealed_count += 1;
            } else {
                plan.current = phase;
            }
        }

        let mut previous_phase = 0;
        for entry in repr.actions {
            if entry.phase < previous_phase || entry.phase > last_phase {
                return Err(PlanError::Malformed(format!(
                    "action {} has out-of-order phase {}",
                    entry.action, entry.phase
                )));
            }
            if entry.action.action_type() == DeploymentActionType::Remove {
                let follows_undeploy = plan.last_action().is_some_and(|last| {
                    last.action_type() == DeploymentActionType::Undeploy
                        && last.unique_name() == entry.action.unique_name()
                });
                if !follows_undeploy {
                    return Err(PlanError::state(format!(
                        "{} does not follow an UNDEPLOY of the same content",
                        entry.action
                    )));
                }
            }
            previous_phase = entry.phase;
            plan.head = Some(Arc::new(ActionNode {
                action: entry.action,
                phase: entry.phase,
                prev: plan.head.take(),
            }));
            plan.action_count += 1;
        }
        Ok(plan)
    }
}
