//! # Deployment Plan Executor
//!
//! Runs the actions of a [`DeploymentSetPlan`] strictly in order, one
//! [`DomainUpdate`] per action, through the propagation engine, and folds
//! every outcome into a [`DomainUpdateApplierResponse`].
//!
//! A domain failure halts the plan: every later action is reported as
//! cancelled and never reaches the engine. In a rollback plan the same holds
//! for an action the engine had to roll back, and the actions applied before
//! it are compensated in reverse order before the response is returned.

mod aggregate;
mod translate;

pub use translate::action_update;

use crate::engine::{
    CancellationHandle, FailureTolerance, PropagationOptions, RollbackPolicy, UpdatePropagationEngine,
};
use crate::event_bus::{ControllerEvent, EventBus};
use crate::host::HostExecutor;
use domain_client::{
    DeploymentActionResult, DeploymentSetPlan, DomainUpdateApplierResponse, TargetedAction,
};
use domain_model::{DomainModel, DomainUpdate, PropagationOutcome, ServerIdentity};
use log::{error, info, warn};
use std::collections::BTreeSet;
use std::sync::Arc;

/// An action whose change reached the domain model and is still in place.
struct AppliedAction {
    index: usize,
    compensation: Option<DomainUpdate>,
    servers: BTreeSet<ServerIdentity>,
}

pub struct DeploymentPlanExecutor<H: HostExecutor> {
    engine: Arc<UpdatePropagationEngine<H>>,
    event_bus: EventBus,
}

impl<H: HostExecutor + 'static> DeploymentPlanExecutor<H> {
    pub fn new(engine: Arc<UpdatePropagationEngine<H>>, event_bus: EventBus) -> Self {
        Self { engine, event_bus }
    }

    pub async fn execute(
        &self,
        model: &mut DomainModel,
        plan: &DeploymentSetPlan,
        cancellation: &CancellationHandle,
    ) -> DomainUpdateApplierResponse {
        let plan_id = plan.id();
        let steps = plan.targeted_actions();
        info!(
            "Executor: Starting plan {} ({} action(s), {} phase(s), rollback={}).",
            plan_id,
            steps.len(),
            plan.phase_count(),
            plan.is_rollback()
        );
        if plan.is_shutdown() {
            info!(
                "Executor: Plan {} asks for a server restart (graceful timeout {} ms).",
                plan_id,
                plan.graceful_shutdown_timeout_ms()
            );
        }
        self.event_bus.publish(ControllerEvent::PlanStarted {
            plan_id,
            actions: steps.len(),
            rollback: plan.is_rollback(),
        });

        let snapshot = model.clone();
        let mut response = DomainUpdateApplierResponse::new(plan_id);
        let mut results: Vec<DeploymentActionResult> = Vec::with_capacity(steps.len());
        let mut applied: Vec<AppliedAction> = Vec::new();
        let mut halted = false;
        let mut failed = false;

        for (index, step) in steps.iter().enumerate() {
            let mut result = DeploymentActionResult::new(step.action.clone());
            let groups = target_groups(step);

            if halted || cancellation.is_cancelled() {
                if !halted {
                    info!("Executor: Plan {} cancelled before {}.", plan_id, step.action);
                    response.mark_cancelled();
                    halted = true;
                }
                for group in &groups {
                    result.group_result_mut(group);
                }
                result.mark_cancelled_by_domain();
                results.push(result);
                continue;
            }

            let update = match action_update(model, step) {
                Ok(update) => update,
                Err(cause) => {
                    warn!("Executor: {} cannot be carried out: {}", step.action, cause);
                    response.record_domain_failure(cause.clone());
                    result.set_domain_controller_failure(cause);
                    results.push(result);
                    halted = true;
                    failed = true;
                    continue;
                }
            };

            let options = PropagationOptions {
                rollback: rollback_policy(plan, step),
                sequential: step.targets.iter().any(|d| d.is_rolling_to_servers()),
                only_servers: None,
                cancellation: Some(cancellation.clone()),
            };
            let compensation = update.compensating_update(model);
            let outcome = self.engine.propagate(model, &update, &options).await;
            aggregate::record_outcome(&mut result, &outcome, &groups);

            match &outcome {
                PropagationOutcome::DomainFailure(cause) => {
                    warn!("Executor: {} failed on the domain: {}", step.action, cause);
                    response.record_domain_failure(cause.clone());
                    halted = true;
                    failed = true;
                }
                PropagationOutcome::Cancelled => {
                    info!("Executor: Plan {} cancelled at {}.", plan_id, step.action);
                    response.mark_cancelled();
                    halted = true;
                }
                PropagationOutcome::PartiallyFailed {
                    rolled_back: true, ..
                } => {
                    warn!("Executor: {} was rolled back.", step.action);
                    if plan.is_rollback() {
                        response.mark_rolled_back();
                        halted = true;
                        failed = true;
                    }
                }
                PropagationOutcome::Committed(_) | PropagationOutcome::PartiallyFailed { .. } => {
                    applied.push(AppliedAction {
                        index,
                        compensation,
                        servers: succeeded_servers(&outcome),
                    });
                }
            }
            results.push(result);
        }

        if failed && plan.is_rollback() && !applied.is_empty() {
            self.roll_back(model, &snapshot, &mut applied, &mut results)
                .await;
            response.mark_rolled_back();
        }

        let updated: BTreeSet<ServerIdentity> = applied
            .iter()
            .flat_map(|a| a.servers.iter().cloned())
            .collect();
        response.set_updated_servers(updated);

        for result in results {
            self.event_bus.publish(ControllerEvent::PlanActionCompleted {
                plan_id,
                action_id: result.action_id(),
                classification: result.classification(),
            });
            response.push_action_result(result);
        }

        let status = response.status();
        info!("Executor: Plan {} finished: {:?}.", plan_id, status);
        self.event_bus
            .publish(ControllerEvent::PlanCompleted { plan_id, status });
        response
    }

    /// Compensates every applied action, last first, on the servers it reached.
    ///
    /// The domain model always ends up equal to `snapshot`, even when a
    /// compensation is missing or rejected by the model.
    async fn roll_back(
        &self,
        model: &mut DomainModel,
        snapshot: &DomainModel,
        applied: &mut Vec<AppliedAction>,
        results: &mut [DeploymentActionResult],
    ) {
        info!("Executor: Rolling back {} applied action(s).", applied.len());
        let mut restored = true;

        while let Some(action) = applied.pop() {
            let result = &mut results[action.index];
            let Some(compensation) = action.compensation else {
                warn!(
                    "Executor: {} has no compensating update.",
                    result.deployment_action()
                );
                result.mark_rolled_back_on_domain();
                restored = false;
                continue;
            };

            let options = PropagationOptions {
                rollback: RollbackPolicy::never(),
                only_servers: Some(action.servers),
                ..Default::default()
            };
            let outcome = self.engine.propagate(model, &compensation, &options).await;
            if !aggregate::record_compensation(result, &outcome) {
                error!(
                    "Executor: Compensating {} failed: {:?}",
                    result.deployment_action(),
                    outcome.domain_failure()
                );
                result.mark_rolled_back_on_domain();
                restored = false;
            }
        }

        if !restored || model != snapshot {
            warn!("Executor: Restoring the domain model from the pre-plan snapshot.");
            *model = snapshot.clone();
        }
    }
}

fn target_groups(step: &TargetedAction) -> Vec<String> {
    step.targets
        .iter()
        .map(|d| d.server_group_name().to_string())
        .collect()
}

/// The plan flag or any directive enables rollback; directives set tolerances.
fn rollback_policy(plan: &DeploymentSetPlan, step: &TargetedAction) -> RollbackPolicy {
    let enabled = plan.is_rollback() || step.targets.iter().any(|d| d.is_rollback());
    step.targets
        .iter()
        .fold(RollbackPolicy::from_flag(enabled), |policy, d| {
            policy.tolerate(
                d.server_group_name(),
                FailureTolerance {
                    max_failures: d.max_server_failures(),
                    max_failure_percentage: d.max_server_failure_percentage(),
                },
            )
        })
}

fn succeeded_servers(outcome: &PropagationOutcome) -> BTreeSet<ServerIdentity> {
    match outcome {
        PropagationOutcome::Committed(servers) => servers.clone(),
        PropagationOutcome::PartiallyFailed {
            affected_servers,
            host_failures,
            ..
        } => affected_servers
            .iter()
            .filter(|s| !host_failures.contains_key(s.host()))
            .cloned()
            .collect(),
        PropagationOutcome::DomainFailure(_) | PropagationOutcome::Cancelled => BTreeSet::new(),
    }
}
