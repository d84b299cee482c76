use crate::config::ControllerConfig;
use crate::engine::{CancellationHandle, PropagationOptions, UpdatePropagationEngine};
use crate::error::{ControllerError, Result};
use crate::event_bus::EventBus;
use crate::executor::DeploymentPlanExecutor;
use crate::host::HostExecutor;
use domain_client::{DeploymentSetPlan, DomainCommand, DomainResponse, DomainUpdateApplierResponse};
use domain_model::{DomainModel, DomainUpdate, PropagationOutcome};
use log::{info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// The authoritative owner of the domain model.
///
/// Updates and plans submitted concurrently are serialized on the model lock,
/// so each one sees the model its predecessor left behind.
pub struct DomainController<H: HostExecutor> {
    model: Mutex<DomainModel>,
    engine: Arc<UpdatePropagationEngine<H>>,
    executor: DeploymentPlanExecutor<H>,
    executed_plans: Mutex<HashSet<Uuid>>,
    config: ControllerConfig,
    event_bus: EventBus,
}

impl<H: HostExecutor + 'static> DomainController<H> {
    pub fn new(model: DomainModel, hosts: Arc<H>, config: ControllerConfig) -> Result<Self> {
        config.validate()?;
        model.validate().map_err(ControllerError::InvalidModel)?;

        let event_bus = EventBus::new(config.event_capacity);
        let engine = Arc::new(UpdatePropagationEngine::new(hosts, event_bus.clone(), &config));
        let executor = DeploymentPlanExecutor::new(Arc::clone(&engine), event_bus.clone());
        info!(
            "DomainController: Managing {} host(s), {} server group(s).",
            model.hosts().len(),
            model.server_groups().len()
        );

        Ok(Self {
            model: Mutex::new(model),
            engine,
            executor,
            executed_plans: Mutex::new(HashSet::new()),
            config,
            event_bus,
        })
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn hosts(&self) -> &Arc<H> {
        self.engine.hosts()
    }

    /// A snapshot of the current domain model.
    pub async fn model(&self) -> DomainModel {
        self.model.lock().await.clone()
    }

    /// Submits a single update, rolling back on host failure as configured.
    pub async fn submit_update(&self, update: &DomainUpdate) -> PropagationOutcome {
        self.submit_update_with(update, self.config.rollback_single_updates, None)
            .await
    }

    pub async fn submit_update_with(
        &self,
        update: &DomainUpdate,
        rollback: bool,
        cancellation: Option<CancellationHandle>,
    ) -> PropagationOutcome {
        let options = PropagationOptions {
            cancellation,
            ..PropagationOptions::with_rollback(rollback)
        };
        let mut model = self.model.lock().await;
        self.engine.propagate(&mut model, update, &options).await
    }

    /// Executes a plan. A plan id is executed at most once.
    pub async fn submit_plan(&self, plan: &DeploymentSetPlan) -> Result<DomainUpdateApplierResponse> {
        self.submit_plan_with_cancellation(plan, &CancellationHandle::new())
            .await
    }

    pub async fn submit_plan_with_cancellation(
        &self,
        plan: &DeploymentSetPlan,
        cancellation: &CancellationHandle,
    ) -> Result<DomainUpdateApplierResponse> {
        if !self.executed_plans.lock().await.insert(plan.id()) {
            warn!("DomainController: Plan {} resubmitted, rejecting.", plan.id());
            return Err(ControllerError::PlanAlreadyExecuted(plan.id()));
        }
        let mut model = self.model.lock().await;
        Ok(self.executor.execute(&mut model, plan, cancellation).await)
    }

    pub async fn handle_command(&self, cmd: DomainCommand) -> DomainResponse {
        match cmd {
            DomainCommand::SubmitPlan(plan) => match self.submit_plan(&plan).await {
                Ok(response) => DomainResponse::PlanApplied(response),
                Err(e) => DomainResponse::Error(e.to_string()),
            },
            DomainCommand::SubmitUpdate { update, rollback } => {
                DomainResponse::UpdateApplied(self.submit_update_with(&update, rollback, None).await)
            }
            DomainCommand::GetModel => DomainResponse::Model(self.model().await),
        }
    }
}
