use crate::plan::DeploymentSetPlan;
use crate::result::DomainUpdateApplierResponse;
use domain_model::{DomainModel, DomainUpdate, PropagationOutcome};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum DomainCommand {
    SubmitPlan(DeploymentSetPlan),
    SubmitUpdate { update: DomainUpdate, rollback: bool },
    GetModel,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum DomainResponse {
    PlanApplied(DomainUpdateApplierResponse),
    UpdateApplied(PropagationOutcome),
    Model(DomainModel),
    Error(String),
}
