pub mod action;
pub mod error;
pub mod messages;
pub mod plan;
pub mod result;

pub use action::{ContentReference, DeploymentAction, DeploymentActionType};
pub use error::PlanError;
pub use messages::{DomainCommand, DomainResponse};
pub use plan::{DeploymentSetPlan, ServerGroupDeploymentPlan, TargetedAction};
pub use result::{
    ActionClassification, DeploymentActionResult, DomainUpdateApplierResponse, PlanStatus,
    ServerGroupDeploymentActionResult, ServerUpdateResult,
};
