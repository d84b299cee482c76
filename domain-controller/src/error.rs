use domain_model::UpdateFailure;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid domain model: {0}")]
    InvalidModel(UpdateFailure),

    #[error("plan {0} was already executed")]
    PlanAlreadyExecuted(Uuid),
}

pub type Result<T> = std::result::Result<T, ControllerError>;
