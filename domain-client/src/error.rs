use thiserror::Error;

/// Raised when a plan builder call would break the plan's invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("illegal plan state: {0}")]
    State(String),

    #[error("malformed plan: {0}")]
    Malformed(String),
}

impl PlanError {
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }
}
