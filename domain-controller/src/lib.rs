//! # Domain Controller
//!
//! Holds the authoritative domain model and propagates every change to the
//! hosts running the affected servers.
//!
//! ## Modules
//! - `engine`: The update propagation engine (domain apply, concurrent host dispatch, rollback).
//! - `executor`: Runs deployment plans action by action and aggregates their results.
//! - `host`: The host executor seam and an in-memory implementation.
//! - `controller`: The [`DomainController`] service facade.
//! - `event_bus`: Broadcast of update and plan lifecycle events.
//! - `config`: File and environment configuration.

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod event_bus;
pub mod executor;
pub mod host;

pub use config::ControllerConfig;
pub use controller::DomainController;
pub use engine::{
    CancellationHandle, FailureTolerance, PropagationOptions, RollbackPolicy, UpdatePropagationEngine,
};
pub use error::{ControllerError, Result};
pub use event_bus::{ControllerEvent, EventBus, EventEnvelope, UpdateState};
pub use executor::DeploymentPlanExecutor;
pub use host::{HostExecutor, LocalHostExecutor};
