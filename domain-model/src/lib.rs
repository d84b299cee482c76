//! # Domain Model
//!
//! The configuration model held by the domain controller and the updates that
//! change it.
//!
//! ## Modules
//! - `model`: The hierarchical model tree (domain, profiles, server groups, hosts, servers).
//! - `update`: Domain-level updates and the subordinate updates hosts apply to running servers.
//! - `outcome`: The result of propagating one update across the domain.
//! - `error`: The failure taxonomy shared by every layer.

pub mod error;
pub mod model;
pub mod outcome;
pub mod update;

pub use error::{ElementKind, UpdateFailure};
pub use model::{
    ContentHash, DeploymentUnit, DomainModel, HostId, HostModel, PathElement, ProfileElement,
    PropertiesElement, ServerElement, ServerGroupElement, ServerIdentity, ServerState,
};
pub use outcome::{DispatchPhase, HostFailure, PropagationOutcome};
pub use update::{DomainUpdate, ServerUpdate};
