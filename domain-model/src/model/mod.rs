pub mod domain;
pub mod element;
pub mod host;
pub mod ids;
pub mod server_state;

pub use domain::{DomainModel, ProfileElement, ServerGroupElement};
pub use element::{DeploymentUnit, PathElement, PropertiesElement};
pub use host::{HostModel, ServerElement};
pub use ids::{ContentHash, HostId, ServerIdentity};
pub use server_state::ServerState;
