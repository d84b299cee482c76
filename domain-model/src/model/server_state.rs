use super::element::{DeploymentUnit, PathElement, PropertiesElement};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The effective configuration held by one running server.
///
/// Hosts mutate this through [`crate::ServerUpdate::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerState {
    #[serde(default)]
    system_properties: PropertiesElement,
    #[serde(default)]
    paths: BTreeMap<String, PathElement>,
    #[serde(default)]
    subsystems: BTreeSet<String>,
    #[serde(default)]
    deployments: BTreeMap<String, DeploymentUnit>,
}

impl ServerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn system_properties(&self) -> &PropertiesElement {
        &self.system_properties
    }

    pub fn system_properties_mut(&mut self) -> &mut PropertiesElement {
        &mut self.system_properties
    }

    pub fn path(&self, name: &str) -> Option<&PathElement> {
        self.paths.get(name)
    }

    pub fn paths(&self) -> &BTreeMap<String, PathElement> {
        &self.paths
    }

    /// Inserts or overwrites a path.
    pub fn put_path(&mut self, path: PathElement) -> Option<PathElement> {
        self.paths.insert(path.name().to_string(), path)
    }

    pub fn take_path(&mut self, name: &str) -> Option<PathElement> {
        self.paths.remove(name)
    }

    pub fn subsystems(&self) -> &BTreeSet<String> {
        &self.subsystems
    }

    /// Returns `false` if the subsystem was already present.
    pub fn put_subsystem(&mut self, namespace: &str) -> bool {
        self.subsystems.insert(namespace.to_string())
    }

    pub fn take_subsystem(&mut self, namespace: &str) -> bool {
        self.subsystems.remove(namespace)
    }

    pub fn deployment(&self, unique_name: &str) -> Option<&DeploymentUnit> {
        self.deployments.get(unique_name)
    }

    pub fn deployments(&self) -> &BTreeMap<String, DeploymentUnit> {
        &self.deployments
    }

    pub fn put_deployment(&mut self, unit: DeploymentUnit) -> Option<DeploymentUnit> {
        self.deployments.insert(unit.unique_name().to_string(), unit)
    }

    pub fn take_deployment(&mut self, unique_name: &str) -> Option<DeploymentUnit> {
        self.deployments.remove(unique_name)
    }
}
