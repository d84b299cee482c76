use super::element::{PathElement, PropertiesElement};
use super::ids::HostId;
use crate::error::{ElementKind, UpdateFailure};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_start() -> bool {
    true
}

/// A server managed by a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerElement {
    name: String,
    group: String,
    /// Whether the server is started. Stopped servers receive no updates.
    #[serde(default = "default_start")]
    start: bool,
    #[serde(default)]
    paths: BTreeMap<String, PathElement>,
    #[serde(default)]
    system_properties: PropertiesElement,
}

impl ServerElement {
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            start: true,
            paths: BTreeMap::new(),
            system_properties: PropertiesElement::new(),
        }
    }

    pub fn stopped(mut self) -> Self {
        self.start = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn is_active(&self) -> bool {
        self.start
    }

    pub fn path(&self, name: &str) -> Option<&PathElement> {
        self.paths.get(name)
    }

    pub fn paths(&self) -> &BTreeMap<String, PathElement> {
        &self.paths
    }

    pub fn add_path(&mut self, path: PathElement) -> Result<(), UpdateFailure> {
        if self.paths.contains_key(path.name()) {
            return Err(UpdateFailure::constraint(format!(
                "path '{}' already defined on server '{}'",
                path.name(),
                self.name
            )));
        }
        self.paths.insert(path.name().to_string(), path);
        Ok(())
    }

    pub fn remove_path(&mut self, name: &str) -> Result<PathElement, UpdateFailure> {
        self.paths
            .remove(name)
            .ok_or_else(|| UpdateFailure::not_found(ElementKind::Path, name))
    }

    pub fn system_properties(&self) -> &PropertiesElement {
        &self.system_properties
    }

    pub fn system_properties_mut(&mut self) -> &mut PropertiesElement {
        &mut self.system_properties
    }
}

/// The configuration of one host and the servers it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostModel {
    name: HostId,
    #[serde(default)]
    servers: BTreeMap<String, ServerElement>,
    #[serde(default)]
    paths: BTreeMap<String, PathElement>,
    #[serde(default)]
    system_properties: PropertiesElement,
}

impl HostModel {
    pub fn new(name: HostId) -> Self {
        Self {
            name,
            servers: BTreeMap::new(),
            paths: BTreeMap::new(),
            system_properties: PropertiesElement::new(),
        }
    }

    pub fn with_server(mut self, server: ServerElement) -> Self {
        self.servers.insert(server.name().to_string(), server);
        self
    }

    pub fn name(&self) -> &HostId {
        &self.name
    }

    pub fn server(&self, name: &str) -> Option<&ServerElement> {
        self.servers.get(name)
    }

    pub fn server_mut(&mut self, name: &str) -> Result<&mut ServerElement, UpdateFailure> {
        self.servers
            .get_mut(name)
            .ok_or_else(|| UpdateFailure::not_found(ElementKind::Server, name))
    }

    pub fn servers(&self) -> &BTreeMap<String, ServerElement> {
        &self.servers
    }

    pub fn active_servers(&self) -> impl Iterator<Item = &ServerElement> {
        self.servers.values().filter(|s| s.is_active())
    }

    pub fn path(&self, name: &str) -> Option<&PathElement> {
        self.paths.get(name)
    }

    pub fn paths(&self) -> &BTreeMap<String, PathElement> {
        &self.paths
    }

    pub fn system_properties(&self) -> &PropertiesElement {
        &self.system_properties
    }

    pub fn system_properties_mut(&mut self) -> &mut PropertiesElement {
        &mut self.system_properties
    }
}
