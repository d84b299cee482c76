use super::element::{DeploymentUnit, PathElement, PropertiesElement};
use super::host::{HostModel, ServerElement};
use super::ids::{HostId, ServerIdentity};
use super::server_state::ServerState;
use crate::error::{ElementKind, UpdateFailure};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A named set of subsystem configurations shared by server groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileElement {
    name: String,
    #[serde(default)]
    subsystems: BTreeSet<String>,
}

impl ProfileElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subsystems: BTreeSet::new(),
        }
    }

    pub fn with_subsystem(mut self, namespace: impl Into<String>) -> Self {
        self.subsystems.insert(namespace.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subsystems(&self) -> &BTreeSet<String> {
        &self.subsystems
    }

    pub fn has_subsystem(&self, namespace: &str) -> bool {
        self.subsystems.contains(namespace)
    }

    pub fn add_subsystem(&mut self, namespace: &str) -> Result<(), UpdateFailure> {
        if !self.subsystems.insert(namespace.to_string()) {
            return Err(UpdateFailure::constraint(format!(
                "subsystem '{}' already configured in profile '{}'",
                namespace, self.name
            )));
        }
        Ok(())
    }

    pub fn remove_subsystem(&mut self, namespace: &str) -> Result<(), UpdateFailure> {
        if !self.subsystems.remove(namespace) {
            return Err(UpdateFailure::not_found(ElementKind::Subsystem, namespace));
        }
        Ok(())
    }
}

/// A named set of servers sharing a profile and a set of deployments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerGroupElement {
    name: String,
    profile: String,
    #[serde(default)]
    deployments: BTreeMap<String, DeploymentUnit>,
    #[serde(default)]
    system_properties: PropertiesElement,
}

impl ServerGroupElement {
    pub fn new(name: impl Into<String>, profile: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            profile: profile.into(),
            deployments: BTreeMap::new(),
            system_properties: PropertiesElement::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn deployment(&self, unique_name: &str) -> Option<&DeploymentUnit> {
        self.deployments.get(unique_name)
    }

    pub fn deployments(&self) -> &BTreeMap<String, DeploymentUnit> {
        &self.deployments
    }

    pub fn has_deployment(&self, unique_name: &str) -> bool {
        self.deployments.contains_key(unique_name)
    }

    pub fn add_deployment(&mut self, unit: DeploymentUnit) -> Result<(), UpdateFailure> {
        if self.deployments.contains_key(unit.unique_name()) {
            return Err(UpdateFailure::constraint(format!(
                "deployment '{}' already present in server group '{}'",
                unit.unique_name(),
                self.name
            )));
        }
        self.deployments.insert(unit.unique_name().to_string(), unit);
        Ok(())
    }

    pub fn remove_deployment(&mut self, unique_name: &str) -> Result<DeploymentUnit, UpdateFailure> {
        self.deployments.remove(unique_name).ok_or_else(|| {
            UpdateFailure::not_found(
                ElementKind::ServerGroupDeployment,
                format!("{}:{}", self.name, unique_name),
            )
        })
    }

    pub fn system_properties(&self) -> &PropertiesElement {
        &self.system_properties
    }

    pub fn system_properties_mut(&mut self) -> &mut PropertiesElement {
        &mut self.system_properties
    }
}

/// The authoritative configuration of the whole domain.
///
/// Children are owned exclusively and keyed by name, so sibling names are
/// unique by construction. Every `add_*` refuses duplicates and every
/// `remove_*` refuses to leave a dangling reference behind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainModel {
    #[serde(default)]
    profiles: BTreeMap<String, ProfileElement>,
    #[serde(default)]
    server_groups: BTreeMap<String, ServerGroupElement>,
    #[serde(default)]
    paths: BTreeMap<String, PathElement>,
    #[serde(default)]
    system_properties: PropertiesElement,
    #[serde(default)]
    deployments: BTreeMap<String, DeploymentUnit>,
    #[serde(default)]
    hosts: BTreeMap<HostId, HostModel>,
}

impl DomainModel {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Profiles ---

    pub fn profile(&self, name: &str) -> Option<&ProfileElement> {
        self.profiles.get(name)
    }

    pub fn profiles(&self) -> &BTreeMap<String, ProfileElement> {
        &self.profiles
    }

    pub fn profile_mut(&mut self, name: &str) -> Result<&mut ProfileElement, UpdateFailure> {
        self.profiles
            .get_mut(name)
            .ok_or_else(|| UpdateFailure::not_found(ElementKind::Profile, name))
    }

    pub fn add_profile(&mut self, profile: ProfileElement) -> Result<(), UpdateFailure> {
        if self.profiles.contains_key(profile.name()) {
            return Err(UpdateFailure::constraint(format!(
                "profile '{}' already exists",
                profile.name()
            )));
        }
        self.profiles.insert(profile.name().to_string(), profile);
        Ok(())
    }

    pub fn remove_profile(&mut self, name: &str) -> Result<ProfileElement, UpdateFailure> {
        if !self.profiles.contains_key(name) {
            return Err(UpdateFailure::not_found(ElementKind::Profile, name));
        }
        if let Some(group) = self.server_groups.values().find(|g| g.profile() == name) {
            return Err(UpdateFailure::constraint(format!(
                "profile '{}' is still used by server group '{}'",
                name,
                group.name()
            )));
        }
        self.profiles
            .remove(name)
            .ok_or_else(|| UpdateFailure::not_found(ElementKind::Profile, name))
    }

    // --- Server Groups ---

    pub fn server_group(&self, name: &str) -> Option<&ServerGroupElement> {
        self.server_groups.get(name)
    }

    pub fn server_groups(&self) -> &BTreeMap<String, ServerGroupElement> {
        &self.server_groups
    }

    pub fn server_group_mut(&mut self, name: &str) -> Result<&mut ServerGroupElement, UpdateFailure> {
        self.server_groups
            .get_mut(name)
            .ok_or_else(|| UpdateFailure::not_found(ElementKind::ServerGroup, name))
    }

    pub fn add_server_group(&mut self, group: ServerGroupElement) -> Result<(), UpdateFailure> {
        if self.server_groups.contains_key(group.name()) {
            return Err(UpdateFailure::constraint(format!(
                "server group '{}' already exists",
                group.name()
            )));
        }
        if !self.profiles.contains_key(group.profile()) {
            return Err(UpdateFailure::not_found(ElementKind::Profile, group.profile()));
        }
        if let Some(missing) = group
            .deployments()
            .keys()
            .find(|name| !self.deployments.contains_key(*name))
        {
            return Err(UpdateFailure::not_found(ElementKind::Deployment, missing.clone()));
        }
        self.server_groups.insert(group.name().to_string(), group);
        Ok(())
    }

    pub fn remove_server_group(&mut self, name: &str) -> Result<ServerGroupElement, UpdateFailure> {
        let group = self
            .server_groups
            .get(name)
            .ok_or_else(|| UpdateFailure::not_found(ElementKind::ServerGroup, name))?;
        if !group.deployments().is_empty() {
            return Err(UpdateFailure::constraint(format!(
                "server group '{}' still has {} deployment(s)",
                name,
                group.deployments().len()
            )));
        }
        if let Some(server) = self.all_servers().find(|s| s.server_group() == name) {
            return Err(UpdateFailure::constraint(format!(
                "server group '{}' is still used by server '{}'",
                name, server
            )));
        }
        self.server_groups
            .remove(name)
            .ok_or_else(|| UpdateFailure::not_found(ElementKind::ServerGroup, name))
    }

    /// Names of every server group that currently holds `unique_name`.
    pub fn groups_holding(&self, unique_name: &str) -> Vec<String> {
        self.server_groups
            .values()
            .filter(|g| g.has_deployment(unique_name))
            .map(|g| g.name().to_string())
            .collect()
    }

    // --- Paths & Properties ---

    pub fn path(&self, name: &str) -> Option<&PathElement> {
        self.paths.get(name)
    }

    pub fn paths(&self) -> &BTreeMap<String, PathElement> {
        &self.paths
    }

    pub fn add_path(&mut self, path: PathElement) -> Result<(), UpdateFailure> {
        if self.paths.contains_key(path.name()) {
            return Err(UpdateFailure::constraint(format!(
                "path '{}' already exists",
                path.name()
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

    // --- Content Repository ---

    pub fn deployment(&self, unique_name: &str) -> Option<&DeploymentUnit> {
        self.deployments.get(unique_name)
    }

    pub fn deployments(&self) -> &BTreeMap<String, DeploymentUnit> {
        &self.deployments
    }

    pub fn add_deployment(&mut self, unit: DeploymentUnit) -> Result<(), UpdateFailure> {
        if self.deployments.contains_key(unit.unique_name()) {
            return Err(UpdateFailure::constraint(format!(
                "deployment '{}' already exists",
                unit.unique_name()
            )));
        }
        self.deployments.insert(unit.unique_name().to_string(), unit);
        Ok(())
    }

    pub fn remove_deployment(&mut self, unique_name: &str) -> Result<DeploymentUnit, UpdateFailure> {
        if !self.deployments.contains_key(unique_name) {
            return Err(UpdateFailure::not_found(ElementKind::Deployment, unique_name));
        }
        if let Some(group) = self.groups_holding(unique_name).first() {
            return Err(UpdateFailure::constraint(format!(
                "deployment '{}' is still deployed to server group '{}'",
                unique_name, group
            )));
        }
        self.deployments
            .remove(unique_name)
            .ok_or_else(|| UpdateFailure::not_found(ElementKind::Deployment, unique_name))
    }

    // --- Hosts ---

    pub fn host(&self, id: &HostId) -> Option<&HostModel> {
        self.hosts.get(id)
    }

    pub fn hosts(&self) -> &BTreeMap<HostId, HostModel> {
        &self.hosts
    }

    pub fn host_mut(&mut self, id: &HostId) -> Result<&mut HostModel, UpdateFailure> {
        self.hosts
            .get_mut(id)
            .ok_or_else(|| UpdateFailure::not_found(ElementKind::Host, id.as_str()))
    }

    /// Registers a host. Every server it declares must belong to a known server group.
    pub fn register_host(&mut self, host: HostModel) -> Result<(), UpdateFailure> {
        if self.hosts.contains_key(host.name()) {
            return Err(UpdateFailure::constraint(format!(
                "host '{}' is already registered",
                host.name()
            )));
        }
        if let Some(server) = host
            .servers()
            .values()
            .find(|s| !self.server_groups.contains_key(s.group()))
        {
            return Err(UpdateFailure::not_found(ElementKind::ServerGroup, server.group()));
        }
        self.hosts.insert(host.name().clone(), host);
        Ok(())
    }

    /// Every server of every host, running or not.
    pub fn all_servers(&self) -> impl Iterator<Item = ServerIdentity> + '_ {
        self.hosts.values().flat_map(|host| {
            host.servers()
                .values()
                .map(move |s| ServerIdentity::new(host.name().clone(), s.name(), s.group()))
        })
    }

    /// Every started server together with its host and server element.
    pub fn active_servers(
        &self,
    ) -> impl Iterator<Item = (ServerIdentity, &HostModel, &ServerElement)> + '_ {
        self.hosts.values().flat_map(|host| {
            host.active_servers().map(move |s| {
                (
                    ServerIdentity::new(host.name().clone(), s.name(), s.group()),
                    host,
                    s,
                )
            })
        })
    }

    /// Checks the referential integrity of a model loaded from a checkpoint.
    pub fn validate(&self) -> Result<(), UpdateFailure> {
        for group in self.server_groups.values() {
            if !self.profiles.contains_key(group.profile()) {
                return Err(UpdateFailure::not_found(ElementKind::Profile, group.profile()));
            }
            for name in group.deployments().keys() {
                if !self.deployments.contains_key(name) {
                    return Err(UpdateFailure::not_found(ElementKind::Deployment, name.clone()));
                }
            }
        }
        for server in self.all_servers() {
            if !self.server_groups.contains_key(server.server_group()) {
                return Err(UpdateFailure::not_found(
                    ElementKind::ServerGroup,
                    server.server_group(),
                ));
            }
        }
        Ok(())
    }

    /// Computes the effective configuration a running server should hold.
    ///
    /// Properties resolve domain < server group < host < server, paths resolve
    /// domain < host < server.
    pub fn resolve_server_state(&self, server: &ServerIdentity) -> Result<ServerState, UpdateFailure> {
        let host = self
            .hosts
            .get(server.host())
            .ok_or_else(|| UpdateFailure::not_found(ElementKind::Host, server.host().as_str()))?;
        let element = host
            .server(server.server_name())
            .ok_or_else(|| UpdateFailure::not_found(ElementKind::Server, server.server_name()))?;
        let group = self
            .server_groups
            .get(element.group())
            .ok_or_else(|| UpdateFailure::not_found(ElementKind::ServerGroup, element.group()))?;

        let mut state = ServerState::new();
        for props in [
            &self.system_properties,
            group.system_properties(),
            host.system_properties(),
            element.system_properties(),
        ] {
            for (name, value) in props.iter() {
                state.system_properties_mut().set(name, value);
            }
        }
        for paths in [&self.paths, host.paths(), element.paths()] {
            for path in paths.values() {
                state.put_path(path.clone());
            }
        }
        if let Some(profile) = self.profiles.get(group.profile()) {
            for namespace in profile.subsystems() {
                state.put_subsystem(namespace);
            }
        }
        for unit in group.deployments().values() {
            state.put_deployment(unit.clone());
        }
        Ok(state)
    }
}
