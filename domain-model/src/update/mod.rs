//! Domain-level updates.
//!
//! Every configuration change is one variant of [`DomainUpdate`]. Each variant
//! knows how to apply itself to a [`DomainModel`], how to undo itself given
//! the model it is about to change, which update running servers must apply,
//! and which servers that concerns.

mod configuration;
mod deployment;
pub mod server;

pub use server::ServerUpdate;

use crate::error::UpdateFailure;
use crate::model::{
    DeploymentUnit, DomainModel, HostId, HostModel, PathElement, ProfileElement, ServerElement,
    ServerGroupElement, ServerIdentity,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DomainUpdate {
    AddProfile {
        profile: ProfileElement,
    },
    RemoveProfile {
        name: String,
    },
    AddSubsystem {
        profile: String,
        namespace: String,
    },
    RemoveSubsystem {
        profile: String,
        namespace: String,
    },
    AddServerGroup {
        group: ServerGroupElement,
    },
    RemoveServerGroup {
        name: String,
    },
    SetSystemProperty {
        name: String,
        value: String,
    },
    RemoveSystemProperty {
        name: String,
    },
    SetHostSystemProperty {
        host: HostId,
        name: String,
        value: String,
    },
    RemoveHostSystemProperty {
        host: HostId,
        name: String,
    },
    AddPath {
        path: PathElement,
    },
    RemovePath {
        name: String,
    },
    AddServerPath {
        host: HostId,
        server: String,
        path: PathElement,
    },
    RemoveServerPath {
        host: HostId,
        server: String,
        name: String,
    },
    /// Adds content to the repository (unless already present with the same
    /// hash) and to each listed server group.
    Deploy {
        content: DeploymentUnit,
        #[serde(default)]
        server_groups: Vec<String>,
    },
    /// Removes content from each listed server group and, optionally, from
    /// the repository.
    Undeploy {
        unique_name: String,
        #[serde(default)]
        server_groups: Vec<String>,
        #[serde(default)]
        remove_content: bool,
    },
    /// Swaps `to_replace` for `content` in each listed server group.
    Replace {
        to_replace: String,
        content: DeploymentUnit,
        #[serde(default)]
        server_groups: Vec<String>,
        #[serde(default)]
        remove_replaced_content: bool,
    },
}

impl DomainUpdate {
    /// Applies the update to `model`.
    ///
    /// Every precondition is checked before the first mutation, so a failed
    /// update leaves the model exactly as it found it.
    pub fn apply(&self, model: &mut DomainModel) -> Result<(), UpdateFailure> {
        match self {
            DomainUpdate::AddProfile { profile } => model.add_profile(profile.clone()),
            DomainUpdate::RemoveProfile { name } => model.remove_profile(name).map(|_| ()),
            DomainUpdate::AddSubsystem { profile, namespace } => {
                model.profile_mut(profile)?.add_subsystem(namespace)
            }
            DomainUpdate::RemoveSubsystem { profile, namespace } => {
                model.profile_mut(profile)?.remove_subsystem(namespace)
            }
            DomainUpdate::AddServerGroup { group } => model.add_server_group(group.clone()),
            DomainUpdate::RemoveServerGroup { name } => {
                model.remove_server_group(name).map(|_| ())
            }
            DomainUpdate::SetSystemProperty { name, value } => {
                model.system_properties_mut().set(name.clone(), value.clone());
                Ok(())
            }
            DomainUpdate::RemoveSystemProperty { name } => {
                configuration::remove_property(model.system_properties_mut(), name)
            }
            DomainUpdate::SetHostSystemProperty { host, name, value } => {
                model
                    .host_mut(host)?
                    .system_properties_mut()
                    .set(name.clone(), value.clone());
                Ok(())
            }
            DomainUpdate::RemoveHostSystemProperty { host, name } => {
                configuration::remove_property(model.host_mut(host)?.system_properties_mut(), name)
            }
            DomainUpdate::AddPath { path } => model.add_path(path.clone()),
            DomainUpdate::RemovePath { name } => model.remove_path(name).map(|_| ()),
            DomainUpdate::AddServerPath { host, server, path } => model
                .host_mut(host)?
                .server_mut(server)?
                .add_path(path.clone()),
            DomainUpdate::RemoveServerPath { host, server, name } => model
                .host_mut(host)?
                .server_mut(server)?
                .remove_path(name)
                .map(|_| ()),
            DomainUpdate::Deploy {
                content,
                server_groups,
            } => deployment::apply_deploy(model, content, server_groups),
            DomainUpdate::Undeploy {
                unique_name,
                server_groups,
                remove_content,
            } => deployment::apply_undeploy(model, unique_name, server_groups, *remove_content),
            DomainUpdate::Replace {
                to_replace,
                content,
                server_groups,
                remove_replaced_content,
            } => deployment::apply_replace(
                model,
                to_replace,
                content,
                server_groups,
                *remove_replaced_content,
            ),
        }
    }

    /// Computes the update that undoes this one.
    ///
    /// Must be called with the model as it is *before* [`Self::apply`].
    /// Returns `None` when the prior state is unknown (e.g. removing an
    /// element that does not exist) or the change cannot be undone.
    pub fn compensating_update(&self, original: &DomainModel) -> Option<DomainUpdate> {
        match self {
            DomainUpdate::Deploy {
                content,
                server_groups,
            } => deployment::deploy_compensation(original, content, server_groups),
            DomainUpdate::Undeploy {
                unique_name,
                server_groups,
                ..
            } => deployment::undeploy_compensation(original, unique_name, server_groups),
            DomainUpdate::Replace {
                to_replace,
                content,
                server_groups,
                ..
            } => deployment::replace_compensation(original, to_replace, content, server_groups),
            other => configuration::compensation(other, original),
        }
    }

    /// The update running servers must apply, or `None` for domain-only changes.
    pub fn subordinate_update(&self) -> Option<ServerUpdate> {
        match self {
            DomainUpdate::AddProfile { .. }
            | DomainUpdate::RemoveProfile { .. }
            | DomainUpdate::AddServerGroup { .. }
            | DomainUpdate::RemoveServerGroup { .. } => None,
            DomainUpdate::AddSubsystem { namespace, .. } => Some(ServerUpdate::AddSubsystem {
                namespace: namespace.clone(),
            }),
            DomainUpdate::RemoveSubsystem { namespace, .. } => {
                Some(ServerUpdate::RemoveSubsystem {
                    namespace: namespace.clone(),
                })
            }
            DomainUpdate::SetSystemProperty { name, value }
            | DomainUpdate::SetHostSystemProperty { name, value, .. } => {
                Some(ServerUpdate::SetSystemProperty {
                    name: name.clone(),
                    value: value.clone(),
                })
            }
            DomainUpdate::RemoveSystemProperty { name }
            | DomainUpdate::RemoveHostSystemProperty { name, .. } => {
                Some(ServerUpdate::RemoveSystemProperty { name: name.clone() })
            }
            DomainUpdate::AddPath { path } | DomainUpdate::AddServerPath { path, .. } => {
                Some(ServerUpdate::AddPath(path.clone()))
            }
            DomainUpdate::RemovePath { name } | DomainUpdate::RemoveServerPath { name, .. } => {
                Some(ServerUpdate::RemovePath { name: name.clone() })
            }
            DomainUpdate::Deploy {
                content,
                server_groups,
            } if !server_groups.is_empty() => Some(ServerUpdate::Deploy(content.clone())),
            DomainUpdate::Undeploy {
                unique_name,
                server_groups,
                ..
            } if !server_groups.is_empty() => Some(ServerUpdate::Undeploy {
                unique_name: unique_name.clone(),
            }),
            DomainUpdate::Replace {
                to_replace,
                content,
                server_groups,
                ..
            } if !server_groups.is_empty() => Some(ServerUpdate::Replace {
                to_replace: to_replace.clone(),
                replacement: content.clone(),
            }),
            DomainUpdate::Deploy { .. }
            | DomainUpdate::Undeploy { .. }
            | DomainUpdate::Replace { .. } => None,
        }
    }

    /// The update each of `servers` must apply so its running state matches
    /// `model`, the model as it stands once this update is applied.
    ///
    /// Property and path changes carry the value the server resolves to, so
    /// removing an override falls back to the next level instead of deleting
    /// the value.
    pub fn server_updates(
        &self,
        model: &DomainModel,
        servers: &BTreeSet<ServerIdentity>,
    ) -> BTreeMap<ServerIdentity, ServerUpdate> {
        let Some(nominal) = self.subordinate_update() else {
            return BTreeMap::new();
        };
        servers
            .iter()
            .map(|server| {
                let update = self
                    .resolved_for(model, server)
                    .unwrap_or_else(|| nominal.clone());
                (server.clone(), update)
            })
            .collect()
    }

    fn resolved_for(&self, model: &DomainModel, server: &ServerIdentity) -> Option<ServerUpdate> {
        match self {
            DomainUpdate::SetSystemProperty { name, .. }
            | DomainUpdate::RemoveSystemProperty { name }
            | DomainUpdate::SetHostSystemProperty { name, .. }
            | DomainUpdate::RemoveHostSystemProperty { name, .. } => {
                let state = model.resolve_server_state(server).ok()?;
                Some(match state.system_properties().get(name) {
                    Some(value) => ServerUpdate::SetSystemProperty {
                        name: name.clone(),
                        value: value.to_string(),
                    },
                    None => ServerUpdate::RemoveSystemProperty { name: name.clone() },
                })
            }
            DomainUpdate::AddPath { .. }
            | DomainUpdate::RemovePath { .. }
            | DomainUpdate::AddServerPath { .. }
            | DomainUpdate::RemoveServerPath { .. } => {
                let name = self.path_name()?;
                let state = model.resolve_server_state(server).ok()?;
                Some(match state.path(name) {
                    Some(path) if matches!(self, DomainUpdate::AddPath { .. }) => {
                        ServerUpdate::AddPath(path.clone())
                    }
                    Some(path) => ServerUpdate::SetPath(path.clone()),
                    None => ServerUpdate::RemovePath {
                        name: name.to_string(),
                    },
                })
            }
            _ => None,
        }
    }

    fn path_name(&self) -> Option<&str> {
        match self {
            DomainUpdate::AddPath { path } | DomainUpdate::AddServerPath { path, .. } => {
                Some(path.name())
            }
            DomainUpdate::RemovePath { name } | DomainUpdate::RemoveServerPath { name, .. } => {
                Some(name)
            }
            _ => None,
        }
    }

    /// The blast radius: every started server that must apply the subordinate
    /// update. Pure; never touches a host.
    pub fn affected_servers(&self, model: &DomainModel) -> BTreeSet<ServerIdentity> {
        if self.subordinate_update().is_none() {
            return BTreeSet::new();
        }
        match self {
            DomainUpdate::AddSubsystem { profile, .. }
            | DomainUpdate::RemoveSubsystem { profile, .. } => servers_where(model, |_, server| {
                model
                    .server_group(server.group())
                    .is_some_and(|g| g.profile() == profile)
            }),
            DomainUpdate::SetSystemProperty { name, .. }
            | DomainUpdate::RemoveSystemProperty { name } => servers_where(model, |host, server| {
                let group_overrides = model
                    .server_group(server.group())
                    .is_some_and(|g| g.system_properties().contains(name));
                !group_overrides
                    && !host.system_properties().contains(name)
                    && !server.system_properties().contains(name)
            }),
            DomainUpdate::SetHostSystemProperty { host: target, name, .. }
            | DomainUpdate::RemoveHostSystemProperty { host: target, name } => {
                servers_where(model, |host, server| {
                    host.name() == target && !server.system_properties().contains(name)
                })
            }
            DomainUpdate::AddPath { path } => servers_where(model, |host, server| {
                host.path(path.name()).is_none() && server.path(path.name()).is_none()
            }),
            DomainUpdate::RemovePath { name } => servers_where(model, |host, server| {
                host.path(name).is_none() && server.path(name).is_none()
            }),
            DomainUpdate::AddServerPath { host: target, server: name, .. }
            | DomainUpdate::RemoveServerPath { host: target, server: name, .. } => {
                servers_where(model, |host, server| {
                    host.name() == target && server.name() == name
                })
            }
            DomainUpdate::Deploy { server_groups, .. }
            | DomainUpdate::Undeploy { server_groups, .. }
            | DomainUpdate::Replace { server_groups, .. } => {
                servers_where(model, |_, server| {
                    server_groups.iter().any(|g| g == server.group())
                })
            }
            DomainUpdate::AddProfile { .. }
            | DomainUpdate::RemoveProfile { .. }
            | DomainUpdate::AddServerGroup { .. }
            | DomainUpdate::RemoveServerGroup { .. } => BTreeSet::new(),
        }
    }

    /// Short name of the update kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainUpdate::AddProfile { .. } => "add-profile",
            DomainUpdate::RemoveProfile { .. } => "remove-profile",
            DomainUpdate::AddSubsystem { .. } => "add-subsystem",
            DomainUpdate::RemoveSubsystem { .. } => "remove-subsystem",
            DomainUpdate::AddServerGroup { .. } => "add-server-group",
            DomainUpdate::RemoveServerGroup { .. } => "remove-server-group",
            DomainUpdate::SetSystemProperty { .. } => "set-system-property",
            DomainUpdate::RemoveSystemProperty { .. } => "remove-system-property",
            DomainUpdate::SetHostSystemProperty { .. } => "set-host-system-property",
            DomainUpdate::RemoveHostSystemProperty { .. } => "remove-host-system-property",
            DomainUpdate::AddPath { .. } => "add-path",
            DomainUpdate::RemovePath { .. } => "remove-path",
            DomainUpdate::AddServerPath { .. } => "add-server-path",
            DomainUpdate::RemoveServerPath { .. } => "remove-server-path",
            DomainUpdate::Deploy { .. } => "deploy",
            DomainUpdate::Undeploy { .. } => "undeploy",
            DomainUpdate::Replace { .. } => "replace",
        }
    }
}

impl fmt::Display for DomainUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainUpdate::Deploy {
                content,
                server_groups,
            } => write!(f, "deploy({} -> {:?})", content.unique_name(), server_groups),
            DomainUpdate::Undeploy {
                unique_name,
                server_groups,
                remove_content,
            } => write!(
                f,
                "undeploy({} from {:?}, remove={})",
                unique_name, server_groups, remove_content
            ),
            DomainUpdate::Replace {
                to_replace,
                content,
                server_groups,
                ..
            } => write!(
                f,
                "replace({} -> {} in {:?})",
                to_replace,
                content.unique_name(),
                server_groups
            ),
            other => f.write_str(other.kind()),
        }
    }
}

fn servers_where<F>(model: &DomainModel, predicate: F) -> BTreeSet<ServerIdentity>
where
    F: Fn(&HostModel, &ServerElement) -> bool,
{
    model
        .active_servers()
        .filter(|(_, host, server)| predicate(host, server))
        .map(|(id, _, _)| id)
        .collect()
}

#[cfg(test)]
mod tests;
