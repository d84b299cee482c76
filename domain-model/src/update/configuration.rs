use super::DomainUpdate;
use crate::error::{ElementKind, UpdateFailure};
use crate::model::{DomainModel, PropertiesElement};

pub(super) fn remove_property(
    properties: &mut PropertiesElement,
    name: &str,
) -> Result<(), UpdateFailure> {
    properties
        .remove(name)
        .map(|_| ())
        .ok_or_else(|| UpdateFailure::not_found(ElementKind::SystemProperty, name))
}

/// Undo of every non-deployment update.
pub(super) fn compensation(update: &DomainUpdate, original: &DomainModel) -> Option<DomainUpdate> {
    match update {
        DomainUpdate::AddProfile { profile } => {
            if original.profile(profile.name()).is_some() {
                return None;
            }
            Some(DomainUpdate::RemoveProfile {
                name: profile.name().to_string(),
            })
        }
        DomainUpdate::RemoveProfile { name } => {
            original
                .profile(name)
                .map(|profile| DomainUpdate::AddProfile {
                    profile: profile.clone(),
                })
        }
        DomainUpdate::AddSubsystem { profile, namespace } => original
            .profile(profile)
            .filter(|p| !p.has_subsystem(namespace))
            .map(|_| DomainUpdate::RemoveSubsystem {
                profile: profile.clone(),
                namespace: namespace.clone(),
            }),
        DomainUpdate::RemoveSubsystem { profile, namespace } => original
            .profile(profile)
            .filter(|p| p.has_subsystem(namespace))
            .map(|_| DomainUpdate::AddSubsystem {
                profile: profile.clone(),
                namespace: namespace.clone(),
            }),
        DomainUpdate::AddServerGroup { group } => {
            if original.server_group(group.name()).is_some() {
                return None;
            }
            Some(DomainUpdate::RemoveServerGroup {
                name: group.name().to_string(),
            })
        }
        DomainUpdate::RemoveServerGroup { name } => {
            original
                .server_group(name)
                .map(|group| DomainUpdate::AddServerGroup {
                    group: group.clone(),
                })
        }
        DomainUpdate::SetSystemProperty { name, .. } => {
            Some(restore_property(original.system_properties(), name))
        }
        DomainUpdate::RemoveSystemProperty { name } => original
            .system_properties()
            .get(name)
            .map(|value| DomainUpdate::SetSystemProperty {
                name: name.clone(),
                value: value.to_string(),
            }),
        DomainUpdate::SetHostSystemProperty { host, name, .. } => {
            let host_model = original.host(host)?;
            Some(match host_model.system_properties().get(name) {
                Some(value) => DomainUpdate::SetHostSystemProperty {
                    host: host.clone(),
                    name: name.clone(),
                    value: value.to_string(),
                },
                None => DomainUpdate::RemoveHostSystemProperty {
                    host: host.clone(),
                    name: name.clone(),
                },
            })
        }
        DomainUpdate::RemoveHostSystemProperty { host, name } => original
            .host(host)?
            .system_properties()
            .get(name)
            .map(|value| DomainUpdate::SetHostSystemProperty {
                host: host.clone(),
                name: name.clone(),
                value: value.to_string(),
            }),
        DomainUpdate::AddPath { path } => {
            if original.path(path.name()).is_some() {
                return None;
            }
            Some(DomainUpdate::RemovePath {
                name: path.name().to_string(),
            })
        }
        DomainUpdate::RemovePath { name } => original
            .path(name)
            .map(|path| DomainUpdate::AddPath { path: path.clone() }),
        DomainUpdate::AddServerPath { host, server, path } => {
            let element = original.host(host)?.server(server)?;
            if element.path(path.name()).is_some() {
                return None;
            }
            Some(DomainUpdate::RemoveServerPath {
                host: host.clone(),
                server: server.clone(),
                name: path.name().to_string(),
            })
        }
        DomainUpdate::RemoveServerPath { host, server, name } => original
            .host(host)?
            .server(server)?
            .path(name)
            .map(|path| DomainUpdate::AddServerPath {
                host: host.clone(),
                server: server.clone(),
                path: path.clone(),
            }),
        DomainUpdate::Deploy { .. } | DomainUpdate::Undeploy { .. } | DomainUpdate::Replace { .. } => {
            None
        }
    }
}

fn restore_property(original: &PropertiesElement, name: &str) -> DomainUpdate {
    match original.get(name) {
        Some(value) => DomainUpdate::SetSystemProperty {
            name: name.to_string(),
            value: value.to_string(),
        },
        None => DomainUpdate::RemoveSystemProperty {
            name: name.to_string(),
        },
    }
}
