use crate::error::{ElementKind, UpdateFailure};
use crate::model::{DeploymentUnit, PathElement, ServerState};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An update a host applies to each of its affected running servers.
///
/// Derived from a [`crate::DomainUpdate`] by the domain controller; hosts never
/// see domain-level updates directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerUpdate {
    SetSystemProperty { name: String, value: String },
    RemoveSystemProperty { name: String },
    AddPath(PathElement),
    /// Defines or redefines a path, for overrides and fallbacks.
    SetPath(PathElement),
    RemovePath { name: String },
    AddSubsystem { namespace: String },
    RemoveSubsystem { namespace: String },
    Deploy(DeploymentUnit),
    Undeploy { unique_name: String },
    Replace {
        to_replace: String,
        replacement: DeploymentUnit,
    },
}

impl ServerUpdate {
    /// Applies the update to one server. Nothing is modified on failure.
    pub fn apply(&self, state: &mut ServerState) -> Result<(), UpdateFailure> {
        match self {
            ServerUpdate::SetSystemProperty { name, value } => {
                state.system_properties_mut().set(name.clone(), value.clone());
            }
            ServerUpdate::RemoveSystemProperty { name } => {
                if state.system_properties_mut().remove(name).is_none() {
                    return Err(UpdateFailure::not_found(ElementKind::SystemProperty, name));
                }
            }
            ServerUpdate::AddPath(path) => {
                if state.path(path.name()).is_some() {
                    return Err(UpdateFailure::constraint(format!(
                        "path '{}' already defined",
                        path.name()
                    )));
                }
                state.put_path(path.clone());
            }
            ServerUpdate::SetPath(path) => {
                state.put_path(path.clone());
            }
            ServerUpdate::RemovePath { name } => {
                if state.take_path(name).is_none() {
                    return Err(UpdateFailure::not_found(ElementKind::Path, name));
                }
            }
            ServerUpdate::AddSubsystem { namespace } => {
                if !state.put_subsystem(namespace) {
                    return Err(UpdateFailure::constraint(format!(
                        "subsystem '{}' already installed",
                        namespace
                    )));
                }
            }
            ServerUpdate::RemoveSubsystem { namespace } => {
                if !state.take_subsystem(namespace) {
                    return Err(UpdateFailure::not_found(ElementKind::Subsystem, namespace));
                }
            }
            ServerUpdate::Deploy(unit) => {
                if state.deployment(unit.unique_name()).is_some() {
                    return Err(UpdateFailure::constraint(format!(
                        "deployment '{}' already deployed",
                        unit.unique_name()
                    )));
                }
                state.put_deployment(unit.clone());
            }
            ServerUpdate::Undeploy { unique_name } => {
                if state.take_deployment(unique_name).is_none() {
                    return Err(UpdateFailure::not_found(ElementKind::Deployment, unique_name));
                }
            }
            ServerUpdate::Replace {
                to_replace,
                replacement,
            } => {
                if state.deployment(to_replace).is_none() {
                    return Err(UpdateFailure::not_found(ElementKind::Deployment, to_replace));
                }
                if state.deployment(replacement.unique_name()).is_some() {
                    return Err(UpdateFailure::constraint(format!(
                        "deployment '{}' already deployed",
                        replacement.unique_name()
                    )));
                }
                state.take_deployment(to_replace);
                state.put_deployment(replacement.clone());
            }
        }
        Ok(())
    }
}

impl fmt::Display for ServerUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerUpdate::SetSystemProperty { name, .. } => write!(f, "set-property({})", name),
            ServerUpdate::RemoveSystemProperty { name } => write!(f, "remove-property({})", name),
            ServerUpdate::AddPath(path) => write!(f, "add-path({})", path.name()),
            ServerUpdate::SetPath(path) => write!(f, "set-path({})", path.name()),
            ServerUpdate::RemovePath { name } => write!(f, "remove-path({})", name),
            ServerUpdate::AddSubsystem { namespace } => write!(f, "add-subsystem({})", namespace),
            ServerUpdate::RemoveSubsystem { namespace } => {
                write!(f, "remove-subsystem({})", namespace)
            }
            ServerUpdate::Deploy(unit) => write!(f, "deploy({})", unit.unique_name()),
            ServerUpdate::Undeploy { unique_name } => write!(f, "undeploy({})", unique_name),
            ServerUpdate::Replace {
                to_replace,
                replacement,
            } => write!(f, "replace({} -> {})", to_replace, replacement.unique_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentHash;

    fn unit(name: &str) -> DeploymentUnit {
        DeploymentUnit::new(name, name, ContentHash::new(format!("{}-hash", name)))
    }

    #[test]
    fn test_replace_swaps_deployments() {
        let mut state = ServerState::new();
        ServerUpdate::Deploy(unit("a.war")).apply(&mut state).unwrap();

        ServerUpdate::Replace {
            to_replace: "a.war".into(),
            replacement: unit("b.war"),
        }
        .apply(&mut state)
        .unwrap();

        assert!(state.deployment("a.war").is_none());
        assert_eq!(state.deployment("b.war"), Some(&unit("b.war")));
    }

    #[test]
    fn test_failed_apply_leaves_state_untouched() {
        let mut state = ServerState::new();
        ServerUpdate::Deploy(unit("a.war")).apply(&mut state).unwrap();
        let before = state.clone();

        let err = ServerUpdate::Replace {
            to_replace: "missing.war".into(),
            replacement: unit("b.war"),
        }
        .apply(&mut state)
        .unwrap_err();

        assert!(matches!(err, UpdateFailure::NotFound { .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn test_set_path_redefines_an_existing_path() {
        let mut state = ServerState::new();
        ServerUpdate::AddPath(PathElement::new("log.dir", "/var/log", None))
            .apply(&mut state)
            .unwrap();

        let err = ServerUpdate::AddPath(PathElement::new("log.dir", "/srv/log", None))
            .apply(&mut state)
            .unwrap_err();
        assert!(matches!(err, UpdateFailure::Constraint(_)));

        ServerUpdate::SetPath(PathElement::new("log.dir", "/srv/log", None))
            .apply(&mut state)
            .unwrap();
        assert_eq!(state.path("log.dir").map(|p| p.path()), Some("/srv/log"));
    }

    #[test]
    fn test_duplicate_deploy_is_a_constraint_failure() {
        let mut state = ServerState::new();
        ServerUpdate::Deploy(unit("a.war")).apply(&mut state).unwrap();
        let err = ServerUpdate::Deploy(unit("a.war"))
            .apply(&mut state)
            .unwrap_err();
        assert!(matches!(err, UpdateFailure::Constraint(_)));
    }
}
