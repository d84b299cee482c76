use super::DomainUpdate;
use crate::error::{ElementKind, UpdateFailure};
use crate::model::{DeploymentUnit, DomainModel};
use std::collections::HashSet;

fn check_distinct(groups: &[String]) -> Result<(), UpdateFailure> {
    let mut seen = HashSet::new();
    for group in groups {
        if !seen.insert(group.as_str()) {
            return Err(UpdateFailure::constraint(format!(
                "server group '{}' listed twice",
                group
            )));
        }
    }
    Ok(())
}

/// Whether `content` is already in the repository. The same unique name with
/// different content is a conflict.
fn content_known(model: &DomainModel, content: &DeploymentUnit) -> Result<bool, UpdateFailure> {
    match model.deployment(content.unique_name()) {
        Some(existing) if existing == content => Ok(true),
        Some(_) => Err(UpdateFailure::constraint(format!(
            "deployment '{}' already exists with different content",
            content.unique_name()
        ))),
        None => Ok(false),
    }
}

fn group_deployment_missing(group: &str, unique_name: &str) -> UpdateFailure {
    UpdateFailure::not_found(
        ElementKind::ServerGroupDeployment,
        format!("{}:{}", group, unique_name),
    )
}

pub(super) fn apply_deploy(
    model: &mut DomainModel,
    content: &DeploymentUnit,
    groups: &[String],
) -> Result<(), UpdateFailure> {
    check_distinct(groups)?;
    let known = content_known(model, content)?;
    for name in groups {
        let group = model
            .server_group(name)
            .ok_or_else(|| UpdateFailure::not_found(ElementKind::ServerGroup, name.as_str()))?;
        if group.has_deployment(content.unique_name()) {
            return Err(UpdateFailure::constraint(format!(
                "deployment '{}' already present in server group '{}'",
                content.unique_name(),
                name
            )));
        }
    }

    if !known {
        model.add_deployment(content.clone())?;
    }
    for name in groups {
        model.server_group_mut(name)?.add_deployment(content.clone())?;
    }
    Ok(())
}

pub(super) fn apply_undeploy(
    model: &mut DomainModel,
    unique_name: &str,
    groups: &[String],
    remove_content: bool,
) -> Result<(), UpdateFailure> {
    check_distinct(groups)?;
    if model.deployment(unique_name).is_none() {
        return Err(UpdateFailure::not_found(ElementKind::Deployment, unique_name));
    }
    for name in groups {
        let group = model
            .server_group(name)
            .ok_or_else(|| UpdateFailure::not_found(ElementKind::ServerGroup, name.as_str()))?;
        if !group.has_deployment(unique_name) {
            return Err(group_deployment_missing(name, unique_name));
        }
    }
    if remove_content {
        if let Some(other) = model
            .groups_holding(unique_name)
            .into_iter()
            .find(|g| !groups.contains(g))
        {
            return Err(UpdateFailure::constraint(format!(
                "deployment '{}' is still deployed to server group '{}'",
                unique_name, other
            )));
        }
    }

    for name in groups {
        model.server_group_mut(name)?.remove_deployment(unique_name)?;
    }
    if remove_content {
        model.remove_deployment(unique_name)?;
    }
    Ok(())
}

pub(super) fn apply_replace(
    model: &mut DomainModel,
    to_replace: &str,
    content: &DeploymentUnit,
    groups: &[String],
    remove_replaced_content: bool,
) -> Result<(), UpdateFailure> {
    check_distinct(groups)?;
    if to_replace == content.unique_name() {
        return Err(UpdateFailure::constraint(format!(
            "deployment '{}' cannot replace itself",
            to_replace
        )));
    }
    if model.deployment(to_replace).is_none() {
        return Err(UpdateFailure::not_found(ElementKind::Deployment, to_replace));
    }
    let known = content_known(model, content)?;
    for name in groups {
        let group = model
            .server_group(name)
            .ok_or_else(|| UpdateFailure::not_found(ElementKind::ServerGroup, name.as_str()))?;
        if !group.has_deployment(to_replace) {
            return Err(group_deployment_missing(name, to_replace));
        }
        if group.has_deployment(content.unique_name()) {
            return Err(UpdateFailure::constraint(format!(
                "deployment '{}' already present in server group '{}'",
                content.unique_name(),
                name
            )));
        }
    }
    if remove_replaced_content {
        if let Some(other) = model
            .groups_holding(to_replace)
            .into_iter()
            .find(|g| !groups.contains(g))
        {
            return Err(UpdateFailure::constraint(format!(
                "deployment '{}' is still deployed to server group '{}'",
                to_replace, other
            )));
        }
    }

    if !known {
        model.add_deployment(content.clone())?;
    }
    for name in groups {
        let group = model.server_group_mut(name)?;
        group.remove_deployment(to_replace)?;
        group.add_deployment(content.clone())?;
    }
    if remove_replaced_content {
        model.remove_deployment(to_replace)?;
    }
    Ok(())
}

pub(super) fn deploy_compensation(
    original: &DomainModel,
    content: &DeploymentUnit,
    groups: &[String],
) -> Option<DomainUpdate> {
    Some(DomainUpdate::Undeploy {
        unique_name: content.unique_name().to_string(),
        server_groups: groups.to_vec(),
        remove_content: original.deployment(content.unique_name()).is_none(),
    })
}

pub(super) fn undeploy_compensation(
    original: &DomainModel,
    unique_name: &str,
    groups: &[String],
) -> Option<DomainUpdate> {
    original
        .deployment(unique_name)
        .map(|unit| DomainUpdate::Deploy {
            content: unit.clone(),
            server_groups: groups.to_vec(),
        })
}

pub(super) fn replace_compensation(
    original: &DomainModel,
    to_replace: &str,
    content: &DeploymentUnit,
    groups: &[String],
) -> Option<DomainUpdate> {
    let replaced = original.deployment(to_replace)?;
    Some(DomainUpdate::Replace {
        to_replace: content.unique_name().to_string(),
        content: replaced.clone(),
        server_groups: groups.to_vec(),
        remove_replaced_content: original.deployment(content.unique_name()).is_none(),
    })
}
