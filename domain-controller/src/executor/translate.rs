use domain_client::{DeploymentActionType, TargetedAction};
use domain_model::{DomainModel, DomainUpdate, UpdateFailure};

/// Turns one plan action into the single domain update that carries it out.
///
/// Without group directives an `UNDEPLOY` or `REPLACE` reaches every group
/// holding the content, a `DEPLOY` only adds content to the repository.
pub fn action_update(model: &DomainModel, step: &TargetedAction) -> Result<DomainUpdate, UpdateFailure> {
    let action = &step.action;
    let groups: Vec<String> = step
        .targets
        .iter()
        .map(|d| d.server_group_name().to_string())
        .collect();

    match action.action_type() {
        DeploymentActionType::Deploy => Ok(DomainUpdate::Deploy {
            content: action
                .deployment_unit()
                .ok_or_else(|| UpdateFailure::state(format!("{} carries no content", action)))?,
            server_groups: groups,
        }),
        DeploymentActionType::Undeploy => Ok(DomainUpdate::Undeploy {
            unique_name: action.unique_name().to_string(),
            server_groups: or_holding(model, groups, action.unique_name()),
            remove_content: false,
        }),
        DeploymentActionType::Replace => {
            let replaced = action
                .replaced_unique_name()
                .ok_or_else(|| UpdateFailure::state(format!("{} names no replaced content", action)))?;
            Ok(DomainUpdate::Replace {
                to_replace: replaced.to_string(),
                content: action
                    .deployment_unit()
                    .ok_or_else(|| UpdateFailure::state(format!("{} carries no content", action)))?,
                server_groups: or_holding(model, groups, replaced),
                remove_replaced_content: false,
            })
        }
        DeploymentActionType::Remove => Ok(DomainUpdate::Undeploy {
            unique_name: action.unique_name().to_string(),
            server_groups: Vec::new(),
            remove_content: true,
        }),
    }
}

fn or_holding(model: &DomainModel, groups: Vec<String>, unique_name: &str) -> Vec<String> {
    if groups.is_empty() {
        model.groups_holding(unique_name)
    } else {
        groups
    }
}
