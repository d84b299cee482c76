use domain_model::{ContentHash, DeploymentUnit};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentActionType {
    Deploy,
    Undeploy,
    Replace,
    Remove,
}

impl fmt::Display for DeploymentActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentActionType::Deploy => "DEPLOY",
            DeploymentActionType::Undeploy => "UNDEPLOY",
            DeploymentActionType::Replace => "REPLACE",
            DeploymentActionType::Remove => "REMOVE",
        };
        f.pad(name)
    }
}

/// Addresses content already uploaded to the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentReference {
    runtime_name: String,
    hash: ContentHash,
}

impl ContentReference {
    pub fn new(runtime_name: impl Into<String>, hash: ContentHash) -> Self {
        Self {
            runtime_name: runtime_name.into(),
            hash,
        }
    }

    pub fn runtime_name(&self) -> &str {
        &self.runtime_name
    }

    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }
}

/// One step of a deployment plan. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentAction {
    #[serde(default = "Uuid::new_v4")]
    id: Uuid,
    #[serde(rename = "type")]
    action_type: DeploymentActionType,
    unique_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    replaced_unique_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<ContentReference>,
}

impl DeploymentAction {
    fn new(
        action_type: DeploymentActionType,
        unique_name: String,
        replaced_unique_name: Option<String>,
        content: Option<ContentReference>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action_type,
            unique_name,
            replaced_unique_name,
            content,
        }
    }

    pub fn deploy(unique_name: impl Into<String>, content: ContentReference) -> Self {
        Self::new(
            DeploymentActionType::Deploy,
            unique_name.into(),
            None,
            Some(content),
        )
    }

    pub fn undeploy(unique_name: impl Into<String>) -> Self {
        Self::new(DeploymentActionType::Undeploy, unique_name.into(), None, None)
    }

    pub fn replace(
        replaced_unique_name: impl Into<String>,
        unique_name: impl Into<String>,
        content: ContentReference,
    ) -> Self {
        Self::new(
            DeploymentActionType::Replace,
            unique_name.into(),
            Some(replaced_unique_name.into()),
            Some(content),
        )
    }

    pub fn remove(unique_name: impl Into<String>) -> Self {
        Self::new(DeploymentActionType::Remove, unique_name.into(), None, None)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn action_type(&self) -> DeploymentActionType {
        self.action_type
    }

    pub fn unique_name(&self) -> &str {
        &self.unique_name
    }

    /// For `REPLACE`, the content being swapped out.
    pub fn replaced_unique_name(&self) -> Option<&str> {
        self.replaced_unique_name.as_deref()
    }

    pub fn content(&self) -> Option<&ContentReference> {
        self.content.as_ref()
    }

    /// The repository entry this action introduces, if it introduces one.
    pub fn deployment_unit(&self) -> Option<DeploymentUnit> {
        self.content.as_ref().map(|content| {
            DeploymentUnit::new(
                self.unique_name.clone(),
                content.runtime_name.clone(),
                content.hash.clone(),
            )
        })
    }
}

impl fmt::Display for DeploymentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.replaced_unique_name {
            Some(replaced) => write!(f, "{} {} -> {}", self.action_type, replaced, self.unique_name),
            None => write!(f, "{} {}", self.action_type, self.unique_name),
        }
    }
}
