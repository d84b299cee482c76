use super::ids::ContentHash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named filesystem path, optionally relative to another named path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathElement {
    name: String,
    path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    relative_to: Option<String>,
}

impl PathElement {
    pub fn new(name: impl Into<String>, path: impl Into<String>, relative_to: Option<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            relative_to,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn relative_to(&self) -> Option<&str> {
        self.relative_to.as_deref()
    }
}

/// An ordered set of system properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertiesElement {
    properties: BTreeMap<String, String>,
}

impl PropertiesElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Sets a property, returning the value it replaced.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.properties.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.properties.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// A piece of deployable content known to the domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentUnit {
    unique_name: String,
    runtime_name: String,
    hash: ContentHash,
}

impl DeploymentUnit {
    pub fn new(
        unique_name: impl Into<String>,
        runtime_name: impl Into<String>,
        hash: ContentHash,
    ) -> Self {
        Self {
            unique_name: unique_name.into(),
            runtime_name: runtime_name.into(),
            hash,
        }
    }

    pub fn unique_name(&self) -> &str {
        &self.unique_name
    }

    pub fn runtime_name(&self) -> &str {
        &self.runtime_name
    }

    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }
}
