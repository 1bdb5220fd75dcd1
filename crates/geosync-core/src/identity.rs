//! # Identifier Newtypes
//!
//! A [`ResourceId`] names a resource in the content repository; a
//! [`WorkspaceId`] names the GeoServer workspace that holds that resource's
//! layers. The mapping between them is `{namespace}-{resource_id}` and is
//! never persisted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Identifier of a repository resource (e.g. a 32-character hex short id).
///
/// Accepts ASCII alphanumerics, `-` and `_` only. The id ends up in URL
/// paths, in a workspace name and in a directory name under the storage
/// root, so anything that could traverse or split a path is rejected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId(String);

impl ResourceId {
    /// Validate and wrap a resource identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if id.is_empty() {
            return Err(CoreError::InvalidResourceId {
                id,
                reason: "must not be empty",
            });
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CoreError::InvalidResourceId {
                id,
                reason: "only ASCII alphanumerics, '-' and '_' are allowed",
            });
        }
        Ok(Self(id))
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ResourceId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ResourceId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

/// Name of the GeoServer workspace owned by one resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    /// Derive the workspace name for a resource: `{namespace}-{resource_id}`.
    pub fn for_resource(namespace: &str, resource_id: &ResourceId) -> Self {
        Self(format!("{namespace}-{resource_id}"))
    }

    /// Borrow the workspace name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recover the resource id part of a workspace name, if the name was
    /// produced under `namespace`.
    pub fn resource_part<'a>(name: &'a str, namespace: &str) -> Option<&'a str> {
        name.strip_prefix(namespace)?.strip_prefix('-')
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
