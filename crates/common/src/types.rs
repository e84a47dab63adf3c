// Core domain types shared across all atelier crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies the profile that owns a set of workspaces.
pub type OwnerId = i64;

/// A named binding between a local directory and a remote archive address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkspaceRecord {
    pub owner_id: OwnerId,
    pub name: String,
    /// Absolute path of the directory served under `workspace://<name>/`.
    pub local_files_path: Option<String>,
    /// Canonical archive address, or `""` when the last input was not a
    /// recognizable address.
    pub publish_target_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl WorkspaceRecord {
    /// The bound directory, if the workspace has a non-empty one.
    pub fn bound_directory(&self) -> Option<&str> {
        self.local_files_path.as_deref().filter(|path| !path.is_empty())
    }
}

/// Partial update applied by `workspace.set`. Absent fields keep their
/// previous value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkspacePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_files_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_target_url: Option<String>,
}

impl WorkspacePatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Self::default() }
    }

    pub fn with_local_files_path(mut self, path: impl Into<String>) -> Self {
        self.local_files_path = Some(path.into());
        self
    }

    pub fn with_publish_target_url(mut self, url: impl Into<String>) -> Self {
        self.publish_target_url = Some(url.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.local_files_path.is_none() && self.publish_target_url.is_none()
    }
}
