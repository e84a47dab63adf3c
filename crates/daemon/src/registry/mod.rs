// Workspace registry: name → configuration, with race-free mutations.
//
// Reads go straight to the store. `set`, `create` and `remove` hold a
// per-owner async lock for the whole read-modify-write. A rename writes the
// new-name record before deleting the old one, so a failure in between
// leaves both rows rather than neither.

pub mod names;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use atelier_common::archive::canonicalize_publish_target;
use atelier_common::name::{canonical_workspace_name, validate_workspace_name, NameError};
use atelier_common::types::{OwnerId, WorkspacePatch, WorkspaceRecord};
use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::store::workspaces::WorkspaceStore;
use names::{generate_unused_name, NameGenerationError};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid workspace name: {0}")]
    InvalidName(#[from] NameError),

    #[error("local files path must be absolute: `{0}`")]
    RelativePath(String),

    #[error("workspace `{0}` already exists")]
    AlreadyExists(String),

    #[error("failed to find an unused workspace name")]
    NamesExhausted,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl RegistryError {
    /// True for errors caused by caller input rather than the environment.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidName(_) | Self::RelativePath(_) | Self::AlreadyExists(_))
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;

pub struct WorkspaceRegistry {
    store: Arc<dyn WorkspaceStore>,
    owner_locks: Mutex<HashMap<OwnerId, Arc<AsyncMutex<()>>>>,
}

impl std::fmt::Debug for WorkspaceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceRegistry").finish_non_exhaustive()
    }
}

impl WorkspaceRegistry {
    pub fn new(store: Arc<dyn WorkspaceStore>) -> Self {
        Self { store, owner_locks: Mutex::new(HashMap::new()) }
    }

    pub fn get(&self, owner_id: OwnerId, name: &str) -> RegistryResult<Option<WorkspaceRecord>> {
        Ok(self.store.get(owner_id, &canonical_workspace_name(name))?)
    }

    /// Look up the workspace publishing to `url`. The input is canonicalized
    /// first; unrecognizable addresses match nothing.
    pub fn get_by_publish_target(
        &self,
        owner_id: OwnerId,
        url: &str,
    ) -> RegistryResult<Option<WorkspaceRecord>> {
        let canonical = canonicalize_publish_target(url);
        if canonical.is_empty() {
            return Ok(None);
        }
        Ok(self.store.get_by_publish_target(owner_id, &canonical)?)
    }

    pub fn list(&self, owner_id: OwnerId) -> RegistryResult<Vec<WorkspaceRecord>> {
        Ok(self.store.all(owner_id)?)
    }

    /// Apply `patch` to the workspace called `name`, creating it if absent.
    /// A `name` in the patch renames the workspace.
    pub async fn set(
        &self,
        owner_id: OwnerId,
        name: &str,
        patch: WorkspacePatch,
    ) -> RegistryResult<WorkspaceRecord> {
        let name = canonical_workspace_name(name);
        let lock = self.owner_lock(owner_id);
        let _guard = lock.lock().await;

        let current = self.store.get(owner_id, &name)?;
        let record = apply_patch(owner_id, &name, current, patch)?;

        self.store.upsert(&record)?;
        if record.name != name {
            self.store.delete(owner_id, &name)?;
            info!(owner_id, from = %name, to = %record.name, "workspace renamed");
        } else {
            debug!(owner_id, name = %record.name, "workspace updated");
        }

        Ok(record)
    }

    /// Create a workspace under a freshly generated name. A `name` in the
    /// patch replaces the generated one and must not already exist.
    pub async fn create(
        &self,
        owner_id: OwnerId,
        mut patch: WorkspacePatch,
    ) -> RegistryResult<WorkspaceRecord> {
        let lock = self.owner_lock(owner_id);
        let _guard = lock.lock().await;

        let name = match patch.name.take() {
            Some(requested) => {
                validate_workspace_name(&requested)?;
                let requested = canonical_workspace_name(&requested);
                if self.store.get(owner_id, &requested)?.is_some() {
                    return Err(RegistryError::AlreadyExists(requested));
                }
                requested
            }
            None => generate_unused_name(|candidate| self.store.name_exists(candidate)).map_err(
                |error| match error {
                    NameGenerationError::Exhausted => RegistryError::NamesExhausted,
                    NameGenerationError::Check(source) => RegistryError::Store(source),
                },
            )?,
        };

        let record = apply_patch(owner_id, &name, None, patch)?;
        self.store.upsert(&record)?;
        info!(owner_id, name = %record.name, "workspace created");
        Ok(record)
    }

    /// Delete the workspace called `name`. Removing a missing workspace is
    /// not an error; the return value reports whether a row existed.
    pub async fn remove(&self, owner_id: OwnerId, name: &str) -> RegistryResult<bool> {
        let name = canonical_workspace_name(name);
        let lock = self.owner_lock(owner_id);
        let _guard = lock.lock().await;

        let removed = self.store.delete(owner_id, &name)?;
        if removed {
            info!(owner_id, name = %name, "workspace removed");
        }
        Ok(removed)
    }

    fn owner_lock(&self, owner_id: OwnerId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.owner_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(owner_id).or_default())
    }
}

fn apply_patch(
    owner_id: OwnerId,
    name: &str,
    current: Option<WorkspaceRecord>,
    patch: WorkspacePatch,
) -> RegistryResult<WorkspaceRecord> {
    let mut record = current.unwrap_or_else(|| WorkspaceRecord {
        owner_id,
        name: name.to_string(),
        local_files_path: None,
        publish_target_url: None,
        updated_at: Utc::now(),
    });

    let requested = patch.name.unwrap_or_else(|| name.to_string());
    validate_workspace_name(&requested)?;
    record.name = canonical_workspace_name(&requested);

    if let Some(path) = patch.local_files_path {
        if !path.is_empty() && !Path::new(&path).is_absolute() {
            return Err(RegistryError::RelativePath(path));
        }
        record.local_files_path = Some(path);
    }

    if let Some(url) = patch.publish_target_url {
        record.publish_target_url = Some(canonicalize_publish_target(&url));
    }

    record.updated_at = Utc::now();
    Ok(record)
}
