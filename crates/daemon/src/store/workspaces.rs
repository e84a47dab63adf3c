// workspaces table access: keyed by (owner_id, name).
//
// The registry talks to persistence only through `WorkspaceStore`, so the
// mutation protocol can be exercised against stores that fail on demand.

use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use atelier_common::types::{OwnerId, WorkspaceRecord};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::meta_db::MetaDb;

/// Durable key-value access to workspace records.
pub trait WorkspaceStore: Send + Sync {
    fn get(&self, owner_id: OwnerId, name: &str) -> Result<Option<WorkspaceRecord>>;

    fn get_by_publish_target(
        &self,
        owner_id: OwnerId,
        publish_target_url: &str,
    ) -> Result<Option<WorkspaceRecord>>;

    /// All records for `owner_id`, ordered by name ascending.
    fn all(&self, owner_id: OwnerId) -> Result<Vec<WorkspaceRecord>>;

    /// True if any owner has a workspace called `name`.
    fn name_exists(&self, name: &str) -> Result<bool>;

    /// Insert or replace the record keyed by `(record.owner_id, record.name)`.
    fn upsert(&self, record: &WorkspaceRecord) -> Result<()>;

    /// Delete a record. Returns whether a row was removed.
    fn delete(&self, owner_id: OwnerId, name: &str) -> Result<bool>;
}

const SELECT_COLUMNS: &str =
    "SELECT owner_id, name, local_files_path, publish_target_url, updated_at FROM workspaces";

/// `WorkspaceStore` backed by the daemon's `meta.db`.
#[derive(Debug)]
pub struct SqliteWorkspaceStore {
    db: Mutex<MetaDb>,
}

impl SqliteWorkspaceStore {
    pub fn new(db: MetaDb) -> Self {
        Self { db: Mutex::new(db) }
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(MetaDb::open_in_memory()?))
    }

    fn db(&self) -> Result<MutexGuard<'_, MetaDb>> {
        self.db.lock().map_err(|_| anyhow!("meta.db connection lock poisoned"))
    }
}

impl WorkspaceStore for SqliteWorkspaceStore {
    fn get(&self, owner_id: OwnerId, name: &str) -> Result<Option<WorkspaceRecord>> {
        let db = self.db()?;
        db.connection()
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE owner_id = ?1 AND name = ?2"),
                params![owner_id, name],
                row_to_record,
            )
            .optional()
            .context("failed to query workspace by name")
    }

    fn get_by_publish_target(
        &self,
        owner_id: OwnerId,
        publish_target_url: &str,
    ) -> Result<Option<WorkspaceRecord>> {
        let db = self.db()?;
        db.connection()
            .query_row(
                &format!(
                    "{SELECT_COLUMNS} WHERE owner_id = ?1 AND publish_target_url = ?2 \
                     ORDER BY name ASC LIMIT 1"
                ),
                params![owner_id, publish_target_url],
                row_to_record,
            )
            .optional()
            .context("failed to query workspace by publish target")
    }

    fn all(&self, owner_id: OwnerId) -> Result<Vec<WorkspaceRecord>> {
        let db = self.db()?;
        let mut stmt = db
            .connection()
            .prepare(&format!("{SELECT_COLUMNS} WHERE owner_id = ?1 ORDER BY name ASC"))
            .context("failed to prepare workspace list query")?;

        let rows = stmt
            .query_map(params![owner_id], row_to_record)
            .context("failed to query workspaces by owner")?;

        rows.collect::<std::result::Result<Vec<_>, _>>().context("failed to collect workspace rows")
    }

    fn name_exists(&self, name: &str) -> Result<bool> {
        let db = self.db()?;
        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(1) FROM workspaces WHERE name = ?1", params![name], |row| {
                row.get(0)
            })
            .context("failed to check workspace name existence")?;
        Ok(count > 0)
    }

    fn upsert(&self, record: &WorkspaceRecord) -> Result<()> {
        let db = self.db()?;
        db.connection()
            .execute(
                "INSERT OR REPLACE INTO workspaces \
                 (owner_id, name, local_files_path, publish_target_url, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.owner_id,
                    record.name,
                    record.local_files_path,
                    record.publish_target_url,
                    record.updated_at.to_rfc3339(),
                ],
            )
            .context("failed to write workspace row")?;
        Ok(())
    }

    fn delete(&self, owner_id: OwnerId, name: &str) -> Result<bool> {
        let db = self.db()?;
        let changed = db
            .connection()
            .execute(
                "DELETE FROM workspaces WHERE owner_id = ?1 AND name = ?2",
                params![owner_id, name],
            )
            .context("failed to delete workspace row")?;
        Ok(changed > 0)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkspaceRecord> {
    let updated_at: String = row.get(4)?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(error))
        })?;

    Ok(WorkspaceRecord {
        owner_id: row.get(0)?,
        name: row.get(1)?,
        local_files_path: row.get(2)?,
        publish_target_url: row.get(3)?,
        updated_at,
    })
}
