//! Multi-workspace ClickUp bindings, many rows per guild.
//!
//! Invariant: at most one row per guild has `is_default = 1 AND is_active = 1`
//! at any time. Every write that could violate it (insert-as-default, explicit
//! default flip) clears prior defaults in the same transaction, so readers
//! never observe two defaults. Removal is a soft delete that also clears the
//! default flag.

use super::{ts, Store, StoreError};
use crate::crypto::SecretBlob;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

#[derive(Clone, Debug)]
pub struct WorkspaceRecord {
    pub id: i64,
    pub guild_id: i64,
    /// External ClickUp ID. Unique only together with `guild_id`.
    pub workspace_id: String,
    pub workspace_name: String,
    pub token: SecretBlob,
    pub is_active: bool,
    pub is_default: bool,
    pub added_by_user_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields for a workspace about to be inserted.
#[derive(Clone, Debug)]
pub struct NewWorkspace<'a> {
    pub guild_id: i64,
    pub workspace_id: &'a str,
    pub workspace_name: &'a str,
    pub token: &'a SecretBlob,
    pub added_by_user_id: i64,
}

const COLUMNS: &str = "id, guild_id, workspace_id, workspace_name, \
     token_ciphertext, token_nonce, is_active, is_default, \
     added_by_user_id, created_at, updated_at";

fn row_to_workspace(row: &Row<'_>) -> rusqlite::Result<WorkspaceRecord> {
    Ok(WorkspaceRecord {
        id: row.get(0)?,
        guild_id: row.get(1)?,
        workspace_id: row.get(2)?,
        workspace_name: row.get(3)?,
        token: SecretBlob {
            ciphertext: row.get(4)?,
            nonce: row.get(5)?,
        },
        is_active: row.get(6)?,
        is_default: row.get(7)?,
        added_by_user_id: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

impl Store {
    /// Store a workspace for a guild, reactivating it if it was previously
    /// removed. With `is_default`, any prior default is cleared in the same
    /// transaction.
    pub fn create_workspace(
        &self,
        new: &NewWorkspace<'_>,
        is_default: bool,
    ) -> Result<WorkspaceRecord, StoreError> {
        let now = ts(Utc::now());
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        if is_default {
            tx.execute(
                "UPDATE clickup_workspaces SET is_default = 0, updated_at = ?2 \
                 WHERE guild_id = ?1 AND is_default = 1",
                params![new.guild_id, now],
            )?;
        }

        tx.execute(
            r#"
            INSERT INTO clickup_workspaces (
                guild_id, workspace_id, workspace_name,
                token_ciphertext, token_nonce,
                is_active, is_default, added_by_user_id, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?8, ?8)
            ON CONFLICT(guild_id, workspace_id) DO UPDATE SET
                workspace_name = excluded.workspace_name,
                token_ciphertext = excluded.token_ciphertext,
                token_nonce = excluded.token_nonce,
                is_active = 1,
                is_default = excluded.is_default,
                updated_at = excluded.updated_at
            "#,
            params![
                new.guild_id,
                new.workspace_id,
                new.workspace_name,
                new.token.ciphertext,
                new.token.nonce,
                is_default,
                new.added_by_user_id,
                now,
            ],
        )?;

        let record = tx.query_row(
            &format!(
                "SELECT {COLUMNS} FROM clickup_workspaces \
                 WHERE guild_id = ?1 AND workspace_id = ?2"
            ),
            params![new.guild_id, new.workspace_id],
            row_to_workspace,
        )?;

        tx.commit()?;

        info!(
            guild_id = new.guild_id,
            workspace = %new.workspace_name,
            is_default,
            "Stored ClickUp workspace"
        );
        Ok(record)
    }

    /// Get a specific active workspace.
    pub fn get_workspace(
        &self,
        guild_id: i64,
        workspace_id: &str,
    ) -> Result<Option<WorkspaceRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM clickup_workspaces \
                     WHERE guild_id = ?1 AND workspace_id = ?2 AND is_active = 1"
                ),
                params![guild_id, workspace_id],
                row_to_workspace,
            )
            .optional()?;

        Ok(record)
    }

    /// The explicitly flagged default workspace, if any.
    pub fn default_workspace(
        &self,
        guild_id: i64,
    ) -> Result<Option<WorkspaceRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM clickup_workspaces \
                     WHERE guild_id = ?1 AND is_default = 1 AND is_active = 1"
                ),
                params![guild_id],
                row_to_workspace,
            )
            .optional()?;

        Ok(record)
    }

    /// Oldest active workspace by creation time. The resolver's deterministic
    /// fallback when no explicit default exists.
    pub fn oldest_active_workspace(
        &self,
        guild_id: i64,
    ) -> Result<Option<WorkspaceRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM clickup_workspaces \
                     WHERE guild_id = ?1 AND is_active = 1 \
                     ORDER BY created_at, id LIMIT 1"
                ),
                params![guild_id],
                row_to_workspace,
            )
            .optional()?;

        Ok(record)
    }

    /// All active workspaces for a guild, default first.
    pub fn list_workspaces(&self, guild_id: i64) -> Result<Vec<WorkspaceRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM clickup_workspaces \
             WHERE guild_id = ?1 AND is_active = 1 \
             ORDER BY is_default DESC, created_at, id"
        ))?;

        let records = stmt
            .query_map(params![guild_id], row_to_workspace)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Whether the guild has ever stored this workspace (active or removed).
    pub fn workspace_exists(&self, guild_id: i64, workspace_id: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let found = conn
            .query_row(
                "SELECT 1 FROM clickup_workspaces WHERE guild_id = ?1 AND workspace_id = ?2",
                params![guild_id, workspace_id],
                |_| Ok(()),
            )
            .optional()?;

        Ok(found.is_some())
    }

    /// Flag a workspace as the guild's default, clearing any prior default in
    /// the same transaction. Refuses removed workspaces and leaves the current
    /// default untouched when the target does not exist.
    pub fn set_default_workspace(
        &self,
        guild_id: i64,
        workspace_id: &str,
    ) -> Result<bool, StoreError> {
        let now = ts(Utc::now());
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let target: Option<i64> = tx
            .query_row(
                "SELECT id FROM clickup_workspaces \
                 WHERE guild_id = ?1 AND workspace_id = ?2 AND is_active = 1",
                params![guild_id, workspace_id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(target_id) = target else {
            return Ok(false);
        };

        tx.execute(
            "UPDATE clickup_workspaces SET is_default = 0, updated_at = ?2 \
             WHERE guild_id = ?1 AND is_default = 1",
            params![guild_id, now],
        )?;
        tx.execute(
            "UPDATE clickup_workspaces SET is_default = 1, updated_at = ?2 WHERE id = ?1",
            params![target_id, now],
        )?;

        tx.commit()?;

        info!(guild_id, workspace_id, "Set default ClickUp workspace");
        Ok(true)
    }

    /// Replace a workspace's stored token.
    pub fn update_workspace_token(
        &self,
        guild_id: i64,
        workspace_id: &str,
        token: &SecretBlob,
    ) -> Result<bool, StoreError> {
        let rows_affected = self.conn.lock().unwrap().execute(
            "UPDATE clickup_workspaces \
             SET token_ciphertext = ?3, token_nonce = ?4, updated_at = ?5 \
             WHERE guild_id = ?1 AND workspace_id = ?2",
            params![
                guild_id,
                workspace_id,
                token.ciphertext,
                token.nonce,
                ts(Utc::now()),
            ],
        )?;

        Ok(rows_affected > 0)
    }

    /// Soft delete. Also clears `is_default` so the default query never
    /// returns an inactive row; promoting a replacement default is the
    /// caller's decision.
    pub fn deactivate_workspace(
        &self,
        guild_id: i64,
        workspace_id: &str,
    ) -> Result<bool, StoreError> {
        let rows_affected = self.conn.lock().unwrap().execute(
            "UPDATE clickup_workspaces \
             SET is_active = 0, is_default = 0, updated_at = ?3 \
             WHERE guild_id = ?1 AND workspace_id = ?2",
            params![guild_id, workspace_id, ts(Utc::now())],
        )?;

        if rows_affected > 0 {
            info!(guild_id, workspace_id, "Removed ClickUp workspace");
        }
        Ok(rows_affected > 0)
    }
}
