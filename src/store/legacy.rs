//! Legacy single-workspace ClickUp configuration, one row per guild.
//!
//! Superseded by the multi-workspace table but still read by the resolver as
//! a fallback, and by the migration engine as its source. Migration copies
//! forward rather than deleting, so these rows are long-lived.

use super::{ts, Store, StoreError};
use crate::crypto::SecretBlob;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::info;

#[derive(Clone, Debug)]
pub struct LegacyConfigRecord {
    pub guild_id: i64,
    /// May be absent on rows created before workspace bookkeeping existed.
    pub workspace_id: Option<String>,
    pub token: Option<SecretBlob>,
    pub setup_complete: bool,
}

impl Store {
    /// Insert or replace the legacy config for a guild.
    ///
    /// A config marked `setup_complete` must carry a token; enforced here so
    /// readers never have to re-check the invariant.
    pub fn upsert_legacy_config(
        &self,
        guild_id: i64,
        workspace_id: Option<&str>,
        token: Option<&SecretBlob>,
        setup_complete: bool,
    ) -> Result<(), StoreError> {
        if setup_complete && token.is_none() {
            return Err(StoreError::LegacyTokenMissing);
        }

        let now = ts(Utc::now());
        self.conn.lock().unwrap().execute(
            r#"
            INSERT INTO legacy_configs (
                guild_id, workspace_id, token_ciphertext, token_nonce,
                setup_complete, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT(guild_id) DO UPDATE SET
                workspace_id = excluded.workspace_id,
                token_ciphertext = excluded.token_ciphertext,
                token_nonce = excluded.token_nonce,
                setup_complete = excluded.setup_complete,
                updated_at = excluded.updated_at
            "#,
            params![
                guild_id,
                workspace_id,
                token.map(|t| t.ciphertext.as_str()),
                token.map(|t| t.nonce.as_str()),
                setup_complete,
                now,
            ],
        )?;

        info!(guild_id, setup_complete, "Saved legacy ClickUp config");
        Ok(())
    }

    pub fn get_legacy_config(
        &self,
        guild_id: i64,
    ) -> Result<Option<LegacyConfigRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                r#"
                SELECT workspace_id, token_ciphertext, token_nonce, setup_complete
                FROM legacy_configs
                WHERE guild_id = ?1
                "#,
                params![guild_id],
                |row| {
                    let ciphertext: Option<String> = row.get(1)?;
                    let nonce: Option<String> = row.get(2)?;
                    Ok(LegacyConfigRecord {
                        guild_id,
                        workspace_id: row.get(0)?,
                        token: match (ciphertext, nonce) {
                            (Some(ciphertext), Some(nonce)) => {
                                Some(SecretBlob { ciphertext, nonce })
                            }
                            _ => None,
                        },
                        setup_complete: row.get(3)?,
                    })
                },
            )
            .optional()?;

        Ok(record)
    }

    pub fn delete_legacy_config(&self, guild_id: i64) -> Result<bool, StoreError> {
        let rows_affected = self.conn.lock().unwrap().execute(
            "DELETE FROM legacy_configs WHERE guild_id = ?1",
            params![guild_id],
        )?;

        Ok(rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{test_cipher, test_store};
    use super::*;

    #[test]
    fn test_upsert_and_get() {
        let store = test_store();
        let cipher = test_cipher();
        let blob = cipher.encrypt("legacy-token").unwrap();

        store
            .upsert_legacy_config(1, Some("ws_9"), Some(&blob), true)
            .unwrap();

        let config = store.get_legacy_config(1).unwrap().unwrap();
        assert_eq!(config.workspace_id.as_deref(), Some("ws_9"));
        assert!(config.setup_complete);
        assert_eq!(cipher.decrypt(&config.token.unwrap()).unwrap(), "legacy-token");
    }

    #[test]
    fn test_setup_complete_requires_token() {
        let store = test_store();

        let result = store.upsert_legacy_config(1, Some("ws_9"), None, true);
        assert!(matches!(result, Err(StoreError::LegacyTokenMissing)));

        // Incomplete setup without a token is fine
        store.upsert_legacy_config(1, None, None, false).unwrap();
        let config = store.get_legacy_config(1).unwrap().unwrap();
        assert!(!config.setup_complete);
        assert!(config.token.is_none());
    }

    #[test]
    fn test_upsert_replaces_existing() {
        let store = test_store();
        let cipher = test_cipher();

        let old = cipher.encrypt("old").unwrap();
        let new = cipher.encrypt("new").unwrap();
        store.upsert_legacy_config(1, None, Some(&old), true).unwrap();
        store
            .upsert_legacy_config(1, Some("ws_1"), Some(&new), true)
            .unwrap();

        let config = store.get_legacy_config(1).unwrap().unwrap();
        assert_eq!(config.workspace_id.as_deref(), Some("ws_1"));
        assert_eq!(cipher.decrypt(&config.token.unwrap()).unwrap(), "new");
    }

    #[test]
    fn test_delete() {
        let store = test_store();
        store.upsert_legacy_config(1, None, None, false).unwrap();

        assert!(store.delete_legacy_config(1).unwrap());
        assert!(store.get_legacy_config(1).unwrap().is_none());
        assert!(!store.delete_legacy_config(1).unwrap());
    }

    #[test]
    fn test_guild_isolation() {
        let store = test_store();
        store.upsert_legacy_config(1, None, None, false).unwrap();

        assert!(store.get_legacy_config(2).unwrap().is_none());
    }
}
