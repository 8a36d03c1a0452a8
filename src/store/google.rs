//! Google OAuth credentials, one row per (guild, user).
//!
//! A guild may hold several users' credentials with at most one flagged
//! default. The first credential saved for a guild becomes the default
//! automatically.

use super::{ts, Store, StoreError};
use crate::crypto::SecretBlob;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

#[derive(Clone, Debug)]
pub struct GoogleCredentialRecord {
    pub guild_id: i64,
    pub user_id: i64,
    pub email: String,
    /// Encrypted credential JSON as returned by the OAuth code exchange.
    pub credentials: SecretBlob,
    pub is_default: bool,
}

const COLUMNS: &str =
    "guild_id, user_id, email, credentials_ciphertext, credentials_nonce, is_default";

fn row_to_credential(row: &Row<'_>) -> rusqlite::Result<GoogleCredentialRecord> {
    Ok(GoogleCredentialRecord {
        guild_id: row.get(0)?,
        user_id: row.get(1)?,
        email: row.get(2)?,
        credentials: SecretBlob {
            ciphertext: row.get(3)?,
            nonce: row.get(4)?,
        },
        is_default: row.get(5)?,
    })
}

impl Store {
    /// Save (or re-save after re-authorization) a user's credentials.
    ///
    /// The first credential stored for a guild becomes its default; a re-save
    /// keeps whatever default flag the row already carries.
    pub fn save_google_credentials(
        &self,
        guild_id: i64,
        user_id: i64,
        email: &str,
        credentials: &SecretBlob,
    ) -> Result<GoogleCredentialRecord, StoreError> {
        let now = ts(Utc::now());
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let guild_has_rows: bool = tx
            .query_row(
                "SELECT 1 FROM google_credentials WHERE guild_id = ?1 LIMIT 1",
                params![guild_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();

        tx.execute(
            r#"
            INSERT INTO google_credentials (
                guild_id, user_id, email,
                credentials_ciphertext, credentials_nonce,
                is_default, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            ON CONFLICT(guild_id, user_id) DO UPDATE SET
                email = excluded.email,
                credentials_ciphertext = excluded.credentials_ciphertext,
                credentials_nonce = excluded.credentials_nonce,
                updated_at = excluded.updated_at
            "#,
            params![
                guild_id,
                user_id,
                email,
                credentials.ciphertext,
                credentials.nonce,
                !guild_has_rows,
                now,
            ],
        )?;

        let record = tx.query_row(
            &format!("SELECT {COLUMNS} FROM google_credentials WHERE guild_id = ?1 AND user_id = ?2"),
            params![guild_id, user_id],
            row_to_credential,
        )?;

        tx.commit()?;

        info!(guild_id, user_id, email, "Saved Google credentials");
        Ok(record)
    }

    /// A specific user's credentials, or the guild default when `user_id` is
    /// `None`.
    pub fn get_google_credentials(
        &self,
        guild_id: i64,
        user_id: Option<i64>,
    ) -> Result<Option<GoogleCredentialRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let record = match user_id {
            Some(user_id) => conn
                .query_row(
                    &format!(
                        "SELECT {COLUMNS} FROM google_credentials \
                         WHERE guild_id = ?1 AND user_id = ?2"
                    ),
                    params![guild_id, user_id],
                    row_to_credential,
                )
                .optional()?,
            None => conn
                .query_row(
                    &format!(
                        "SELECT {COLUMNS} FROM google_credentials \
                         WHERE guild_id = ?1 AND is_default = 1"
                    ),
                    params![guild_id],
                    row_to_credential,
                )
                .optional()?,
        };

        Ok(record)
    }

    /// All credentials stored for a guild, default first.
    pub fn list_google_credentials(
        &self,
        guild_id: i64,
    ) -> Result<Vec<GoogleCredentialRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM google_credentials \
             WHERE guild_id = ?1 ORDER BY is_default DESC, created_at, id"
        ))?;

        let records = stmt
            .query_map(params![guild_id], row_to_credential)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Make a user's credentials the guild default, clearing the previous
    /// default in the same transaction.
    pub fn set_default_google_credentials(
        &self,
        guild_id: i64,
        user_id: i64,
    ) -> Result<bool, StoreError> {
        let now = ts(Utc::now());
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let target_exists: bool = tx
            .query_row(
                "SELECT 1 FROM google_credentials WHERE guild_id = ?1 AND user_id = ?2",
                params![guild_id, user_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();

        if !target_exists {
            return Ok(false);
        }

        tx.execute(
            "UPDATE google_credentials SET is_default = 0, updated_at = ?2 \
             WHERE guild_id = ?1 AND is_default = 1",
            params![guild_id, now],
        )?;
        tx.execute(
            "UPDATE google_credentials SET is_default = 1, updated_at = ?3 \
             WHERE guild_id = ?1 AND user_id = ?2",
            params![guild_id, user_id, now],
        )?;

        tx.commit()?;

        info!(guild_id, user_id, "Set default Google credentials");
        Ok(true)
    }

    /// Remove a user's credentials. Promotion of a new default, if the
    /// removed row was the default, is the caller's decision.
    pub fn remove_google_credentials(
        &self,
        guild_id: i64,
        user_id: i64,
    ) -> Result<bool, StoreError> {
        let rows_affected = self.conn.lock().unwrap().execute(
            "DELETE FROM google_credentials WHERE guild_id = ?1 AND user_id = ?2",
            params![guild_id, user_id],
        )?;

        if rows_affected > 0 {
            info!(guild_id, user_id, "Removed Google credentials");
        }
        Ok(rows_affected > 0)
    }
}
