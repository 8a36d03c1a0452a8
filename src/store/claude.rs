//! Claude API configuration, one row per guild.
//!
//! Enable/disable is a flag flip, never a delete, so settings survive toggles.

use super::{ts, Store, StoreError};
use crate::crypto::SecretBlob;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::info;

const MAX_TOKENS_LIMIT: u32 = 200_000;

/// Model settings, bounds-checked on every write (never clamped).
#[derive(Clone, Debug, PartialEq)]
pub struct ClaudeSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for ClaudeSettings {
    fn default() -> Self {
        Self {
            model: "claude-3-opus-20240229".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
        }
    }
}

fn check_max_tokens(max_tokens: u32) -> Result<(), StoreError> {
    if max_tokens == 0 || max_tokens > MAX_TOKENS_LIMIT {
        return Err(StoreError::InvalidSettings(format!(
            "max_tokens must be between 1 and {MAX_TOKENS_LIMIT}, got {max_tokens}"
        )));
    }
    Ok(())
}

fn check_temperature(temperature: f64) -> Result<(), StoreError> {
    if !(0.0..=1.0).contains(&temperature) {
        return Err(StoreError::InvalidSettings(format!(
            "temperature must be within 0.0..=1.0, got {temperature}"
        )));
    }
    Ok(())
}

#[derive(Clone, Debug)]
pub struct ClaudeConfigRecord {
    pub guild_id: i64,
    pub api_key: SecretBlob,
    pub settings: ClaudeSettings,
    pub is_enabled: bool,
    pub added_by_user_id: i64,
}

impl Store {
    /// Create or replace the Claude config for a guild. Re-enables on update,
    /// matching the setup command's behavior.
    pub fn upsert_claude_config(
        &self,
        guild_id: i64,
        api_key: &SecretBlob,
        settings: &ClaudeSettings,
        added_by_user_id: i64,
    ) -> Result<ClaudeConfigRecord, StoreError> {
        check_max_tokens(settings.max_tokens)?;
        check_temperature(settings.temperature)?;

        let now = ts(Utc::now());
        self.conn.lock().unwrap().execute(
            r#"
            INSERT INTO claude_configs (
                guild_id, api_key_ciphertext, api_key_nonce,
                model, max_tokens, temperature,
                is_enabled, added_by_user_id, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8, ?8)
            ON CONFLICT(guild_id) DO UPDATE SET
                api_key_ciphertext = excluded.api_key_ciphertext,
                api_key_nonce = excluded.api_key_nonce,
                model = excluded.model,
                max_tokens = excluded.max_tokens,
                temperature = excluded.temperature,
                is_enabled = 1,
                added_by_user_id = excluded.added_by_user_id,
                updated_at = excluded.updated_at
            "#,
            params![
                guild_id,
                api_key.ciphertext,
                api_key.nonce,
                settings.model,
                settings.max_tokens,
                settings.temperature,
                added_by_user_id,
                now,
            ],
        )?;

        info!(guild_id, model = %settings.model, "Saved Claude config");

        Ok(ClaudeConfigRecord {
            guild_id,
            api_key: api_key.clone(),
            settings: settings.clone(),
            is_enabled: true,
            added_by_user_id,
        })
    }

    /// The guild's Claude config regardless of the enabled flag; callers
    /// check `is_enabled` explicitly rather than having disabled rows
    /// silently filtered away.
    pub fn get_claude_config(
        &self,
        guild_id: i64,
    ) -> Result<Option<ClaudeConfigRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                r#"
                SELECT api_key_ciphertext, api_key_nonce, model, max_tokens,
                       temperature, is_enabled, added_by_user_id
                FROM claude_configs
                WHERE guild_id = ?1
                "#,
                params![guild_id],
                |row| {
                    Ok(ClaudeConfigRecord {
                        guild_id,
                        api_key: SecretBlob {
                            ciphertext: row.get(0)?,
                            nonce: row.get(1)?,
                        },
                        settings: ClaudeSettings {
                            model: row.get(2)?,
                            max_tokens: row.get(3)?,
                            temperature: row.get(4)?,
                        },
                        is_enabled: row.get(5)?,
                        added_by_user_id: row.get(6)?,
                    })
                },
            )
            .optional()?;

        Ok(record)
    }

    /// Rotate the stored API key.
    pub fn update_claude_api_key(
        &self,
        guild_id: i64,
        api_key: &SecretBlob,
    ) -> Result<bool, StoreError> {
        let rows_affected = self.conn.lock().unwrap().execute(
            "UPDATE claude_configs \
             SET api_key_ciphertext = ?2, api_key_nonce = ?3, updated_at = ?4 \
             WHERE guild_id = ?1",
            params![guild_id, api_key.ciphertext, api_key.nonce, ts(Utc::now())],
        )?;

        Ok(rows_affected > 0)
    }

    /// Update any subset of the model settings. Returns `false` when nothing
    /// was provided or no config exists.
    pub fn update_claude_settings(
        &self,
        guild_id: i64,
        model: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f64>,
    ) -> Result<bool, StoreError> {
        if model.is_none() && max_tokens.is_none() && temperature.is_none() {
            return Ok(false);
        }
        if let Some(max_tokens) = max_tokens {
            check_max_tokens(max_tokens)?;
        }
        if let Some(temperature) = temperature {
            check_temperature(temperature)?;
        }

        let rows_affected = self.conn.lock().unwrap().execute(
            "UPDATE claude_configs SET \
                 model = COALESCE(?2, model), \
                 max_tokens = COALESCE(?3, max_tokens), \
                 temperature = COALESCE(?4, temperature), \
                 updated_at = ?5 \
             WHERE guild_id = ?1",
            params![guild_id, model, max_tokens, temperature, ts(Utc::now())],
        )?;

        Ok(rows_affected > 0)
    }

    /// Flip the enabled flag, preserving all settings.
    pub fn set_claude_enabled(&self, guild_id: i64, enabled: bool) -> Result<bool, StoreError> {
        let rows_affected = self.conn.lock().unwrap().execute(
            "UPDATE claude_configs SET is_enabled = ?2, updated_at = ?3 WHERE guild_id = ?1",
            params![guild_id, enabled, ts(Utc::now())],
        )?;

        Ok(rows_affected > 0)
    }

    pub fn delete_claude_config(&self, guild_id: i64) -> Result<bool, StoreError> {
        let rows_affected = self.conn.lock().unwrap().execute(
            "DELETE FROM claude_configs WHERE guild_id = ?1",
            params![guild_id],
        )?;

        Ok(rows_affected > 0)
    }
}
