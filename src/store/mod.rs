//! Per-guild credential storage backed by SQLite.
//!
//! Every secret column pair (`*_ciphertext`, `*_nonce`) holds a
//! [`SecretBlob`](crate::crypto::SecretBlob) produced by the crypto module;
//! plaintext never reaches the database. The guild is the tenant boundary:
//! every query filters by `guild_id`, and there is no global credential
//! listing.
//!
//! # Thread Safety
//! - Connection is wrapped in Mutex for safe concurrent access
//! - Writes that touch the default-workspace invariant run in a transaction

mod claude;
mod google;
mod legacy;
mod oauth_states;
mod workspaces;

pub use claude::{ClaudeConfigRecord, ClaudeSettings};
pub use google::GoogleCredentialRecord;
pub use legacy::LegacyConfigRecord;
pub use workspaces::{NewWorkspace, WorkspaceRecord};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("a completed legacy config must carry a token")]
    LegacyTokenMissing,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS legacy_configs (
    guild_id INTEGER PRIMARY KEY,
    workspace_id TEXT,
    token_ciphertext TEXT,
    token_nonce TEXT,
    setup_complete INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS clickup_workspaces (
    id INTEGER PRIMARY KEY,
    guild_id INTEGER NOT NULL,
    workspace_id TEXT NOT NULL,
    workspace_name TEXT NOT NULL,
    token_ciphertext TEXT NOT NULL,
    token_nonce TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    is_default INTEGER NOT NULL DEFAULT 0,
    added_by_user_id INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(guild_id, workspace_id)
);
CREATE INDEX IF NOT EXISTS idx_workspaces_guild ON clickup_workspaces(guild_id, is_active);

CREATE TABLE IF NOT EXISTS claude_configs (
    guild_id INTEGER PRIMARY KEY,
    api_key_ciphertext TEXT NOT NULL,
    api_key_nonce TEXT NOT NULL,
    model TEXT NOT NULL,
    max_tokens INTEGER NOT NULL,
    temperature REAL NOT NULL,
    is_enabled INTEGER NOT NULL DEFAULT 1,
    added_by_user_id INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS google_credentials (
    id INTEGER PRIMARY KEY,
    guild_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    email TEXT NOT NULL,
    credentials_ciphertext TEXT NOT NULL,
    credentials_nonce TEXT NOT NULL,
    is_default INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(guild_id, user_id)
);
CREATE INDEX IF NOT EXISTS idx_google_credentials_guild ON google_credentials(guild_id);

CREATE TABLE IF NOT EXISTS oauth_states (
    state TEXT PRIMARY KEY,
    provider TEXT NOT NULL,
    guild_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_oauth_states_expiry ON oauth_states(expires_at);
"#;

/// Timestamps are stored as fixed-width RFC 3339 UTC (microsecond precision,
/// `Z` suffix) so lexicographic comparison in SQL matches chronological order.
pub(crate) fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Credential store over a single SQLite database.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Creates or opens the store, creating the schema if needed.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}
