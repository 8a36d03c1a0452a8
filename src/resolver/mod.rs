//! Active ClickUp credential resolution.
//!
//! A guild can hold credentials under two historical schemas at once: the
//! multi-workspace table and the legacy single-workspace config. The resolver
//! picks the one credential command handlers should use, new schema first.

use crate::crypto::{CryptoError, SecretCipher};
use crate::store::{Store, StoreError};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A credential exists but its ciphertext cannot be decrypted. Never
    /// folded into "no credential": the fix is operational (key rotation or
    /// corruption), not re-running setup.
    #[error("stored credential failed to decrypt: {0}")]
    Decryption(#[source] CryptoError),
}

/// Which schema a resolved credential came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialSource {
    Workspace,
    Legacy,
}

/// A decrypted, ready-to-use ClickUp credential for one guild.
#[derive(Clone, Debug)]
pub struct ResolvedCredential {
    /// Absent only for legacy configs created before workspace bookkeeping.
    pub workspace_id: Option<String>,
    pub workspace_name: Option<String>,
    pub token: String,
    pub source: CredentialSource,
}

/// Resolve the single active ClickUp credential for a guild.
///
/// Precedence: explicit default workspace, then the oldest active workspace
/// (deterministic when a row predates default bookkeeping or the default was
/// removed without promotion), then a completed legacy config. `Ok(None)`
/// means the guild simply has not been set up — an expected state, not an
/// error.
pub fn resolve_active_clickup_credential(
    store: &Store,
    cipher: &SecretCipher,
    guild_id: i64,
) -> Result<Option<ResolvedCredential>, ResolveError> {
    let workspace = match store.default_workspace(guild_id)? {
        Some(ws) => Some(ws),
        None => store.oldest_active_workspace(guild_id)?,
    };

    if let Some(ws) = workspace {
        let token = cipher.decrypt(&ws.token).map_err(ResolveError::Decryption)?;
        debug!(guild_id, workspace = %ws.workspace_name, "Resolved workspace credential");
        return Ok(Some(ResolvedCredential {
            workspace_id: Some(ws.workspace_id),
            workspace_name: Some(ws.workspace_name),
            token,
            source: CredentialSource::Workspace,
        }));
    }

    if let Some(legacy) = store.get_legacy_config(guild_id)? {
        if legacy.setup_complete {
            if let Some(blob) = legacy.token {
                let token = cipher.decrypt(&blob).map_err(ResolveError::Decryption)?;
                debug!(guild_id, "Resolved legacy credential");
                return Ok(Some(ResolvedCredential {
                    workspace_id: legacy.workspace_id,
                    workspace_name: None,
                    token,
                    source: CredentialSource::Legacy,
                }));
            }
        }
    }

    Ok(None)
}
