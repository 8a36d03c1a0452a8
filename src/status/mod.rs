//! Configuration health classification and legacy-to-new migration.

use crate::clickup::{ClickUpApi, ClickUpError};
use crate::crypto::{CryptoError, SecretCipher};
use crate::resolver::{self, CredentialSource, ResolveError};
use crate::store::{NewWorkspace, Store, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("stored credential failed to decrypt: {0}")]
    Decryption(#[source] CryptoError),
    #[error("re-encryption failed: {0}")]
    Encryption(#[source] CryptoError),
}

impl From<ResolveError> for EngineError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::Store(e) => EngineError::Store(e),
            ResolveError::Decryption(e) => EngineError::Decryption(e),
        }
    }
}

/// What the guild should do about its ClickUp configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recommendation {
    AllGood,
    MigrateRecommended,
    TokenInvalid,
    SetupRequired,
}

/// Health report for a guild's ClickUp configuration.
#[derive(Clone, Debug)]
pub struct ConfigStatus {
    /// A new-schema credential resolved (explicit default or oldest-active
    /// fallback).
    pub has_new: bool,
    /// A completed legacy config with a token exists.
    pub has_legacy: bool,
    /// The resolved credential decrypted and passed external validation.
    pub working: bool,
    /// Validation failed because ClickUp could not be reached rather than
    /// because it refused the token. The recommendation still reads
    /// `TokenInvalid`, matching historical behavior; callers that want to
    /// suggest "retry later" instead of "reconfigure" check this flag.
    pub unreachable: bool,
    /// `(workspace_id, workspace_name)` of the credential the guild would use.
    pub default_workspace: Option<(String, String)>,
    pub recommendation: Recommendation,
}

enum ValidationOutcome {
    Valid,
    Rejected,
    Unreachable,
}

/// Drives status checks and migration over the store, the cipher, and the
/// ClickUp API.
pub struct ConfigEngine {
    store: Arc<Store>,
    cipher: Arc<SecretCipher>,
    clickup: Arc<dyn ClickUpApi>,
}

impl ConfigEngine {
    pub fn new(store: Arc<Store>, cipher: Arc<SecretCipher>, clickup: Arc<dyn ClickUpApi>) -> Self {
        Self {
            store,
            cipher,
            clickup,
        }
    }

    /// Classify a guild's ClickUp configuration.
    ///
    /// Decision order, first match wins: working new-schema credential →
    /// `AllGood`; working legacy-only credential → `MigrateRecommended`; a
    /// credential that fails decryption or external validation →
    /// `TokenInvalid`; nothing configured → `SetupRequired`.
    pub async fn get_status(&self, guild_id: i64) -> Result<ConfigStatus, EngineError> {
        let has_legacy = self
            .store
            .get_legacy_config(guild_id)?
            .map(|legacy| legacy.setup_complete && legacy.token.is_some())
            .unwrap_or(false);

        let workspace = match self.store.default_workspace(guild_id)? {
            Some(ws) => Some(ws),
            None => self.store.oldest_active_workspace(guild_id)?,
        };
        let has_new = workspace.is_some();
        let default_workspace =
            workspace.map(|ws| (ws.workspace_id, ws.workspace_name));

        let mut status = ConfigStatus {
            has_new,
            has_legacy,
            working: false,
            unreachable: false,
            default_workspace,
            recommendation: Recommendation::SetupRequired,
        };

        let resolved =
            match resolver::resolve_active_clickup_credential(&self.store, &self.cipher, guild_id)
            {
                Ok(resolved) => resolved,
                Err(ResolveError::Decryption(e)) => {
                    warn!(guild_id, error = %e, "Stored ClickUp credential failed to decrypt");
                    status.recommendation = Recommendation::TokenInvalid;
                    return Ok(status);
                }
                Err(ResolveError::Store(e)) => return Err(e.into()),
            };

        let Some(credential) = resolved else {
            return Ok(status);
        };

        match self.validate_token(guild_id, &credential.token).await {
            ValidationOutcome::Valid => {
                status.working = true;
                status.recommendation = match credential.source {
                    CredentialSource::Workspace => Recommendation::AllGood,
                    CredentialSource::Legacy => Recommendation::MigrateRecommended,
                };
            }
            ValidationOutcome::Rejected => {
                status.recommendation = Recommendation::TokenInvalid;
            }
            ValidationOutcome::Unreachable => {
                status.unreachable = true;
                status.recommendation = Recommendation::TokenInvalid;
            }
        }

        Ok(status)
    }

    /// Copy a guild's legacy config forward into the workspace schema.
    ///
    /// Idempotent: returns `Ok(true)` without touching anything when the
    /// guild already has an active workspace. `Ok(false)` means a failed
    /// precondition (no usable legacy data, or the legacy token failed
    /// external validation) with no state mutated. The legacy row is left in
    /// place on success — copy-forward, not cutover, so a failed migration
    /// leaves the legacy path working.
    pub async fn migrate_legacy_to_new(
        &self,
        guild_id: i64,
        acting_user_id: i64,
    ) -> Result<bool, EngineError> {
        let existing = match self.store.default_workspace(guild_id)? {
            Some(ws) => Some(ws),
            None => self.store.oldest_active_workspace(guild_id)?,
        };
        if existing.is_some() {
            info!(guild_id, "Guild already uses the workspace schema, nothing to migrate");
            return Ok(true);
        }

        let Some(legacy) = self.store.get_legacy_config(guild_id)? else {
            info!(guild_id, "No legacy config to migrate");
            return Ok(false);
        };
        if !legacy.setup_complete {
            info!(guild_id, "Legacy config never completed setup, nothing to migrate");
            return Ok(false);
        }
        let Some(blob) = legacy.token.as_ref() else {
            return Ok(false);
        };

        let token = self
            .cipher
            .decrypt(blob)
            .map_err(EngineError::Decryption)?;

        let workspaces = match self.clickup.list_workspaces(&token).await {
            Ok(workspaces) => workspaces,
            Err(e) => {
                warn!(guild_id, error = %e, "Legacy token failed validation, migration aborted");
                return Ok(false);
            }
        };
        if workspaces.is_empty() {
            warn!(guild_id, "Legacy token grants no workspaces, migration aborted");
            return Ok(false);
        }

        // Prefer the workspace the legacy config pointed at; otherwise the
        // first one the token grants.
        let target = legacy
            .workspace_id
            .as_deref()
            .and_then(|id| workspaces.iter().find(|ws| ws.id == id))
            .unwrap_or(&workspaces[0]);

        // The migrated row is a new secret entry with fresh encryption, never
        // a copy of the legacy ciphertext.
        let reencrypted = self
            .cipher
            .encrypt(&token)
            .map_err(EngineError::Encryption)?;

        let record = self.store.create_workspace(
            &NewWorkspace {
                guild_id,
                workspace_id: &target.id,
                workspace_name: &target.name,
                token: &reencrypted,
                added_by_user_id: acting_user_id,
            },
            true,
        )?;

        info!(
            guild_id,
            workspace = %record.workspace_name,
            "Migrated legacy config to the workspace schema"
        );
        Ok(true)
    }

    async fn validate_token(&self, guild_id: i64, token: &str) -> ValidationOutcome {
        match self.clickup.list_workspaces(token).await {
            Ok(_) => ValidationOutcome::Valid,
            Err(ClickUpError::TokenRejected(code)) => {
                warn!(guild_id, code, "ClickUp rejected the stored token");
                ValidationOutcome::Rejected
            }
            Err(e) => {
                warn!(guild_id, error = %e, "ClickUp validation did not complete");
                ValidationOutcome::Unreachable
            }
        }
    }
}
