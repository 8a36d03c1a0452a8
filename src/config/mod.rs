//! Process configuration read from `GUILDVAULT_*` environment variables.

use crate::crypto;
use anyhow::{Context, Result};
use std::time::Duration;

/// Default timeout for external token-validation calls.
const DEFAULT_VALIDATION_TIMEOUT_SECS: u64 = 8;

/// How long an issued OAuth state token stays valid.
const DEFAULT_OAUTH_STATE_TTL_SECS: u64 = 600;

/// OAuth client credentials for one provider.
#[derive(Clone, Debug)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Everything the credential core needs at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base64-encoded 256-bit master key. Validated at load time.
    pub encryption_key: String,
    pub database_path: String,
    pub clickup_oauth: Option<OAuthClientConfig>,
    pub google_oauth: Option<OAuthClientConfig>,
    pub validation_timeout: Duration,
    pub oauth_state_ttl: Duration,
}

impl Config {
    /// Build from env vars.
    ///
    /// Fails if `GUILDVAULT_ENCRYPTION_KEY` is missing or does not decode to
    /// 32 bytes — starting without the real key would orphan every stored
    /// secret, so this aborts startup instead of falling back to a generated
    /// key.
    pub fn from_env() -> Result<Self> {
        let encryption_key = std::env::var("GUILDVAULT_ENCRYPTION_KEY")
            .context("GUILDVAULT_ENCRYPTION_KEY is not set")?;
        crypto::validate_key(&encryption_key)
            .context("GUILDVAULT_ENCRYPTION_KEY is not a usable 256-bit key")?;

        let database_path = std::env::var("GUILDVAULT_DATABASE_PATH")
            .unwrap_or_else(|_| "guildvault.db".to_string());

        let mut validation_timeout = Duration::from_secs(DEFAULT_VALIDATION_TIMEOUT_SECS);
        if let Ok(v) = std::env::var("GUILDVAULT_VALIDATION_TIMEOUT_SECS") {
            if let Ok(n) = v.parse::<u64>() {
                validation_timeout = Duration::from_secs(n.clamp(1, 30));
            }
        }

        let mut oauth_state_ttl = Duration::from_secs(DEFAULT_OAUTH_STATE_TTL_SECS);
        if let Ok(v) = std::env::var("GUILDVAULT_OAUTH_STATE_TTL_SECS") {
            if let Ok(n) = v.parse::<u64>() {
                oauth_state_ttl = Duration::from_secs(n);
            }
        }

        Ok(Self {
            encryption_key,
            database_path,
            clickup_oauth: oauth_client_from_env("CLICKUP"),
            google_oauth: oauth_client_from_env("GOOGLE"),
            validation_timeout,
            oauth_state_ttl,
        })
    }
}

/// Load one provider's OAuth client credentials, `None` if not configured.
fn oauth_client_from_env(provider: &str) -> Option<OAuthClientConfig> {
    let client_id = std::env::var(format!("GUILDVAULT_OAUTH_{provider}_CLIENT_ID")).ok()?;
    let client_secret = std::env::var(format!("GUILDVAULT_OAUTH_{provider}_CLIENT_SECRET")).ok()?;
    let redirect_uri = std::env::var(format!("GUILDVAULT_OAUTH_{provider}_REDIRECT_URI")).ok()?;

    Some(OAuthClientConfig {
        client_id,
        client_secret,
        redirect_uri,
    })
}
