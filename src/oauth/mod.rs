//! OAuth state brokering: CSRF state tokens issued when a user starts an
//! authorization flow and consumed exactly once when the callback arrives.

pub mod provider;

pub use provider::{build_auth_url, Provider};

use crate::config::OAuthClientConfig;
use crate::store::{Store, StoreError};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// A freshly started authorization flow: the state token bound into the URL
/// and the URL to send the user to.
#[derive(Clone, Debug)]
pub struct AuthRequest {
    pub state: String,
    pub auth_url: String,
}

/// Issues and validates single-use OAuth state tokens.
///
/// Time is injected so expiry behavior is testable without sleeping.
pub struct StateBroker {
    store: Arc<Store>,
    ttl: ChronoDuration,
    clock: Clock,
}

impl StateBroker {
    pub fn new(store: Arc<Store>, ttl: Duration) -> Self {
        Self::with_clock(store, ttl, Arc::new(Utc::now))
    }

    pub fn with_clock(store: Arc<Store>, ttl: Duration, clock: Clock) -> Self {
        let ttl = ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::minutes(10));
        Self { store, ttl, clock }
    }

    /// Issue a state token for a (guild, user) pair and store it with its
    /// expiry.
    pub fn create_state(
        &self,
        provider: Provider,
        guild_id: i64,
        user_id: i64,
    ) -> Result<String, StoreError> {
        let state = Uuid::new_v4().to_string();
        let now = (self.clock)();
        // Issuing a state doubles as the cleanup point for abandoned flows
        self.store.sweep_expired_oauth_states(now)?;
        self.store.insert_oauth_state(
            &state,
            provider.as_str(),
            guild_id,
            user_id,
            now,
            now + self.ttl,
        )?;

        info!(guild_id, user_id, %provider, "Issued OAuth state");
        Ok(state)
    }

    /// Start an authorization flow: issue a state and build the provider URL
    /// carrying it.
    pub fn begin_authorization(
        &self,
        provider: Provider,
        client: &OAuthClientConfig,
        guild_id: i64,
        user_id: i64,
    ) -> Result<AuthRequest, StoreError> {
        let state = self.create_state(provider, guild_id, user_id)?;
        let auth_url = build_auth_url(provider, client, &state);

        Ok(AuthRequest { state, auth_url })
    }

    /// Redeem a state token from a provider callback.
    ///
    /// Returns the `(guild_id, user_id)` the token was issued for, exactly
    /// once; unknown, expired, already-used, and wrong-provider tokens all
    /// come back as `None`.
    pub fn validate_state(
        &self,
        state: &str,
        provider: Provider,
    ) -> Result<Option<(i64, i64)>, StoreError> {
        let identity = self
            .store
            .consume_oauth_state(state, provider.as_str(), (self.clock)())?;

        match identity {
            Some((guild_id, user_id)) => {
                info!(guild_id, user_id, %provider, "OAuth state validated");
            }
            None => {
                debug!(%provider, "OAuth state rejected");
            }
        }
        Ok(identity)
    }

    /// Drop expired, never-redeemed states. Returns how many were removed.
    pub fn sweep_expired(&self) -> Result<usize, StoreError> {
        let swept = self.store.sweep_expired_oauth_states((self.clock)())?;
        if swept > 0 {
            debug!(swept, "Swept expired OAuth states");
        }
        Ok(swept)
    }
}
