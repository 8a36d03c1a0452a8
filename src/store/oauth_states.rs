//! Ephemeral OAuth state rows shared by the ClickUp and Google flows.
//!
//! Consumption is a single conditional `DELETE ... RETURNING`: under a
//! concurrent double submission of the same callback exactly one caller gets
//! the row and the other sees nothing, with no read-then-delete window.

use super::{ts, Store, StoreError};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

impl Store {
    pub fn insert_oauth_state(
        &self,
        state: &str,
        provider: &str,
        guild_id: i64,
        user_id: i64,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.conn.lock().unwrap().execute(
            "INSERT INTO oauth_states (state, provider, guild_id, user_id, created_at, expires_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![state, provider, guild_id, user_id, ts(created_at), ts(expires_at)],
        )?;

        Ok(())
    }

    /// Atomically look up, verify, and delete a state token.
    ///
    /// Returns the bound `(guild_id, user_id)` only when the token exists for
    /// this provider and has not expired. Unknown, already consumed, expired,
    /// and wrong-provider tokens all yield `None` — deliberately
    /// indistinguishable.
    pub fn consume_oauth_state(
        &self,
        state: &str,
        provider: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<(i64, i64)>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let identity = conn
            .query_row(
                "DELETE FROM oauth_states \
                 WHERE state = ?1 AND provider = ?2 AND expires_at > ?3 \
                 RETURNING guild_id, user_id",
                params![state, provider, ts(now)],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(identity)
    }

    /// Delete expired, never-consumed states. Idempotent; safe to run at any
    /// time.
    pub fn sweep_expired_oauth_states(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let rows_affected = self.conn.lock().unwrap().execute(
            "DELETE FROM oauth_states WHERE expires_at <= ?1",
            params![ts(now)],
        )?;

        Ok(rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::test_store;
    use super::*;
    use chrono::Duration;

    fn insert(store: &Store, state: &str, provider: &str, now: DateTime<Utc>) {
        store
            .insert_oauth_state(state, provider, 1, 42, now, now + Duration::minutes(10))
            .unwrap();
    }

    #[test]
    fn test_consume_is_single_use() {
        let store = test_store();
        let now = Utc::now();
        insert(&store, "state-a", "clickup", now);

        assert_eq!(
            store.consume_oauth_state("state-a", "clickup", now).unwrap(),
            Some((1, 42))
        );
        // Second attempt: already consumed
        assert_eq!(
            store.consume_oauth_state("state-a", "clickup", now).unwrap(),
            None
        );
    }

    #[test]
    fn test_unknown_state_rejected() {
        let store = test_store();

        assert_eq!(
            store
                .consume_oauth_state("never-issued", "clickup", Utc::now())
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_expired_state_rejected_even_on_first_use() {
        let store = test_store();
        let now = Utc::now();
        insert(&store, "state-a", "google", now);

        let later = now + Duration::minutes(11);
        assert_eq!(
            store.consume_oauth_state("state-a", "google", later).unwrap(),
            None
        );
    }

    #[test]
    fn test_provider_mismatch_rejected() {
        let store = test_store();
        let now = Utc::now();
        insert(&store, "state-a", "clickup", now);

        assert_eq!(
            store.consume_oauth_state("state-a", "google", now).unwrap(),
            None
        );
        // The row is still there for its own provider
        assert_eq!(
            store.consume_oauth_state("state-a", "clickup", now).unwrap(),
            Some((1, 42))
        );
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let store = test_store();
        let now = Utc::now();
        insert(&store, "old", "clickup", now - Duration::minutes(20));
        insert(&store, "fresh", "clickup", now);

        assert_eq!(store.sweep_expired_oauth_states(now).unwrap(), 1);
        // Sweep is idempotent
        assert_eq!(store.sweep_expired_oauth_states(now).unwrap(), 0);

        assert_eq!(
            store.consume_oauth_state("fresh", "clickup", now).unwrap(),
            Some((1, 42))
        );
        assert_eq!(
            store.consume_oauth_state("old", "clickup", now).unwrap(),
            None
        );
    }
}
