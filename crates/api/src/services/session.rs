//! Sliding-window idle timeout for authenticated sessions.
//!
//! Each identity has at most one activity record, `user:{id}:lastActivity`,
//! holding the epoch-millis timestamp of its last authenticated request. The
//! record's TTL equals the idle timeout and is reset on every touch, so an idle
//! session simply disappears from Redis.
//!
//! A missing record on touch starts a new session rather than failing: the
//! credential's own expiry already bounds how long a session can live.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::stores::CredentialStore;

/// Idle timeout window (5 minutes).
pub const IDLE_TIMEOUT_SECS: u64 = 5 * 60;

/// Result of recording activity for an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Touch {
    /// No record existed; a new session window was opened.
    Started,
    /// The existing window was extended.
    Refreshed,
    /// The gap since the last activity exceeded the idle timeout. The record
    /// has been removed; the next touch starts a fresh session.
    Expired,
}

impl Touch {
    pub fn is_expired(&self) -> bool {
        matches!(self, Touch::Expired)
    }
}

#[derive(Clone)]
pub struct SessionTracker {
    store: Arc<dyn CredentialStore>,
    idle_timeout_secs: u64,
}

impl SessionTracker {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            idle_timeout_secs: IDLE_TIMEOUT_SECS,
        }
    }

    fn activity_key(user_id: i64) -> String {
        format!("user:{}:lastActivity", user_id)
    }

    async fn write(&self, user_id: i64, now: DateTime<Utc>) -> Result<()> {
        self.store
            .set_ex(
                &Self::activity_key(user_id),
                &now.timestamp_millis().to_string(),
                self.idle_timeout_secs,
            )
            .await
    }

    /// Open (or reopen) a session window, used at login.
    pub async fn start(&self, user_id: i64) -> Result<()> {
        self.write(user_id, Utc::now()).await
    }

    pub async fn touch(&self, user_id: i64) -> Result<Touch> {
        self.touch_at(user_id, Utc::now()).await
    }

    pub async fn touch_at(&self, user_id: i64, now: DateTime<Utc>) -> Result<Touch> {
        let key = Self::activity_key(user_id);

        // Unparseable values are overwritten like a missing record.
        let last_seen = self
            .store
            .get(&key)
            .await?
            .and_then(|v| v.parse::<i64>().ok());

        let Some(last_seen) = last_seen else {
            self.write(user_id, now).await?;
            return Ok(Touch::Started);
        };

        let elapsed_ms = now.timestamp_millis() - last_seen;
        if elapsed_ms > (self.idle_timeout_secs * 1000) as i64 {
            self.store.del(&key).await?;
            tracing::info!(user_id, elapsed_ms, "session expired due to inactivity");
            return Ok(Touch::Expired);
        }

        self.write(user_id, now).await?;
        Ok(Touch::Refreshed)
    }

    /// Drop the activity record (logout). No-op if absent.
    pub async fn clear(&self, user_id: i64) -> Result<()> {
        self.store.del(&Self::activity_key(user_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MockCredentialStore;
    use crate::test_utils::MemoryCredentialStore;
    use chrono::Duration;

    fn tracker() -> (SessionTracker, Arc<MemoryCredentialStore>) {
        let store = Arc::new(MemoryCredentialStore::new());
        (SessionTracker::new(store.clone()), store)
    }

    #[tokio::test]
    async fn first_touch_starts_session() {
        let (sessions, store) = tracker();
        let now = Utc::now();

        assert_eq!(sessions.touch_at(1, now).await.unwrap(), Touch::Started);

        assert_eq!(
            store.value_of("user:1:lastActivity"),
            Some(now.timestamp_millis().to_string())
        );
        assert_eq!(store.ttl_of("user:1:lastActivity"), Some(IDLE_TIMEOUT_SECS));
    }

    #[tokio::test]
    async fn touches_within_window_never_expire() {
        let (sessions, _) = tracker();
        let mut now = Utc::now();

        sessions.touch_at(1, now).await.unwrap();
        for _ in 0..20 {
            now += Duration::seconds(299);
            assert_eq!(sessions.touch_at(1, now).await.unwrap(), Touch::Refreshed);
        }
    }

    #[tokio::test]
    async fn touch_exactly_at_timeout_is_still_active() {
        let (sessions, _) = tracker();
        let now = Utc::now();

        sessions.touch_at(1, now).await.unwrap();

        assert_eq!(
            sessions
                .touch_at(1, now + Duration::seconds(IDLE_TIMEOUT_SECS as i64))
                .await
                .unwrap(),
            Touch::Refreshed
        );
    }

    #[tokio::test]
    async fn gap_past_timeout_expires_then_restarts() {
        let (sessions, store) = tracker();
        let now = Utc::now();

        sessions.touch_at(1, now).await.unwrap();

        let later = now + Duration::seconds(301);
        assert_eq!(sessions.touch_at(1, later).await.unwrap(), Touch::Expired);
        assert_eq!(store.value_of("user:1:lastActivity"), None);

        assert_eq!(sessions.touch_at(1, later).await.unwrap(), Touch::Started);
    }

    #[tokio::test]
    async fn sessions_are_tracked_per_identity() {
        let (sessions, _) = tracker();
        let now = Utc::now();

        sessions.touch_at(1, now).await.unwrap();
        sessions
            .touch_at(2, now + Duration::seconds(200))
            .await
            .unwrap();

        let later = now + Duration::seconds(400);
        assert_eq!(sessions.touch_at(1, later).await.unwrap(), Touch::Expired);
        assert_eq!(sessions.touch_at(2, later).await.unwrap(), Touch::Refreshed);
    }

    #[tokio::test]
    async fn clear_removes_record_and_is_idempotent() {
        let (sessions, store) = tracker();

        sessions.start(5).await.unwrap();
        sessions.clear(5).await.unwrap();
        sessions.clear(5).await.unwrap();

        assert_eq!(store.value_of("user:5:lastActivity"), None);
    }

    #[tokio::test]
    async fn garbage_timestamp_is_treated_as_missing() {
        let mut store = MockCredentialStore::new();
        store
            .expect_get()
            .returning(|_| Ok(Some("not-a-number".to_string())));
        store
            .expect_set_ex()
            .withf(|key, _, ttl| key == "user:8:lastActivity" && *ttl == IDLE_TIMEOUT_SECS)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let sessions = SessionTracker::new(Arc::new(store));

        assert_eq!(sessions.touch(8).await.unwrap(), Touch::Started);
    }

    #[tokio::test]
    async fn store_failure_is_returned_not_swallowed() {
        let mut store = MockCredentialStore::new();
        store
            .expect_get()
            .returning(|_| Err(anyhow::anyhow!("redis down")));

        let sessions = SessionTracker::new(Arc::new(store));

        assert!(sessions.touch(8).await.is_err());
    }
}
