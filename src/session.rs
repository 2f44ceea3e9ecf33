use chrono::{Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::models::{UserId, UserSession};

/// In-memory conversation state, one `UserSession` per user.
///
/// Constructed once at startup and shared behind an `Arc`. The lock is held
/// only for the duration of a single closure, never across an `.await`, so a
/// pending generation for one user does not block other users.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<UserId, UserSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the user's session, creating it at `AwaitingName` if absent
    pub async fn get_or_create(&self, user_id: UserId) -> UserSession {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(user_id)
            .or_insert_with(|| UserSession::new(user_id))
            .clone()
    }

    /// Run `f` against the user's session (created if absent) and bump its activity time
    pub async fn update<F, R>(&self, user_id: UserId, f: F) -> R
    where
        F: FnOnce(&mut UserSession) -> R,
    {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .entry(user_id)
            .or_insert_with(|| UserSession::new(user_id));
        let out = f(session);
        session.touch();
        out
    }

    /// Force the user back to `AwaitingName`, dropping collected fields
    pub async fn reset(&self, user_id: UserId) {
        self.update(user_id, UserSession::reset).await;
    }

    /// Replace a session wholesale
    pub async fn insert(&self, session: UserSession) {
        self.sessions.lock().await.insert(session.user_id, session);
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Drop sessions idle for longer than `max_idle`, returning how many were removed
    pub async fn prune_idle(&self, max_idle: Duration) -> usize {
        let cutoff = Utc::now() - max_idle;
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.updated_at >= cutoff);
        before - sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Stage;

    #[tokio::test]
    async fn test_get_or_create_starts_awaiting_name() {
        let store = SessionStore::new();
        let session = store.get_or_create(UserId(1)).await;
        assert_eq!(session.stage, Stage::AwaitingName);
        assert!(session.product_name.is_none());
        assert_eq!(store.len().await, 1);

        // Second call returns the same session instead of a fresh one
        store
            .update(UserId(1), |s| s.stage = Stage::AwaitingInfo)
            .await;
        assert_eq!(store.get_or_create(UserId(1)).await.stage, Stage::AwaitingInfo);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let store = SessionStore::new();
        store
            .update(UserId(5), |s| {
                s.stage = Stage::AwaitingInfo;
                s.product_name = Some("Лампа".to_string());
            })
            .await;

        store.reset(UserId(5)).await;
        let once = store.get_or_create(UserId(5)).await;
        store.reset(UserId(5)).await;
        let twice = store.get_or_create(UserId(5)).await;

        assert_eq!(once.stage, Stage::AwaitingName);
        assert_eq!(once.stage, twice.stage);
        assert_eq!(once.product_name, twice.product_name);
        assert_eq!(once.product_info, twice.product_info);
        assert!(twice.product_name.is_none());
    }

    #[tokio::test]
    async fn test_reset_unknown_user_creates_session() {
        let store = SessionStore::new();
        store.reset(UserId(9)).await;
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get_or_create(UserId(9)).await.stage, Stage::AwaitingName);
    }

    #[tokio::test]
    async fn test_prune_idle_removes_only_stale_sessions() {
        let store = SessionStore::new();
        let mut stale = UserSession::new(UserId(1));
        stale.updated_at = Utc::now() - Duration::hours(3);
        store.insert(stale).await;
        store.get_or_create(UserId(2)).await;

        let removed = store.prune_idle(Duration::hours(1)).await;
        assert_eq!(removed, 1);
        assert_eq!(store.len().await, 1);
        assert!(!store.is_empty().await);
    }
}
