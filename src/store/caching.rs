//! Read-your-writes layer in front of a shared store
//!
//! A clustered store can take a while to make a fresh write visible on the
//! node that made it. This wrapper remembers what this node wrote for as
//! long as the shared store's `retry_timeout` says the write may still be
//! propagating, and serves that copy only when the shared store misses
//! inside that window. The shared store stays authoritative: a hit there
//! always wins, and a hint never outlives its window.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::SessionStore;
use crate::error::SessionError;
use crate::session::{Session, SessionRecord};

/// A write this node made, usable until `deadline`
struct Hint {
    record: SessionRecord,
    deadline: Instant,
}

/// Wrapper over another [`SessionStore`] that hides the propagation window
/// for this node's own writes
pub struct CachingStore<S: SessionStore> {
    hints: Arc<RwLock<HashMap<String, Hint>>>,
    delegate: Arc<S>,
}

impl<S: SessionStore> CachingStore<S> {
    pub fn new(delegate: S) -> Self {
        Self {
            hints: Arc::new(RwLock::new(HashMap::new())),
            delegate: Arc::new(delegate),
        }
    }

    /// The wrapped store
    pub fn delegate(&self) -> &S {
        &self.delegate
    }

    /// Number of writes still inside their propagation window
    pub fn cached(&self) -> usize {
        let now = Instant::now();
        self.hints.read().values().filter(|h| h.deadline > now).count()
    }

    /// Drop every hint whose window has passed
    fn evict_expired(&self, now: Instant) {
        self.hints.write().retain(|_, hint| hint.deadline > now);
    }

    /// The local copy of `id`, if its window is still open
    fn hint(&self, id: &str) -> Option<SessionRecord> {
        let now = Instant::now();
        let mut hints = self.hints.write();
        let live = hints
            .get(id)
            .map(|hint| hint.deadline > now && !hint.record.is_expired())?;
        if live {
            hints.get(id).map(|hint| hint.record.clone())
        } else {
            hints.remove(id);
            None
        }
    }
}

impl<S: SessionStore> Clone for CachingStore<S> {
    fn clone(&self) -> Self {
        Self {
            hints: Arc::clone(&self.hints),
            delegate: Arc::clone(&self.delegate),
        }
    }
}

#[async_trait]
impl<S: SessionStore> SessionStore for CachingStore<S> {
    async fn get(&self, id: &str) -> Result<Option<Session>, SessionError> {
        if let Some(session) = self.delegate.get(id).await? {
            // the write is visible, the shared copy is the one to trust
            self.hints.write().remove(id);
            return Ok(Some(session));
        }

        match self.hint(id) {
            Some(record) => {
                tracing::trace!(session_id = %id, "shared store missed, serving own recent write");
                Ok(Some(Session::from_record(record)))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, session: &Session) -> Result<(), SessionError> {
        self.delegate.put(session).await?;

        let window = self.delegate.retry_timeout();
        let now = Instant::now();
        self.evict_expired(now);
        if !window.is_zero() {
            let record = session.to_record();
            self.hints.write().insert(
                record.id.clone(),
                Hint {
                    record,
                    deadline: now + window,
                },
            );
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), SessionError> {
        self.hints.write().remove(id);
        self.delegate.delete(id).await
    }

    fn create(&self, timeout: Duration, min_length: usize) -> Session {
        self.delegate.create(timeout, min_length)
    }

    fn retry_timeout(&self) -> Duration {
        self.delegate.retry_timeout()
    }

    async fn clear(&self) -> Result<(), SessionError> {
        self.hints.write().clear();
        self.delegate.clear().await
    }

    async fn size(&self) -> Result<usize, SessionError> {
        self.delegate.size().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const TIMEOUT: Duration = Duration::from_secs(60);
    const WINDOW: Duration = Duration::from_millis(100);

    fn session(id: &str) -> Session {
        Session::from_record(SessionRecord::new(id, TIMEOUT))
    }

    #[tokio::test(start_paused = true)]
    async fn test_own_write_served_while_shared_store_lags() {
        let shared = MemoryStore::new().with_retry_timeout(WINDOW);
        let store = CachingStore::new(shared.clone());
        let s = session("fresh-session");
        s.set("user", "alice");
        store.put(&s).await.unwrap();

        // the write has not reached the replica this node reads from
        shared.delete("fresh-session").await.unwrap();

        let found = store.get("fresh-session").await.unwrap().expect("own write");
        assert_eq!(found.get::<String>("user"), Some("alice".to_string()));

        tokio::time::advance(WINDOW + Duration::from_millis(1)).await;
        assert!(store.get("fresh-session").await.unwrap().is_none());
        assert_eq!(store.cached(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_on_another_node_is_not_undone() {
        let shared = MemoryStore::new().with_retry_timeout(WINDOW);
        let node_a = CachingStore::new(shared.clone());
        let node_b = CachingStore::new(shared.clone());

        node_a.put(&session("shared-session")).await.unwrap();
        assert!(node_a.get("shared-session").await.unwrap().is_some());

        node_b.delete("shared-session").await.unwrap();
        assert!(node_a.get("shared-session").await.unwrap().is_none());

        // a write older than the window is no excuse either
        node_a.put(&session("rotated-session")).await.unwrap();
        tokio::time::advance(WINDOW * 2).await;
        let rotated = node_b.get("rotated-session").await.unwrap().expect("visible");
        let new_id = rotated.regenerate_id().unwrap();
        node_b.put(&rotated).await.unwrap();
        node_b.delete("rotated-session").await.unwrap();

        assert!(node_a.get("rotated-session").await.unwrap().is_none());
        assert!(node_a.get(&new_id).await.unwrap().is_some());
        assert_eq!(shared.ids(), vec![new_id]);
    }

    #[tokio::test]
    async fn test_shared_copy_wins_over_local_write() {
        let shared = MemoryStore::new().with_retry_timeout(WINDOW);
        let node_a = CachingStore::new(shared.clone());
        let node_b = CachingStore::new(shared.clone());

        let s = session("busy-session");
        s.set("views", 1);
        node_a.put(&s).await.unwrap();

        let newer = session("busy-session");
        newer.set("views", 7);
        node_b.put(&newer).await.unwrap();

        let found = node_a.get("busy-session").await.unwrap().unwrap();
        assert_eq!(found.get::<i32>("views"), Some(7));
        assert_eq!(node_a.cached(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_writes_are_evicted() {
        let store = CachingStore::new(MemoryStore::new().with_retry_timeout(WINDOW));
        for n in 0..10 {
            store.put(&session(&format!("burst-session-{}", n))).await.unwrap();
        }
        assert_eq!(store.cached(), 10);

        tokio::time::advance(WINDOW).await;
        store.put(&session("late-session")).await.unwrap();
        assert_eq!(store.cached(), 1);
        assert_eq!(store.hints.read().len(), 1);
    }

    #[tokio::test]
    async fn test_no_window_keeps_nothing_locally() {
        let store = CachingStore::new(MemoryStore::new());
        store.put(&session("plain-session")).await.unwrap();
        assert_eq!(store.cached(), 0);
        assert!(store.get("plain-session").await.unwrap().is_some());
        assert!(store.get("unknown-session").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_both_copies() {
        let store = CachingStore::new(MemoryStore::new().with_retry_timeout(WINDOW));
        store.put(&session("doomed-session")).await.unwrap();
        assert_eq!(store.cached(), 1);

        store.delete("doomed-session").await.unwrap();
        assert_eq!(store.cached(), 0);
        assert!(store.get("doomed-session").await.unwrap().is_none());
        assert!(store.delegate().record("doomed-session").is_none());
    }

    #[test]
    fn test_retry_timeout_delegates() {
        let store = CachingStore::new(MemoryStore::new().with_retry_timeout(Duration::from_millis(20)));
        assert_eq!(store.retry_timeout(), Duration::from_millis(20));
    }
}
