//! In-memory session store
//!
//! This is primarily for development and testing.
//! For production, use RedisStore or another shared store.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::SessionStore;
use crate::error::SessionError;
use crate::session::{Session, SessionRecord};

/// In-memory session store
///
/// Warning: This store is not suitable for production use because:
/// - Sessions are lost on server restart
/// - Sessions are not shared across multiple server instances
/// - Memory usage grows with number of sessions
pub struct MemoryStore {
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
    prefix: String,
    retry_timeout: Duration,
}

impl MemoryStore {
    /// Create a new memory store
    pub fn new() -> Self {
        Self::with_prefix("sess:")
    }

    /// Create a new memory store with a custom prefix
    pub fn with_prefix<S: Into<String>>(prefix: S) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            prefix: prefix.into(),
            retry_timeout: Duration::ZERO,
        }
    }

    /// Declare a propagation window, so the middleware behaves as it would
    /// against a clustered store
    pub fn with_retry_timeout(mut self, retry_timeout: Duration) -> Self {
        self.retry_timeout = retry_timeout;
        self
    }

    /// Make a storage key from session ID
    fn make_key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }

    /// Clean up expired sessions
    pub fn cleanup_expired(&self) {
        self.sessions.write().retain(|_, record| !record.is_expired());
    }

    /// Stored record for `id`, expired or not
    pub fn record(&self, id: &str) -> Option<SessionRecord> {
        self.sessions.read().get(&self.make_key(id)).cloned()
    }

    /// Ids of all stored sessions, sorted
    pub fn ids(&self) -> Vec<String> {
        let prefix_len = self.prefix.len();
        let mut ids: Vec<String> = self
            .sessions
            .read()
            .keys()
            .map(|k| k[prefix_len..].to_string())
            .collect();
        ids.sort();
        ids
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            prefix: self.prefix.clone(),
            retry_timeout: self.retry_timeout,
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Session>, SessionError> {
        let key = self.make_key(id);
        let sessions = self.sessions.read();

        match sessions.get(&key) {
            Some(record) if !record.is_expired() => Ok(Some(Session::from_record(record.clone()))),
            _ => Ok(None),
        }
    }

    async fn put(&self, session: &Session) -> Result<(), SessionError> {
        let record = session.to_record();
        let key = self.make_key(&record.id);
        self.sessions.write().insert(key, record);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), SessionError> {
        let key = self.make_key(id);
        self.sessions.write().remove(&key);
        Ok(())
    }

    fn retry_timeout(&self) -> Duration {
        self.retry_timeout
    }

    async fn clear(&self) -> Result<(), SessionError> {
        self.sessions.write().clear();
        Ok(())
    }

    async fn size(&self) -> Result<usize, SessionError> {
        self.cleanup_expired();
        Ok(self.sessions.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();

        let session = store.create(Duration::from_secs(3600), 16);
        session.set("user", "alice");
        let id = session.id();

        store.put(&session).await.unwrap();

        let retrieved = store.get(&id).await.unwrap().expect("session stored");
        assert_eq!(retrieved.id(), id);
        assert_eq!(retrieved.get::<String>("user"), Some("alice".to_string()));

        store.delete(&id).await.unwrap();
        assert!(store.get(&id).await.unwrap().is_none());

        // deleting twice is fine
        tokio_test::assert_ok!(store.delete(&id).await);
    }

    #[tokio::test]
    async fn test_memory_store_expiry() {
        let store = MemoryStore::new();

        let mut record = SessionRecord::new("stale-session", Duration::from_secs(1));
        record.last_accessed = Utc::now() - chrono::Duration::seconds(5);
        store.put(&Session::from_record(record)).await.unwrap();

        assert!(store.get("stale-session").await.unwrap().is_none());
        assert!(store.record("stale-session").is_some());

        assert_eq!(store.size().await.unwrap(), 0);
        assert!(store.record("stale-session").is_none());
    }

    #[tokio::test]
    async fn test_memory_store_prefix_and_ids() {
        let store = MemoryStore::with_prefix("app:");
        store
            .put(&Session::from_record(SessionRecord::new("b-session", Duration::from_secs(60))))
            .await
            .unwrap();
        store
            .put(&Session::from_record(SessionRecord::new("a-session", Duration::from_secs(60))))
            .await
            .unwrap();

        assert_eq!(store.ids(), vec!["a-session".to_string(), "b-session".to_string()]);

        store.clear().await.unwrap();
        assert!(store.ids().is_empty());
    }

    #[test]
    fn test_retry_timeout_defaults_to_zero() {
        assert_eq!(MemoryStore::new().retry_timeout(), Duration::ZERO);
        let store = MemoryStore::new().with_retry_timeout(Duration::from_millis(50));
        assert_eq!(store.retry_timeout(), Duration::from_millis(50));
    }
}
