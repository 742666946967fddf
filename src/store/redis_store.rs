//! Redis session store
//!
//! Storage format:
//! - Key: `prefix + session_id` (default prefix: "sess:")
//! - Value: JSON serialized [`SessionRecord`]
//! - TTL: the session's idle timeout, refreshed on every put

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;

use super::SessionStore;
use crate::error::SessionError;
use crate::session::{Session, SessionRecord};

/// Redis-backed session store
///
/// When reads are served by replicas, writes can take a moment to become
/// visible; declare that window with [`RedisStore::with_retry_timeout`].
///
/// # Example
///
/// ```rust,ignore
/// use salvo_cluster_session::RedisStore;
///
/// let store = RedisStore::from_url("redis://127.0.0.1/")
///     .await?
///     .with_retry_timeout(Duration::from_millis(100));
/// ```
pub struct RedisStore {
    conn: Arc<ConnectionManager>,
    prefix: String,
    retry_timeout: Duration,
}

impl RedisStore {
    /// Create a new Redis store with default settings
    ///
    /// - Prefix: "sess:"
    /// - Retry timeout: zero (reads are trusted immediately)
    pub async fn new(client: redis::Client) -> Result<Self, SessionError> {
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::from_connection_manager(conn))
    }

    /// Create a new Redis store from a connection string
    pub async fn from_url(url: &str) -> Result<Self, SessionError> {
        let client = redis::Client::open(url)
            .map_err(|e| SessionError::store(format!("Failed to create Redis client: {}", e)))?;
        Self::new(client).await
    }

    /// Create a new Redis store from an existing connection manager
    pub fn from_connection_manager(conn: ConnectionManager) -> Self {
        Self {
            conn: Arc::new(conn),
            prefix: "sess:".to_string(),
            retry_timeout: Duration::ZERO,
        }
    }

    /// Build with custom key prefix
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    /// Build with a replication window callers should retry misses for
    pub fn with_retry_timeout(mut self, retry_timeout: Duration) -> Self {
        self.retry_timeout = retry_timeout;
        self
    }

    /// Make a storage key from session ID
    fn make_key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }

    /// Redis TTL in whole seconds, rounded up, never zero
    fn ttl_secs(timeout: Duration) -> u64 {
        let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
        secs.max(1)
    }

    async fn keys(&self) -> Result<Vec<String>, SessionError> {
        let mut conn = (*self.conn).clone();
        let pattern = format!("{}*", self.prefix);
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(&pattern)
            .query_async(&mut conn)
            .await?;
        Ok(keys)
    }
}

impl Clone for RedisStore {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            prefix: self.prefix.clone(),
            retry_timeout: self.retry_timeout,
        }
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn get(&self, id: &str) -> Result<Option<Session>, SessionError> {
        let key = self.make_key(id);
        let mut conn = (*self.conn).clone();

        let data: Option<String> = conn.get(&key).await?;

        match data {
            Some(json) => {
                let record: SessionRecord = serde_json::from_str(&json)?;
                // Redis TTL is second-granular, the record knows better
                if record.is_expired() {
                    return Ok(None);
                }
                Ok(Some(Session::from_record(record)))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, session: &Session) -> Result<(), SessionError> {
        let record = session.to_record();
        let key = self.make_key(&record.id);
        let mut conn = (*self.conn).clone();

        let json = serde_json::to_string(&record)?;
        let ttl = Self::ttl_secs(record.timeout());
        conn.set_ex::<_, _, ()>(&key, &json, ttl).await?;

        tracing::trace!(session_id = %record.id, ttl, "session written to redis");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), SessionError> {
        let key = self.make_key(id);
        let mut conn = (*self.conn).clone();

        conn.del::<_, ()>(&key).await?;
        Ok(())
    }

    fn retry_timeout(&self) -> Duration {
        self.retry_timeout
    }

    async fn clear(&self) -> Result<(), SessionError> {
        let keys = self.keys().await?;
        if !keys.is_empty() {
            let mut conn = (*self.conn).clone();
            conn.del::<_, ()>(keys).await?;
        }
        Ok(())
    }

    async fn size(&self) -> Result<usize, SessionError> {
        Ok(self.keys().await?.len())
    }
}

#[cfg(test)]
mod tests {
    // Tests require a running Redis instance
    // Run with: cargo test --features redis-store -- --ignored

    use super::*;

    #[test]
    fn test_ttl_rounds_up() {
        assert_eq!(RedisStore::ttl_secs(Duration::ZERO), 1);
        assert_eq!(RedisStore::ttl_secs(Duration::from_millis(1500)), 2);
        assert_eq!(RedisStore::ttl_secs(Duration::from_secs(1800)), 1800);
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_store_basic() {
        let store = RedisStore::from_url("redis://127.0.0.1/")
            .await
            .unwrap()
            .with_prefix("test-sess:");

        store.clear().await.unwrap();

        let session = store.create(Duration::from_secs(3600), 16);
        session.set("user", "alice");
        let id = session.id();

        store.put(&session).await.unwrap();

        let retrieved = store.get(&id).await.unwrap().expect("session stored");
        assert_eq!(retrieved.get::<String>("user"), Some("alice".to_string()));
        assert_eq!(store.size().await.unwrap(), 1);

        store.delete(&id).await.unwrap();
        assert!(store.get(&id).await.unwrap().is_none());
    }
}
