//! Session store trait

use async_trait::async_trait;
use std::time::Duration;

use crate::error::SessionError;
use crate::session::Session;

/// Trait for session storage backends
///
/// Stores are expected to give per-key atomic `get`/`put`/`delete`; there
/// are no cross-key transactions and concurrent writers of one id are
/// last-write-wins.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Get a session by ID
    ///
    /// Returns None if the session doesn't exist, has expired, or is not
    /// visible on this node yet.
    async fn get(&self, id: &str) -> Result<Option<Session>, SessionError>;

    /// Insert or replace the session under its current id
    async fn put(&self, session: &Session) -> Result<(), SessionError>;

    /// Delete the session stored under `id`. Deleting a missing id is not an error.
    async fn delete(&self, id: &str) -> Result<(), SessionError>;

    /// Create a new, not yet persisted session
    fn create(&self, timeout: Duration, min_length: usize) -> Session {
        Session::new(timeout, min_length)
    }

    /// How long callers should keep retrying a miss.
    ///
    /// Zero means there is no propagation window and a miss can be trusted
    /// immediately.
    fn retry_timeout(&self) -> Duration {
        Duration::ZERO
    }

    /// Clear all sessions (optional)
    async fn clear(&self) -> Result<(), SessionError> {
        Err(SessionError::store("clear not implemented"))
    }

    /// Get the count of all sessions (optional)
    async fn size(&self) -> Result<usize, SessionError> {
        Err(SessionError::store("size not implemented"))
    }
}
