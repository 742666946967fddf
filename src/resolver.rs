//! Session lookup that tolerates eventually consistent stores
//!
//! A clustered store may not yet have propagated a session written on
//! another node, so a miss is ambiguous: the session never existed (or was
//! destroyed), or it is simply not visible here yet. While the store's
//! `retry_timeout` window is open, misses are retried after a short pause.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::SessionError;
use crate::session::Session;
use crate::store::SessionStore;

/// Resolves session ids against a store, retrying misses
pub struct SessionResolver<S: SessionStore> {
    store: Arc<S>,
    backoff: Duration,
}

impl<S: SessionStore> SessionResolver<S> {
    pub fn new(store: Arc<S>, backoff: Duration) -> Self {
        Self { store, backoff }
    }

    /// Look up `id`.
    ///
    /// Store errors are returned at once. `Ok(None)` means the store still
    /// had nothing once the retry budget, measured from the first attempt,
    /// ran out.
    pub async fn resolve(&self, id: &str) -> Result<Option<Session>, SessionError> {
        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            if let Some(session) = self.store.get(id).await? {
                if attempts > 1 {
                    tracing::debug!(attempts, "session became visible after retrying");
                }
                return Ok(Some(session));
            }

            let budget = self.store.retry_timeout();
            if budget.is_zero() || started.elapsed() >= budget {
                tracing::debug!(attempts, "session not found");
                return Ok(None);
            }

            tokio::time::sleep(self.backoff).await;
        }
    }
}

impl<S: SessionStore> Clone for SessionResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            backoff: self.backoff,
        }
    }
}
