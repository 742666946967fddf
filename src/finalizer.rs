//! End-of-response persistence of the bound session

use salvo_core::http::StatusCode;
use std::sync::Arc;
use tracing::Instrument;

use crate::session::{Session, SessionState};
use crate::store::SessionStore;

/// How the exchange ended, as seen by the finalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Downstream handlers returned and the response status is decided
    Committed(StatusCode),
    /// The request was dropped before a response was decided
    Aborted,
}

impl Outcome {
    /// Only 2xx and 3xx responses persist the session
    pub fn is_success(&self) -> bool {
        match self {
            Outcome::Committed(status) => (200..400).contains(&status.as_u16()),
            Outcome::Aborted => false,
        }
    }
}

/// What the middleware must do with the session cookie on the response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieDirective {
    /// Leave whatever cookie the response already carries
    Keep,
    /// Issue the cookie again with this id
    Reissue(String),
    /// Drop the session cookie from the response
    Remove,
}

/// Persists, rotates or deletes a session once its response is decided
pub struct SessionFinalizer<S: SessionStore> {
    store: Arc<S>,
}

impl<S: SessionStore> SessionFinalizer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Apply the final state of `session` to the store.
    ///
    /// Store failures are logged and swallowed: the response is committed
    /// by now and there is no channel left to report them on. Running this
    /// twice for the same final state leaves the store as one run would.
    pub async fn finalize(&self, session: &Session, outcome: Outcome) -> CookieDirective {
        if let SessionState::Destroyed { id, old_id } = session.state() {
            for id in std::iter::once(id).chain(old_id) {
                if let Err(e) = self.store.delete(&id).await {
                    tracing::error!(session_id = %id, error = %e, "Failed to delete session");
                }
            }
            return CookieDirective::Remove;
        }

        if !outcome.is_success() {
            tracing::debug!(?outcome, "response failed, session not stored");
            return CookieDirective::Remove;
        }

        session.set_accessed();

        match session.old_id() {
            Some(old_id) => {
                // put the new id before deleting the old one: a failure in
                // between leaves two valid copies, never zero
                let new_id = session.id();
                match self.store.put(session).await {
                    Ok(()) => {
                        if let Err(e) = self.store.delete(&old_id).await {
                            tracing::error!(session_id = %old_id, error = %e, "Failed to delete previous session");
                        }
                    }
                    Err(e) => {
                        tracing::error!(session_id = %new_id, error = %e, "Failed to store session");
                    }
                }
                CookieDirective::Reissue(new_id)
            }
            None => {
                if let Err(e) = self.store.put(session).await {
                    tracing::error!(session_id = %session.id(), error = %e, "Failed to store session");
                }
                CookieDirective::Keep
            }
        }
    }
}

impl<S: SessionStore> Clone for SessionFinalizer<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

/// The single finalizer registered for one request
///
/// Fires exactly once: through [`FinalizeGuard::fire`] on the normal path,
/// or from `Drop` if the request future is cancelled or unwinds first.
pub(crate) struct FinalizeGuard<S: SessionStore> {
    armed: Option<(SessionFinalizer<S>, Session)>,
}

impl<S: SessionStore> FinalizeGuard<S> {
    pub fn arm(finalizer: SessionFinalizer<S>, session: Session) -> Self {
        Self {
            armed: Some((finalizer, session)),
        }
    }

    /// Run the finalizer for a decided response.
    ///
    /// The store work runs on its own task, so it completes even if the
    /// caller is dropped while waiting for it.
    pub async fn fire(mut self, outcome: Outcome) -> CookieDirective {
        let Some((finalizer, session)) = self.armed.take() else {
            return CookieDirective::Keep;
        };
        let task = tokio::spawn(
            async move { finalizer.finalize(&session, outcome).await }.in_current_span(),
        );
        match task.await {
            Ok(directive) => directive,
            Err(e) => {
                tracing::error!(error = %e, "session finalizer task failed");
                CookieDirective::Remove
            }
        }
    }
}

impl<S: SessionStore> Drop for FinalizeGuard<S> {
    fn drop(&mut self) {
        let Some((finalizer, session)) = self.armed.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!(session_id = %session.id(), "request aborted, finalizing session");
                handle.spawn(
                    async move {
                        finalizer.finalize(&session, Outcome::Aborted).await;
                    }
                    .in_current_span(),
                );
            }
            Err(_) => {
                tracing::warn!(session_id = %session.id(), "no runtime to finalize aborted session on");
            }
        }
    }
}
