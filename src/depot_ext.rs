//! Extension trait for Depot to easily access sessions

use salvo_core::Depot;

use crate::session::Session;

/// Depot key the middleware binds the session under
pub(crate) const SESSION_KEY: &str = "salvo.cluster.session";

/// Extension trait for Salvo's Depot to provide easy session access
///
/// Only [`SessionHandler`](crate::SessionHandler) binds sessions; handlers
/// downstream get a shared handle they can mutate, destroy or regenerate.
pub trait SessionDepotExt {
    /// Get the session bound to this request
    fn session(&self) -> Option<Session>;
}

impl SessionDepotExt for Depot {
    fn session(&self) -> Option<Session> {
        self.get::<Session>(SESSION_KEY).ok().cloned()
    }
}
