//! Session middleware handler for Salvo

use async_trait::async_trait;
use salvo_core::http::{header, StatusCode, StatusError};
use salvo_core::{Depot, FlowCtrl, Handler, Request, Response};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::depot_ext::{SessionDepotExt, SESSION_KEY};
use crate::finalizer::{CookieDirective, FinalizeGuard, Outcome, SessionFinalizer};
use crate::resolver::SessionResolver;
use crate::session::Session;
use crate::store::SessionStore;

/// Session middleware for Salvo
///
/// Mount it as a hoop. For every request it binds a session into the
/// [`Depot`]: the one named by the session cookie if the store knows it,
/// otherwise a fresh anonymous one. A client-submitted id the store cannot
/// find is never reused. Once downstream handlers have produced a response,
/// the session is stored, rotated or deleted depending on its final state
/// and the response status.
pub struct SessionHandler<S: SessionStore> {
    store: Arc<S>,
    config: SessionConfig,
    resolver: SessionResolver<S>,
    finalizer: SessionFinalizer<S>,
}

impl<S: SessionStore> SessionHandler<S> {
    /// Create a new session handler
    pub fn new(store: S, config: SessionConfig) -> Self {
        let store = Arc::new(store);
        Self {
            resolver: SessionResolver::new(Arc::clone(&store), config.retry_backoff),
            finalizer: SessionFinalizer::new(Arc::clone(&store)),
            store,
            config,
        }
    }

    /// Get a usable session ID from the cookie, if one was presented
    ///
    /// The length policy applies to the value exactly as the client sent it.
    /// The id looked up is that value percent-decoded once.
    fn session_id_from_cookie(&self, req: &Request) -> Option<String> {
        let raw = raw_cookie_value(req, &self.config.cookie_name)?;

        if !self.config.accepts_id(raw) {
            tracing::debug!(len = raw.len(), "session cookie too short, ignoring it");
            return None;
        }

        match urlencoding::decode(raw) {
            Ok(decoded) => Some(decoded.into_owned()),
            Err(_) => Some(raw.to_string()),
        }
    }

    fn nag_https(&self, req: &Request) {
        if self.config.nag_https
            && tracing::enabled!(tracing::Level::DEBUG)
            && req.scheme().as_str() != "https"
        {
            tracing::debug!(
                uri = %req.uri(),
                "Using session cookies without https could make you susceptible to session hijacking"
            );
        }
    }

    /// Create an anonymous session and hand its cookie to the client
    fn create_session(&self, res: &mut Response) -> Session {
        let session = self
            .store
            .create(self.config.session_timeout, self.config.min_length);
        res.add_cookie(self.config.session_cookie(&session.id()));
        tracing::debug!(session_id = %session.id(), "new session created");
        session
    }

    /// Turn the finalizer's verdict into the response's `Set-Cookie`
    fn apply(&self, directive: CookieDirective, req: &Request, res: &mut Response) {
        match directive {
            CookieDirective::Keep => {}
            CookieDirective::Reissue(id) => {
                res.add_cookie(self.config.session_cookie(&id));
            }
            CookieDirective::Remove => {
                // no Set-Cookie at all: a cookie issued during this request
                // is dropped, the one the client holds is left alone
                let name = self.config.cookie_name.as_str();
                let presented = req.cookie(name).cloned();
                let jar = res.cookies_mut();
                jar.force_remove(name);
                if let Some(cookie) = presented {
                    jar.add_original(cookie);
                }
            }
        }
    }

    async fn run(&self, req: &mut Request, depot: &mut Depot, res: &mut Response, ctrl: &mut FlowCtrl) {
        self.nag_https(req);

        let session = match self.session_id_from_cookie(req) {
            Some(sid) => match self.resolver.resolve(&sid).await {
                Ok(Some(session)) => {
                    session.set_accessed();
                    session
                }
                Ok(None) => {
                    // Either timed out or destroyed on an earlier request.
                    // Recreating it under the submitted id would allow
                    // session fixation.
                    self.create_session(res)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to load session");
                    res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
                    res.render(StatusError::internal_server_error().brief("Failed to load session."));
                    ctrl.skip_rest();
                    return;
                }
            },
            None => self.create_session(res),
        };

        depot.insert(SESSION_KEY, session.clone());
        let guard = FinalizeGuard::arm(self.finalizer.clone(), session);

        ctrl.call_next(req, depot, res).await;

        let directive = guard.fire(Outcome::Committed(response_status(res))).await;
        self.apply(directive, req, res);
    }
}

/// Value of cookie `name` exactly as it appears in the `Cookie` header
fn raw_cookie_value<'a>(req: &'a Request, name: &str) -> Option<&'a str> {
    req.headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(n, _)| *n == name)
        .map(|(_, v)| v.trim())
}

/// Status the response will be sent with, resolved the way Salvo does when
/// downstream handlers left it unset
fn response_status(res: &Response) -> StatusCode {
    match res.status_code {
        Some(status) => status,
        None if res.body.is_none() => StatusCode::NOT_FOUND,
        None => StatusCode::OK,
    }
}

impl<S: SessionStore> Clone for SessionHandler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            resolver: self.resolver.clone(),
            finalizer: self.finalizer.clone(),
        }
    }
}

#[async_trait]
impl<S: SessionStore> Handler for SessionHandler<S> {
    async fn handle(&self, req: &mut Request, depot: &mut Depot, res: &mut Response, ctrl: &mut FlowCtrl) {
        if depot.session().is_some() {
            tracing::debug!("session already bound by an outer handler");
            return;
        }

        let span = tracing::debug_span!("session", request_id = %Uuid::new_v4());
        self.run(req, depot, res, ctrl).instrument(span).await;
    }
}
