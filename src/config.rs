//! Session configuration

use salvo_core::http::cookie::Cookie;
use std::time::Duration;

/// Default cookie name
pub const DEFAULT_COOKIE_NAME: &str = "web.session";

/// Default session timeout: 30 minutes
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Default minimum length a cookie value must exceed to be looked up
pub const DEFAULT_MIN_LENGTH: usize = 32;

/// Default pause between two lookups of a session the store has not seen yet
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(5);

/// Path every session cookie is issued for
pub const COOKIE_PATH: &str = "/";

/// Configuration for the session middleware
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Name of the session cookie (default: "web.session")
    pub cookie_name: String,

    /// Idle time after which a session expires (default: 30 minutes)
    pub session_timeout: Duration,

    /// Log a debug advisory for session cookies served over plain http (default: true)
    pub nag_https: bool,

    /// Secure flag for cookie (default: false)
    pub cookie_secure: bool,

    /// HttpOnly flag for cookie (default: true)
    pub cookie_http_only: bool,

    /// A cookie value must be strictly longer than this to be trusted as a
    /// session id. Also the number of random bytes new ids are minted from.
    pub min_length: usize,

    /// Delay between lookups while the store's retry window is open (default: 5ms)
    pub retry_backoff: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            nag_https: true,
            cookie_secure: false,
            cookie_http_only: true,
            min_length: DEFAULT_MIN_LENGTH,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl SessionConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cookie name (default: "web.session")
    pub fn with_cookie_name<S: Into<String>>(mut self, name: S) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Set the session idle timeout
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Enable or disable the plain-http advisory (default: true)
    pub fn with_nag_https(mut self, nag: bool) -> Self {
        self.nag_https = nag;
        self
    }

    /// Set the HttpOnly flag (default: true)
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.cookie_http_only = http_only;
        self
    }

    /// Set the Secure flag (default: false)
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    /// Set the minimum accepted cookie value length (default: 32)
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    /// Set the delay between lookup retries (default: 5ms)
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Whether a presented cookie value is long enough to be looked up
    pub fn accepts_id(&self, value: &str) -> bool {
        value.len() > self.min_length
    }

    /// Build the session cookie for `session_id`.
    ///
    /// The cookie never carries `Max-Age` or `Expires`: it lives as long as
    /// the browser session.
    pub fn session_cookie(&self, session_id: &str) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), session_id.to_string()))
            .path(COOKIE_PATH)
            .secure(self.cookie_secure)
            .http_only(self.cookie_http_only)
            .build()
    }
}
