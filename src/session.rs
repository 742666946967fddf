//! Session entity and its persisted record

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Fewest random bytes a session id is minted from
const MIN_ID_BYTES: usize = 16;

/// Mint a fresh session id from `length` random bytes (at least 16).
///
/// The encoded id is always longer than `length`, so it passes the
/// handler's minimum-length check for the same setting.
pub fn generate_id(length: usize) -> String {
    let mut bytes = vec![0u8; length.max(MIN_ID_BYTES)];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Lifecycle state of a session within one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Live session. `old_id` is set once the id has been rotated.
    Active { id: String, old_id: Option<String> },
    /// Destroyed session; it will be deleted, never written back.
    Destroyed { id: String, old_id: Option<String> },
}

impl SessionState {
    fn id(&self) -> &str {
        match self {
            SessionState::Active { id, .. } | SessionState::Destroyed { id, .. } => id,
        }
    }

    fn old_id(&self) -> Option<&str> {
        match self {
            SessionState::Active { old_id, .. } | SessionState::Destroyed { old_id, .. } => {
                old_id.as_deref()
            }
        }
    }
}

/// Persisted form of a session
///
/// Lifecycle flags are request-scoped and are not part of the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub last_accessed: DateTime<Utc>,
    /// Idle timeout in milliseconds
    pub timeout_ms: u64,
    /// Random bytes used when minting a replacement id
    #[serde(default = "default_id_length")]
    pub id_length: usize,
    #[serde(default)]
    pub data: HashMap<String, Value>,
}

fn default_id_length() -> usize {
    MIN_ID_BYTES
}

fn saturating_millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

impl SessionRecord {
    /// A fresh record accessed now with no attributes
    pub fn new<S: Into<String>>(id: S, timeout: Duration) -> Self {
        Self {
            id: id.into(),
            last_accessed: Utc::now(),
            timeout_ms: saturating_millis(timeout),
            id_length: MIN_ID_BYTES,
            data: HashMap::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Check if the record went unaccessed for longer than its timeout
    pub fn is_expired(&self) -> bool {
        let idle = Utc::now() - self.last_accessed;
        match chrono::Duration::from_std(self.timeout()) {
            Ok(timeout) => idle > timeout,
            Err(_) => false,
        }
    }
}

#[derive(Debug)]
struct SessionInner {
    state: SessionState,
    timeout: Duration,
    last_accessed: DateTime<Utc>,
    id_length: usize,
    data: HashMap<String, Value>,
}

/// Session handle shared between the middleware and downstream handlers
///
/// Clones share the same state: a handler mutating the copy it got from the
/// depot is seen by the finalizer when the response is committed.
pub struct Session {
    inner: Arc<RwLock<SessionInner>>,
}

impl Session {
    /// Create a brand-new session with a freshly minted id
    pub fn new(timeout: Duration, id_length: usize) -> Self {
        let id_length = id_length.max(MIN_ID_BYTES);
        Self::from_inner(SessionInner {
            state: SessionState::Active {
                id: generate_id(id_length),
                old_id: None,
            },
            timeout,
            last_accessed: Utc::now(),
            id_length,
            data: HashMap::new(),
        })
    }

    /// Rebuild a session from its persisted record
    pub fn from_record(record: SessionRecord) -> Self {
        let timeout = record.timeout();
        Self::from_inner(SessionInner {
            state: SessionState::Active {
                id: record.id,
                old_id: None,
            },
            timeout,
            last_accessed: record.last_accessed,
            id_length: record.id_length,
            data: record.data,
        })
    }

    fn from_inner(inner: SessionInner) -> Self {
        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Snapshot of the persisted form, keyed by the current id
    pub fn to_record(&self) -> SessionRecord {
        let inner = self.inner.read();
        SessionRecord {
            id: inner.state.id().to_string(),
            last_accessed: inner.last_accessed,
            timeout_ms: saturating_millis(inner.timeout),
            id_length: inner.id_length,
            data: inner.data.clone(),
        }
    }

    /// Current session id
    pub fn id(&self) -> String {
        self.inner.read().state.id().to_string()
    }

    /// Id the session had before it was regenerated in this request
    pub fn old_id(&self) -> Option<String> {
        self.inner.read().state.old_id().map(str::to_string)
    }

    pub fn state(&self) -> SessionState {
        self.inner.read().state.clone()
    }

    pub fn timeout(&self) -> Duration {
        self.inner.read().timeout
    }

    pub fn last_accessed(&self) -> DateTime<Utc> {
        self.inner.read().last_accessed
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(self.inner.read().state, SessionState::Destroyed { .. })
    }

    /// True when the id was rotated during this request
    pub fn is_regenerated(&self) -> bool {
        matches!(
            self.inner.read().state,
            SessionState::Active {
                old_id: Some(_),
                ..
            }
        )
    }

    /// Check if the session went unaccessed for longer than its timeout
    pub fn is_expired(&self) -> bool {
        self.to_record().is_expired()
    }

    /// Touch the session - mark it accessed now
    pub fn set_accessed(&self) {
        let mut inner = self.inner.write();
        if let SessionState::Active { .. } = inner.state {
            inner.last_accessed = Utc::now();
        }
    }

    /// Give the session a new id, keeping its attributes.
    ///
    /// The first rotation records the id the store knows as `old_id`;
    /// later rotations in the same request keep it. Returns the new id, or
    /// `None` if the session was already destroyed.
    pub fn regenerate_id(&self) -> Option<String> {
        let mut inner = self.inner.write();
        let id_length = inner.id_length;
        match &mut inner.state {
            SessionState::Active { id, old_id } => {
                let mut new_id = generate_id(id_length);
                while new_id == *id || old_id.as_deref() == Some(new_id.as_str()) {
                    new_id = generate_id(id_length);
                }
                let previous = std::mem::replace(id, new_id.clone());
                if old_id.is_none() {
                    *old_id = Some(previous);
                }
                tracing::trace!(old_id = ?old_id, new_id = %new_id, "session id regenerated");
                Some(new_id)
            }
            SessionState::Destroyed { .. } => None,
        }
    }

    /// Mark the session destroyed. Irreversible.
    pub fn destroy(&self) {
        let mut inner = self.inner.write();
        if let SessionState::Active { id, old_id } = &mut inner.state {
            let id = std::mem::take(id);
            let old_id = old_id.take();
            inner.state = SessionState::Destroyed { id, old_id };
        }
    }

    /// Get a value from the session
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.inner
            .read()
            .data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Set a value in the session
    pub fn set<T: Serialize>(&self, key: &str, value: T) {
        match serde_json::to_value(value) {
            Ok(v) => {
                self.inner.write().data.insert(key.to_string(), v);
            }
            Err(e) => tracing::warn!(key, error = %e, "session value is not serializable"),
        }
    }

    /// Remove a value from the session
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.write().data.remove(key)
    }

    /// Check if a key exists in the session
    pub fn contains(&self, key: &str) -> bool {
        self.inner.read().data.contains_key(key)
    }

    /// Clear all session data
    pub fn clear(&self) {
        self.inner.write().data.clear();
    }

    /// Check if the session is empty (no user data)
    pub fn is_empty(&self) -> bool {
        self.inner.read().data.is_empty()
    }
}

impl Clone for Session {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Session")
            .field("state", &inner.state)
            .field("last_accessed", &inner.last_accessed)
            .field("timeout", &inner.timeout)
            .field("data", &inner.data)
            .finish()
    }
}
