//! Store double that records every call, for tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{MemoryStore, SessionStore};
use crate::error::SessionError;
use crate::session::{Session, SessionRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Op {
    Get(String),
    Put(String),
    Delete(String),
    Create,
}

#[derive(Default)]
struct Faults {
    hidden_gets: AtomicUsize,
    fail_gets: AtomicBool,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

/// Memory store that logs operations and can inject lag or failures
#[derive(Clone)]
pub(crate) struct RecordingStore {
    inner: MemoryStore,
    ops: Arc<Mutex<Vec<Op>>>,
    faults: Arc<Faults>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            ops: Arc::new(Mutex::new(Vec::new())),
            faults: Arc::new(Faults::default()),
        }
    }

    pub fn with_retry_timeout(mut self, retry_timeout: Duration) -> Self {
        self.inner = self.inner.with_retry_timeout(retry_timeout);
        self
    }

    /// The next `n` gets miss even when the session exists
    pub fn hide_for(&self, n: usize) {
        self.faults.hidden_gets.store(n, Ordering::SeqCst);
    }

    pub fn fail_gets(&self) {
        self.faults.fail_gets.store(true, Ordering::SeqCst);
    }

    pub fn fail_puts(&self) {
        self.faults.fail_puts.store(true, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self) {
        self.faults.fail_deletes.store(true, Ordering::SeqCst);
    }

    /// Store a session under a chosen id without recording the write
    pub async fn seed(&self, id: &str) -> Session {
        let session = Session::from_record(SessionRecord::new(id, Duration::from_secs(600)));
        self.inner.put(&session).await.expect("memory put");
        session
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.ops.lock().iter().filter(|op| pred(op)).count()
    }

    pub fn gets(&self) -> usize {
        self.count(|op| matches!(op, Op::Get(_)))
    }

    pub fn puts(&self) -> usize {
        self.count(|op| matches!(op, Op::Put(_)))
    }

    pub fn creates(&self) -> usize {
        self.count(|op| matches!(op, Op::Create))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.record(id).is_some()
    }

    pub fn ids(&self) -> Vec<String> {
        self.inner.ids()
    }

    fn log(&self, op: Op) {
        self.ops.lock().push(op);
    }
}

#[async_trait]
impl SessionStore for RecordingStore {
    async fn get(&self, id: &str) -> Result<Option<Session>, SessionError> {
        self.log(Op::Get(id.to_string()));
        if self.faults.fail_gets.load(Ordering::SeqCst) {
            return Err(SessionError::store("get refused"));
        }
        let hidden = self
            .faults
            .hidden_gets
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if hidden {
            return Ok(None);
        }
        self.inner.get(id).await
    }

    async fn put(&self, session: &Session) -> Result<(), SessionError> {
        self.log(Op::Put(session.id()));
        if self.faults.fail_puts.load(Ordering::SeqCst) {
            return Err(SessionError::store("put refused"));
        }
        self.inner.put(session).await
    }

    async fn delete(&self, id: &str) -> Result<(), SessionError> {
        self.log(Op::Delete(id.to_string()));
        if self.faults.fail_deletes.load(Ordering::SeqCst) {
            return Err(SessionError::store("delete refused"));
        }
        self.inner.delete(id).await
    }

    fn create(&self, timeout: Duration, min_length: usize) -> Session {
        self.log(Op::Create);
        self.inner.create(timeout, min_length)
    }

    fn retry_timeout(&self) -> Duration {
        self.inner.retry_timeout()
    }
}
