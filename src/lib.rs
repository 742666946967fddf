//! # salvo-cluster-session
//!
//! Session middleware for the Salvo web framework, built for clustered
//! session stores.
//!
//! ## Features
//!
//! - **Anti-fixation**: a cookie naming a session the store does not know is
//!   never adopted; the client gets a fresh anonymous session instead
//! - **Eventual consistency tolerance**: misses are retried for as long as
//!   the store's `retry_timeout` says a write may still be propagating
//! - **Safe id regeneration**: the session is stored under its new id before
//!   the old id is deleted
//! - **Outcome-aware persistence**: sessions are only written back for 2xx
//!   and 3xx responses, destroyed sessions are only ever deleted
//! - **Pluggable storage backends**: Redis, memory, a near cache, or custom stores
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use salvo::prelude::*;
//! use salvo_cluster_session::{MemoryStore, SessionConfig, SessionDepotExt, SessionHandler};
//!
//! #[tokio::main]
//! async fn main() {
//!     let session_handler = SessionHandler::new(MemoryStore::new(), SessionConfig::new());
//!
//!     let router = Router::new()
//!         .hoop(session_handler)
//!         .get(index);
//!
//!     let acceptor = TcpListener::new("127.0.0.1:5800").bind().await;
//!     Server::new(acceptor).serve(router).await;
//! }
//!
//! #[handler]
//! async fn index(depot: &mut Depot) -> &'static str {
//!     let session = depot.session().unwrap();
//!     let views: i32 = session.get("views").unwrap_or(0);
//!     session.set("views", views + 1);
//!     "Hello, World!"
//! }
//! ```

pub mod config;
pub mod error;
pub mod finalizer;
pub mod handler;
pub mod resolver;
pub mod session;
pub mod store;

pub use config::SessionConfig;
pub use error::SessionError;
pub use finalizer::{CookieDirective, Outcome, SessionFinalizer};
pub use handler::SessionHandler;
pub use resolver::SessionResolver;
pub use session::{Session, SessionRecord, SessionState};
pub use store::{CachingStore, MemoryStore, SessionStore};

#[cfg(feature = "redis-store")]
pub use store::RedisStore;

/// Extension trait for Depot to easily access session
pub mod depot_ext;
pub use depot_ext::SessionDepotExt;
