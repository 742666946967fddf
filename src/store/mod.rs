//! Session store implementations

mod caching;
mod memory;
mod traits;

pub use caching::CachingStore;
pub use memory::MemoryStore;
pub use traits::SessionStore;

#[cfg(feature = "redis-store")]
mod redis_store;

#[cfg(feature = "redis-store")]
pub use redis_store::RedisStore;

#[cfg(test)]
pub(crate) mod recording;
