//! Session error types

/// Errors that can occur during session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Error from the session store
    #[error("Session store error: {0}")]
    StoreError(String),

    /// Error during serialization/deserialization of a session record
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Redis error (when redis-store feature is enabled)
    #[cfg(feature = "redis-store")]
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),
}

impl SessionError {
    /// Shorthand for a store-side failure with a message
    pub fn store<S: Into<String>>(msg: S) -> Self {
        SessionError::StoreError(msg.into())
    }
}
