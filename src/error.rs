//! Error types for the cache adapter.

use std::fmt;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the cache adapter.
///
/// All cache operations return `Result<T>` where `Result` is defined as `std::result::Result<T, Error>`.
/// A cache miss is never an error: lookups return `Ok(None)` instead.
#[derive(Debug, Clone)]
pub enum Error {
    /// A caller-supplied argument was rejected before any I/O happened.
    ///
    /// Raised when:
    /// - The cache key is empty
    /// - The value passed to `set` serializes to JSON `null`
    /// - The sliding expiration is zero
    ///
    /// Never retried.
    InvalidArgument(String),

    /// Encoding a value to JSON or decoding cached JSON text failed.
    ///
    /// Common causes:
    /// - Cached text is malformed or was written by something else
    /// - Cached JSON does not match the requested type
    /// - The value's `Serialize` implementation failed
    ///
    /// Surfaced unchanged; the adapter never evicts or recomputes on its own.
    SerializationError(String),

    /// Backing store error (Redis, etc).
    ///
    /// Common causes:
    /// - Redis connection lost
    /// - Network timeout
    /// - Backend protocol error
    BackendError(String),

    /// The cancellation token fired before the backing store call completed.
    Cancelled,

    /// Configuration error while constructing a backend.
    ///
    /// Common causes:
    /// - Invalid connection string
    /// - Pool creation failure
    ConfigError(String),
}

impl Error {
    /// Returns `true` for errors raised by argument validation.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::InvalidArgument(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::Cancelled => write!(f, "Operation cancelled"),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::BackendError(e.to_string())
        } else {
            Error::SerializationError(e.to_string())
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::BackendError(format!("Redis error: {}", e))
    }
}
