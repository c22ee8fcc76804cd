//! Distributed cache backends.

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub mod inmemory;
#[cfg(feature = "redis")]
pub mod redis;

pub use inmemory::InMemoryBackend;
#[cfg(feature = "redis")]
pub use redis::{RedisBackend, RedisConfig};

/// Expiration settings attached to an entry when it is written.
///
/// Both windows may be set at once; the entry then lives until whichever lapses first.
/// With neither set the entry never expires.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntryOptions {
    /// Evict the entry if it is not read or refreshed for this long.
    /// Every successful read or refresh restarts the window.
    pub sliding_expiration: Option<Duration>,

    /// Hard deadline, relative to the time of the write. Sliding refreshes never extend past it.
    pub absolute_expiration: Option<Duration>,
}

impl EntryOptions {
    /// Sliding expiration only.
    pub fn sliding(window: Duration) -> Self {
        EntryOptions {
            sliding_expiration: Some(window),
            absolute_expiration: None,
        }
    }

    /// Sliding expiration expressed in whole minutes.
    pub fn sliding_minutes(minutes: u32) -> Self {
        Self::sliding(Duration::from_secs(u64::from(minutes) * 60))
    }

    /// Add an absolute deadline relative to now.
    pub fn with_absolute_expiration(mut self, deadline: Duration) -> Self {
        self.absolute_expiration = Some(deadline);
        self
    }

    /// Reject zero-length windows.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` if either window is zero.
    pub fn validate(&self) -> Result<()> {
        if self.sliding_expiration.is_some_and(|d| d.is_zero()) {
            return Err(Error::InvalidArgument(
                "sliding expiration must be positive".to_string(),
            ));
        }
        if self.absolute_expiration.is_some_and(|d| d.is_zero()) {
            return Err(Error::InvalidArgument(
                "absolute expiration must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Time the entry may live from now, given how long remains until the absolute deadline.
    pub(crate) fn window(sliding: Option<Duration>, remaining: Option<Duration>) -> Option<Duration> {
        match (sliding, remaining) {
            (Some(s), Some(r)) => Some(s.min(r)),
            (Some(s), None) => Some(s),
            (None, r) => r,
        }
    }
}

/// Trait for distributed cache implementations.
///
/// Values are opaque strings; the adapter owns (de)serialization.
///
/// **IMPORTANT:** All methods use `&self` so one backend can be shared by every caller in the
/// process. Implementations use interior mutability or external storage.
///
/// **CANCELLATION:** Every method receives the caller's token. Honouring it is the backend's
/// job; a cancelled call returns `Error::Cancelled`.
#[allow(async_fn_in_trait)]
pub trait DistributedCache: Send + Sync + Clone {
    /// Retrieve an entry by key, restarting its sliding window on a hit.
    ///
    /// # Returns
    /// - `Ok(Some(text))` - Entry found
    /// - `Ok(None)` - Key not found or expired
    ///
    /// # Errors
    /// Returns `Err` if a backend error occurs (connection lost, etc.)
    async fn get(&self, key: &str, cancel: &CancellationToken) -> Result<Option<String>>;

    /// Create or overwrite an entry.
    ///
    /// # Errors
    /// Returns `Err` if a backend error occurs
    async fn set(
        &self,
        key: &str,
        value: String,
        options: EntryOptions,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Restart an entry's sliding window without reading it. Missing keys are ignored.
    ///
    /// # Errors
    /// Returns `Err` if a backend error occurs
    async fn refresh(&self, key: &str, cancel: &CancellationToken) -> Result<()>;

    /// Remove an entry. Missing keys are ignored.
    ///
    /// # Errors
    /// Returns `Err` if a backend error occurs
    async fn remove(&self, key: &str, cancel: &CancellationToken) -> Result<()>;

    /// Health check - verify backend is accessible.
    ///
    /// # Errors
    /// Returns `Err` if backend is not accessible
    async fn health_check(&self, _cancel: &CancellationToken) -> Result<bool> {
        Ok(true)
    }
}

/// Fail fast if the token has already fired.
pub(crate) fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

/// Race a backend operation against the cancellation token.
#[cfg_attr(not(feature = "redis"), allow(dead_code))]
pub(crate) async fn run_cancellable<T, F>(cancel: &CancellationToken, op: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = op => result,
    }
}
