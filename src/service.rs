//! Process-wide cache handle.
//!
//! Provides a convenient wrapper around CacheAdapter with Arc for easy sharing.

use crate::adapter::CacheAdapter;
use crate::backend::DistributedCache;
use crate::error::{Error, Result};
use crate::observability::CacheMetrics;
use crate::serialization::JsonCodec;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared cache handle for web applications.
///
/// Wraps `CacheAdapter` in `Arc` so it can be constructed once and cloned into every
/// request handler. The adapter only holds read-only state, so no `Mutex` is needed.
///
/// # Example
///
/// ```ignore
/// use distcache::{CacheService, backend::InMemoryBackend};
///
/// let cache = CacheService::new(InMemoryBackend::new());
///
/// pub struct UserService {
///     cache: CacheService<InMemoryBackend>,
///     repo: Arc<UserRepository>,
/// }
///
/// impl UserService {
///     pub async fn get(&self, id: u64, cancel: &CancellationToken) -> Result<Option<User>, AppError> {
///         let key = CacheKeyBuilder::build_with_prefix("user", &id);
///         let repo = self.repo.clone();
///         self.cache
///             .get_or_create(10, &key, |_| async move { repo.find(id).await }, cancel)
///             .await
///     }
/// }
/// ```
#[derive(Clone)]
pub struct CacheService<B: DistributedCache> {
    adapter: Arc<CacheAdapter<B>>,
}

impl<B: DistributedCache> CacheService<B> {
    /// Create a new cache service with the given backend.
    pub fn new(backend: B) -> Self {
        Self::from_adapter(CacheAdapter::new(backend))
    }

    /// Create a new cache service with a custom codec and metrics.
    pub fn with_options(backend: B, codec: JsonCodec, metrics: Box<dyn CacheMetrics>) -> Self {
        Self::from_adapter(
            CacheAdapter::new(backend)
                .with_codec(codec)
                .with_metrics(metrics),
        )
    }

    /// Share an already configured adapter.
    pub fn from_adapter(adapter: CacheAdapter<B>) -> Self {
        CacheService {
            adapter: Arc::new(adapter),
        }
    }

    /// See [`CacheAdapter::get`].
    ///
    /// # Errors
    ///
    /// Returns `Err` on an empty key, undecodable entry, or backend failure.
    pub async fn get<T>(&self, key: &str, cancel: &CancellationToken) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        self.adapter.get(key, cancel).await
    }

    /// See [`CacheAdapter::set`].
    ///
    /// # Errors
    ///
    /// Returns `Err` on an empty key, zero TTL, null value, or backend failure.
    pub async fn set<T>(
        &self,
        key: &str,
        value: T,
        ttl_minutes: u32,
        cancel: &CancellationToken,
    ) -> Result<T>
    where
        T: Serialize,
    {
        self.adapter.set(key, value, ttl_minutes, cancel).await
    }

    /// See [`CacheAdapter::remove`].
    ///
    /// # Errors
    ///
    /// Returns `Err` on an empty key or backend failure.
    pub async fn remove(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        self.adapter.remove(key, cancel).await
    }

    /// See [`CacheAdapter::get_or_create`].
    pub async fn get_or_create<T, E, F, Fut>(
        &self,
        ttl_minutes: u32,
        key: &str,
        factory: F,
        cancel: &CancellationToken,
    ) -> std::result::Result<Option<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, E>>,
        E: From<Error>,
    {
        self.adapter
            .get_or_create(ttl_minutes, key, factory, cancel)
            .await
    }

    /// Get a reference to the underlying adapter.
    ///
    /// Use this for `set_with_options`, `refresh`, `get_or_create_exclusive` and friends.
    pub fn adapter(&self) -> &CacheAdapter<B> {
        &self.adapter
    }
}
