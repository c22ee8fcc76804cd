//! Cache adapter - typed get/set/remove/get-or-create over a distributed cache.

use crate::backend::{DistributedCache, EntryOptions};
use crate::error::{Error, Result};
use crate::key::CacheKeyBuilder;
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::serialization::JsonCodec;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Core cache adapter.
///
/// Composes an injected [`DistributedCache`] with a [`JsonCodec`]. Every call is an
/// independent request against the backing store: validate, delegate, (de)serialize.
/// Nothing is retried and no fallback values are produced; a miss is the only
/// outcome modelled as `Ok(None)`.
///
/// Build one per process and share it, usually through [`CacheService`](crate::CacheService).
///
/// # Example
///
/// ```ignore
/// use distcache::{CacheAdapter, backend::InMemoryBackend};
/// use tokio_util::sync::CancellationToken;
///
/// let cache = CacheAdapter::new(InMemoryBackend::new());
/// let cancel = CancellationToken::new();
///
/// cache.set("user:42", user, 10, &cancel).await?;
/// let user: Option<User> = cache.get("user:42", &cancel).await?;
/// ```
pub struct CacheAdapter<B: DistributedCache> {
    backend: B,
    codec: JsonCodec,
    metrics: Box<dyn CacheMetrics>,
    // Only used by `get_or_create_exclusive`.
    factory_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<B: DistributedCache> CacheAdapter<B> {
    /// Create new adapter with given backend.
    ///
    /// The codec omits null fields on write.
    pub fn new(backend: B) -> Self {
        CacheAdapter {
            backend,
            codec: JsonCodec::new(),
            metrics: Box::new(NoOpMetrics),
            factory_locks: DashMap::new(),
        }
    }

    /// Set the codec used for every entry.
    pub fn with_codec(mut self, codec: JsonCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Box<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Get a cached value.
    ///
    /// Returns `Ok(None)` when the key is absent, expired, or holds empty/whitespace-only
    /// text or a bare JSON `null`. A successful read restarts the entry's sliding window in the backing store.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArgument`: Key is empty
    /// - `Error::SerializationError`: Stored text cannot be decoded into `T`
    /// - `Error::BackendError`: Backing store failure
    /// - `Error::Cancelled`: Token fired
    pub async fn get<T>(&self, key: &str, cancel: &CancellationToken) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        CacheKeyBuilder::validate(key)?;
        let timer = Instant::now();

        let raw = self.observe(key, self.backend.get(key, cancel).await)?;

        match raw {
            Some(text) if !is_blank_entry(&text) => {
                let value = self.observe(key, self.codec.decode(&text))?;
                self.metrics.record_hit(key, timer.elapsed());
                Ok(Some(value))
            }
            Some(_) => {
                debug!("Blank or null entry for {} treated as miss", key);
                self.metrics.record_miss(key, timer.elapsed());
                Ok(None)
            }
            None => {
                self.metrics.record_miss(key, timer.elapsed());
                Ok(None)
            }
        }
    }

    /// Store a value with a sliding expiration of `ttl_minutes` minutes.
    ///
    /// Returns the value unchanged so calls can be chained.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArgument`: Key is empty, `ttl_minutes` is zero, or the value is null
    /// - `Error::SerializationError`: Value cannot be encoded
    /// - `Error::BackendError`: Backing store failure
    /// - `Error::Cancelled`: Token fired
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
        self.set_with_options(key, value, EntryOptions::sliding_minutes(ttl_minutes), cancel)
            .await
    }

    /// Store a value with explicit expiration options.
    ///
    /// Validation happens before any I/O; a rejected call never writes.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub async fn set_with_options<T>(
        &self,
        key: &str,
        value: T,
        options: EntryOptions,
        cancel: &CancellationToken,
    ) -> Result<T>
    where
        T: Serialize,
    {
        CacheKeyBuilder::validate(key)?;
        options.validate()?;

        let tree = self.observe(key, self.codec.to_tree(&value))?;
        if tree.is_null() {
            return Err(Error::InvalidArgument(format!(
                "refusing to cache a null value for {}",
                key
            )));
        }

        let timer = Instant::now();
        self.observe(
            key,
            self.backend.set(key, tree.to_string(), options, cancel).await,
        )?;
        self.metrics.record_set(key, timer.elapsed());

        Ok(value)
    }

    /// Remove an entry. Removing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArgument`: Key is empty
    /// - `Error::BackendError`: Backing store failure
    /// - `Error::Cancelled`: Token fired
    pub async fn remove(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        CacheKeyBuilder::validate(key)?;
        let timer = Instant::now();

        self.observe(key, self.backend.remove(key, cancel).await)?;
        self.metrics.record_delete(key, timer.elapsed());
        Ok(())
    }

    /// Restart an entry's sliding window without reading it. Missing keys are ignored.
    ///
    /// # Errors
    ///
    /// Same as [`remove`](Self::remove).
    pub async fn refresh(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        CacheKeyBuilder::validate(key)?;
        self.observe(key, self.backend.refresh(key, cancel).await)
    }

    /// Return the cached value, or produce it with `factory` and cache it.
    ///
    /// On a hit the factory is not invoked. On a miss the factory receives a clone of the
    /// cancellation token; `Ok(None)` from it is returned as-is without writing, and
    /// `Ok(Some(value))` is stored with a sliding expiration of `ttl_minutes`.
    ///
    /// The error type is the factory's own, so factory failures reach the caller
    /// unchanged. Adapter errors convert into it through `From<Error>`.
    ///
    /// Concurrent callers missing on the same key each run the factory and each write
    /// the result (last write wins). Use
    /// [`get_or_create_exclusive`](Self::get_or_create_exclusive) to run it once per
    /// process instead.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let user = cache
    ///     .get_or_create(10, "user:42", |_cancel| async { repo.find(42).await }, &cancel)
    ///     .await?;
    /// ```
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
        CacheKeyBuilder::validate(key)?;
        EntryOptions::sliding_minutes(ttl_minutes).validate()?;

        if let Some(cached) = self.get::<T>(key, cancel).await? {
            return Ok(Some(cached));
        }

        debug!("» Cache miss for {}, invoking factory", key);

        match factory(cancel.clone()).await? {
            Some(value) => Ok(Some(self.set(key, value, ttl_minutes, cancel).await?)),
            None => {
                debug!("Factory produced no value for {}, nothing cached", key);
                Ok(None)
            }
        }
    }

    /// Like [`get_or_create`](Self::get_or_create), but concurrent callers in this process
    /// that miss on the same key wait for each other, so the factory runs once.
    ///
    /// Callers that waited re-check the cache before invoking their own factory. Other
    /// processes sharing the backing store are not coordinated.
    pub async fn get_or_create_exclusive<T, E, F, Fut>(
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
        CacheKeyBuilder::validate(key)?;
        EntryOptions::sliding_minutes(ttl_minutes).validate()?;

        if let Some(cached) = self.get::<T>(key, cancel).await? {
            return Ok(Some(cached));
        }

        let lock = FactoryLock::acquire(&self.factory_locks, key);

        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(E::from(Error::Cancelled)),
            guard = lock.mutex.lock() => guard,
        };
        self.get_or_create(ttl_minutes, key, factory, cancel).await
    }

    /// Health check - delegate to the backing store.
    ///
    /// # Errors
    /// Returns `Err` if the backend is not accessible
    pub async fn health_check(&self, cancel: &CancellationToken) -> Result<bool> {
        self.backend.health_check(cancel).await
    }

    /// Get backend reference (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Get the codec used for every entry.
    pub fn codec(&self) -> &JsonCodec {
        &self.codec
    }

    fn observe<T>(&self, key: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.metrics.record_error(key, &e.to_string());
        }
        result
    }
}

/// Stored text that reads back as a miss: blank, or a bare JSON `null`.
fn is_blank_entry(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || text == "null"
}

/// Handle on a per-key factory lock.
///
/// Dropping it removes the table entry once no other caller holds the same lock,
/// including when the owning future is dropped mid-flight.
struct FactoryLock<'a> {
    table: &'a DashMap<String, Arc<Mutex<()>>>,
    key: String,
    mutex: Arc<Mutex<()>>,
}

impl<'a> FactoryLock<'a> {
    fn acquire(table: &'a DashMap<String, Arc<Mutex<()>>>, key: &str) -> Self {
        let mutex = Arc::clone(&table.entry(key.to_string()).or_default());
        FactoryLock {
            table,
            key: key.to_string(),
            mutex,
        }
    }
}

impl Drop for FactoryLock<'_> {
    fn drop(&mut self) {
        // Our clone still counts here, so the entry is unused when only it and the table's remain.
        self.table
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) <= 2);
    }
}
