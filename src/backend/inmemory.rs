//! In-memory distributed cache stand-in (default, thread-safe, async).
//!
//! Uses DashMap for lock-free concurrent access with per-key sharding.
//! Sliding and absolute expiration are evaluated on access, the same way
//! a real distributed store treats them.

use super::{ensure_active, DistributedCache, EntryOptions};
use crate::error::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Stored entry with its expiration bookkeeping.
struct CacheEntry {
    data: String,
    sliding: Option<Duration>,
    absolute_deadline: Option<Instant>,
    last_access: Instant,
}

impl CacheEntry {
    fn new(data: String, options: EntryOptions, now: Instant) -> Self {
        CacheEntry {
            data,
            sliding: options.sliding_expiration,
            // A deadline past the clock's range never arrives.
            absolute_deadline: options
                .absolute_expiration
                .and_then(|d| now.checked_add(d)),
            last_access: now,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        let slid_out = self
            .sliding
            .and_then(|s| self.last_access.checked_add(s))
            .is_some_and(|deadline| now >= deadline);
        let past_deadline = self.absolute_deadline.is_some_and(|deadline| now >= deadline);
        slid_out || past_deadline
    }

    fn touch(&mut self, now: Instant) {
        self.last_access = now;
    }
}

/// Thread-safe async in-memory cache backend.
///
/// Clones share the same store. Time is read from `tokio::time`, so tests
/// can drive expiration with a paused clock.
///
/// # Example
///
/// ```no_run
/// use distcache::backend::{DistributedCache, EntryOptions, InMemoryBackend};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = InMemoryBackend::new();
///     let cancel = CancellationToken::new();
///
///     backend
///         .set("key1", "\"value\"".to_string(), EntryOptions::sliding_minutes(5), &cancel)
///         .await?;
///
///     let value = backend.get("key1", &cancel).await?;
///     assert!(value.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct InMemoryBackend {
    store: Arc<DashMap<String, CacheEntry>>,
}

impl InMemoryBackend {
    /// Create a new in-memory cache backend.
    pub fn new() -> Self {
        InMemoryBackend {
            store: Arc::new(DashMap::new()),
        }
    }

    /// Get the current number of entries, expired ones included until they are next touched.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Get memory statistics.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let total_bytes: usize = self.store.iter().map(|entry| entry.data.len()).sum();
        let expired_count = self
            .store
            .iter()
            .filter(|entry| entry.is_expired(now))
            .count();

        CacheStats {
            total_entries: self.store.len(),
            expired_entries: expired_count,
            total_bytes,
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DistributedCache for InMemoryBackend {
    async fn get(&self, key: &str, cancel: &CancellationToken) -> Result<Option<String>> {
        ensure_active(cancel)?;
        let now = Instant::now();

        let hit = match self.store.get_mut(key) {
            Some(mut entry) if !entry.is_expired(now) => {
                entry.touch(now);
                Some(entry.data.clone())
            }
            _ => None,
        };

        if hit.is_some() {
            debug!("✓ InMemory GET {} -> HIT", key);
        } else {
            self.store.remove_if(key, |_, entry| entry.is_expired(now));
            debug!("✓ InMemory GET {} -> MISS", key);
        }

        Ok(hit)
    }

    async fn set(
        &self,
        key: &str,
        value: String,
        options: EntryOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        ensure_active(cancel)?;
        let entry = CacheEntry::new(value, options, Instant::now());
        self.store.insert(key.to_string(), entry);

        debug!("✓ InMemory SET {} ({:?})", key, options);
        Ok(())
    }

    async fn refresh(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        ensure_active(cancel)?;
        let now = Instant::now();

        let refreshed = match self.store.get_mut(key) {
            Some(mut entry) if !entry.is_expired(now) => {
                entry.touch(now);
                true
            }
            _ => false,
        };

        if !refreshed {
            self.store.remove_if(key, |_, entry| entry.is_expired(now));
        }

        debug!("✓ InMemory REFRESH {} (found: {})", key, refreshed);
        Ok(())
    }

    async fn remove(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        ensure_active(cancel)?;
        self.store.remove(key);
        debug!("✓ InMemory DELETE {}", key);
        Ok(())
    }
}

/// Cache statistics.
#[derive(Clone, Debug)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub total_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn sliding(secs: u64) -> EntryOptions {
        EntryOptions::sliding(Duration::from_secs(secs))
    }

    #[tokio::test]
    async fn test_inmemory_backend_set_get() {
        let backend = InMemoryBackend::new();
        let cancel = CancellationToken::new();

        backend
            .set("key1", "value1".to_string(), sliding(60), &cancel)
            .await
            .expect("Failed to set");

        let result = backend.get("key1", &cancel).await.expect("Failed to get");
        assert_eq!(result.as_deref(), Some("value1"));
    }

    #[tokio::test]
    async fn test_inmemory_backend_miss() {
        let backend = InMemoryBackend::new();

        let result = backend
            .get("nonexistent", &CancellationToken::new())
            .await
            .expect("Failed to get");
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_inmemory_backend_remove_idempotent() {
        let backend = InMemoryBackend::new();
        let cancel = CancellationToken::new();

        backend
            .set("key1", "value1".to_string(), EntryOptions::default(), &cancel)
            .await
            .expect("Failed to set");

        backend.remove("key1", &cancel).await.expect("Failed to remove");
        backend.remove("key1", &cancel).await.expect("Second remove failed");
        assert!(backend.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_inmemory_backend_sliding_window_extended_by_reads() {
        let backend = InMemoryBackend::new();
        let cancel = CancellationToken::new();

        backend
            .set("key1", "value1".to_string(), sliding(10), &cancel)
            .await
            .expect("Failed to set");

        // Each read inside the window pushes the deadline out.
        for _ in 0..3 {
            tokio::time::advance(Duration::from_secs(8)).await;
            assert!(backend.get("key1", &cancel).await.expect("Failed to get").is_some());
        }

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(backend.get("key1", &cancel).await.expect("Failed to get").is_none());
        assert!(backend.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_inmemory_backend_refresh_extends_window() {
        let backend = InMemoryBackend::new();
        let cancel = CancellationToken::new();

        backend
            .set("key1", "value1".to_string(), sliding(10), &cancel)
            .await
            .expect("Failed to set");

        tokio::time::advance(Duration::from_secs(8)).await;
        backend.refresh("key1", &cancel).await.expect("Failed to refresh");

        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(backend.get("key1", &cancel).await.expect("Failed to get").is_some());

        backend.refresh("missing", &cancel).await.expect("Refresh of missing key failed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_inmemory_backend_absolute_caps_sliding() {
        let backend = InMemoryBackend::new();
        let cancel = CancellationToken::new();
        let options = sliding(10).with_absolute_expiration(Duration::from_secs(15));

        backend
            .set("key1", "value1".to_string(), options, &cancel)
            .await
            .expect("Failed to set");

        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(backend.get("key1", &cancel).await.expect("Failed to get").is_some());

        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(backend.get("key1", &cancel).await.expect("Failed to get").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_inmemory_backend_unbounded_windows_never_expire() {
        let backend = InMemoryBackend::new();
        let cancel = CancellationToken::new();
        let options = EntryOptions::sliding(Duration::MAX).with_absolute_expiration(Duration::MAX);

        backend
            .set("key1", "value1".to_string(), options, &cancel)
            .await
            .expect("Failed to set");

        tokio::time::advance(Duration::from_secs(365 * 24 * 3600)).await;
        assert!(backend.get("key1", &cancel).await.expect("Failed to get").is_some());
        backend.refresh("key1", &cancel).await.expect("Failed to refresh");
    }

    #[tokio::test]
    async fn test_inmemory_backend_cancelled() {
        let backend = InMemoryBackend::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = backend
            .set("key1", "value1".to_string(), sliding(60), &cancel)
            .await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(backend.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_inmemory_backend_stats() {
        let backend = InMemoryBackend::new();
        let cancel = CancellationToken::new();

        backend
            .set("key1", "value_with_data".to_string(), sliding(5), &cancel)
            .await
            .expect("Failed to set");
        backend
            .set("key2", "data".to_string(), EntryOptions::default(), &cancel)
            .await
            .expect("Failed to set");

        tokio::time::advance(Duration::from_secs(6)).await;

        let stats = backend.stats();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.expired_entries, 1);
        assert_eq!(stats.total_bytes, "value_with_data".len() + "data".len());
    }

    #[tokio::test]
    async fn test_inmemory_backend_clone_shares_store() {
        let backend1 = InMemoryBackend::new();
        let cancel = CancellationToken::new();
        backend1
            .set("key", "value".to_string(), EntryOptions::default(), &cancel)
            .await
            .expect("Failed to set");

        let backend2 = backend1.clone();
        let value = backend2.store.get("key").map(|e| e.data.clone());
        assert_eq!(value.as_deref(), Some("value"));
    }

    #[tokio::test]
    async fn test_inmemory_backend_thread_safe() {
        let backend = InMemoryBackend::new();
        let mut handles = vec![];

        for i in 0..10 {
            let b = backend.clone();
            let handle = tokio::spawn(async move {
                let key = format!("key_{}", i);
                let value = format!("value_{}", i);
                b.set(&key, value, EntryOptions::default(), &CancellationToken::new())
                    .await
                    .expect("Failed to set");
            });
            handles.push(handle);
        }

        for handle in handles {
            handle.await.expect("Task failed");
        }

        assert_eq!(backend.len(), 10);
    }
}
