//! Redis distributed cache backend.
//!
//! Each entry is a hash with three fields:
//!
//! ```text
//! absexp  absolute deadline, UTC ticks since 0001-01-01 (-1 = none)
//! sldexp  sliding window, ticks (-1 = none)
//! data    the cached text
//! ```
//!
//! A tick is 100ns, the unit the ASP.NET Redis distributed cache writes, so both
//! clients can share entries. The key's own TTL is set to the current window on write
//! and re-armed on every read or refresh, so Redis does the eviction. An entry read
//! after its absolute deadline is deleted and reported as a miss.

use super::{run_cancellable, DistributedCache, EntryOptions};
use crate::error::{Error, Result};
use deadpool_redis::redis::{cmd, pipe};
use deadpool_redis::{Config as PoolConfig, Connection, Pool, Runtime, Timeouts};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;

const ABSOLUTE_EXPIRATION_FIELD: &str = "absexp";
const SLIDING_EXPIRATION_FIELD: &str = "sldexp";
const DATA_FIELD: &str = "data";
const NOT_PRESENT: i64 = -1;

const TICKS_PER_SECOND: i64 = 10_000_000;
const TICKS_PER_MILLI: i64 = 10_000;
/// Ticks between 0001-01-01 and 1970-01-01.
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;
/// Last tick of 9999-12-31, the latest deadline the other clients can parse.
const MAX_DEADLINE_TICKS: i64 = 3_155_378_975_999_999_999;
/// Longest key TTL handed to PEXPIRE; longer windows are clamped.
const LONGEST_EXPIRE_MILLIS: i64 = i64::MAX / TICKS_PER_MILLI;

/// Default Redis connection pool size.
/// Override with REDIS_POOL_SIZE environment variable
const DEFAULT_POOL_SIZE: u32 = 16;

/// Bound on waiting for, opening and recycling a pooled connection.
const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for Redis backend.
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: u32,
    pub pool_size: u32,
    pub connection_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            host: "localhost".to_string(),
            port: 6379,
            username: None,
            password: None,
            database: 0,
            pool_size: DEFAULT_POOL_SIZE,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }
}

impl RedisConfig {
    /// Build Redis connection string.
    pub fn connection_string(&self) -> String {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => format!(
                "redis://{}:{}@{}:{}/{}",
                username, password, self.host, self.port, self.database
            ),
            (None, Some(password)) => format!(
                "redis://default:{}@{}:{}/{}",
                password, self.host, self.port, self.database
            ),
            _ => format!("redis://{}:{}/{}", self.host, self.port, self.database),
        }
    }
}

/// Redis backend with connection pooling.
///
/// # Example
///
/// ```no_run
/// # use distcache::backend::{RedisBackend, RedisConfig};
/// # use distcache::{CacheAdapter, Result};
/// # use tokio_util::sync::CancellationToken;
/// # async fn example() -> Result<()> {
/// let backend = RedisBackend::new(RedisConfig::default())?;
/// let cache = CacheAdapter::new(backend);
///
/// cache.set("greeting", "hello".to_string(), 10, &CancellationToken::new()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
}

impl RedisBackend {
    /// Create new Redis backend from configuration.
    ///
    /// Connections are opened lazily by the pool.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the pool cannot be created.
    pub fn new(config: RedisConfig) -> Result<Self> {
        let backend = Self::with_pool(pool_config(
            &config.connection_string(),
            config.pool_size,
            config.connection_timeout,
        ))?;
        info!(
            "✓ Redis backend initialized: {}:{}",
            config.host, config.port
        );
        Ok(backend)
    }

    /// Create from connection string directly.
    ///
    /// Pool size is determined by:
    /// 1. `REDIS_POOL_SIZE` environment variable (if set)
    /// 2. `DEFAULT_POOL_SIZE` constant (16)
    ///
    /// Connection waits are bounded by `DEFAULT_CONNECTION_TIMEOUT` (5s).
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the pool cannot be created.
    pub fn from_connection_string(conn_str: &str) -> Result<Self> {
        let pool_size = std::env::var("REDIS_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_POOL_SIZE);

        let backend =
            Self::with_pool(pool_config(conn_str, pool_size, DEFAULT_CONNECTION_TIMEOUT))?;
        info!(
            "✓ Redis backend initialized from connection string (pool size: {})",
            pool_size
        );
        Ok(backend)
    }

    fn with_pool(cfg: PoolConfig) -> Result<Self> {
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::ConfigError(format!("Failed to create Redis pool: {}", e)))?;

        Ok(RedisBackend { pool })
    }

    async fn connection(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| Error::BackendError(format!("Failed to get Redis connection: {}", e)))
    }

    /// Re-arm the key TTL from its stored expiration fields.
    ///
    /// Returns `false` if the absolute deadline has passed; the key is deleted then.
    async fn rearm(
        conn: &mut Connection,
        key: &str,
        absolute: Option<i64>,
        sliding: Option<i64>,
    ) -> Result<bool> {
        match rearm_plan(absolute, sliding, now_ticks()) {
            Rearm::Keep => Ok(true),
            Rearm::Expire(window) => {
                cmd("PEXPIRE")
                    .arg(key)
                    .arg(expire_millis(window))
                    .query_async::<()>(&mut **conn)
                    .await
                    .map_err(|e| {
                        Error::BackendError(format!("Redis PEXPIRE failed for key {}: {}", key, e))
                    })?;
                Ok(true)
            }
            Rearm::Expired => {
                cmd("DEL")
                    .arg(key)
                    .query_async::<()>(&mut **conn)
                    .await
                    .map_err(|e| {
                        Error::BackendError(format!("Redis DEL failed for key {}: {}", key, e))
                    })?;
                debug!("Redis entry {} outlived its absolute deadline, deleted", key);
                Ok(false)
            }
        }
    }
}

fn pool_config(conn_str: &str, pool_size: u32, timeout: Duration) -> PoolConfig {
    let mut pool = deadpool_redis::PoolConfig::new(pool_size as usize);
    pool.timeouts = Timeouts {
        wait: Some(timeout),
        create: Some(timeout),
        recycle: Some(timeout),
    };

    let mut cfg = PoolConfig::from_url(conn_str);
    cfg.pool = Some(pool);
    cfg
}

/// What a read or refresh does to the key TTL.
#[derive(Debug, PartialEq, Eq)]
enum Rearm {
    /// No sliding window; the TTL set on write stands.
    Keep,
    /// Restart the TTL with this window.
    Expire(Duration),
    /// The absolute deadline has passed.
    Expired,
}

fn rearm_plan(absolute: Option<i64>, sliding: Option<i64>, now: i64) -> Rearm {
    let remaining = match absolute.filter(|&ticks| ticks != NOT_PRESENT) {
        Some(deadline) if deadline.saturating_sub(now) < TICKS_PER_MILLI => return Rearm::Expired,
        Some(deadline) => Some(ticks_to_duration(deadline.saturating_sub(now))),
        None => None,
    };

    match sliding.filter(|&ticks| ticks != NOT_PRESENT) {
        Some(window) => EntryOptions::window(Some(ticks_to_duration(window)), remaining)
            .map_or(Rearm::Keep, Rearm::Expire),
        None => Rearm::Keep,
    }
}

fn now_ticks() -> i64 {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    UNIX_EPOCH_TICKS.saturating_add(duration_to_ticks(since_epoch))
}

fn duration_to_ticks(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos() / 100).unwrap_or(i64::MAX)
}

fn ticks_to_duration(ticks: i64) -> Duration {
    if ticks <= 0 {
        return Duration::ZERO;
    }
    let secs = (ticks / TICKS_PER_SECOND) as u64;
    let nanos = (ticks % TICKS_PER_SECOND) as u32 * 100;
    Duration::new(secs, nanos)
}

fn expire_millis(window: Duration) -> i64 {
    i64::try_from(window.as_millis())
        .unwrap_or(i64::MAX)
        .clamp(1, LONGEST_EXPIRE_MILLIS)
}

impl DistributedCache for RedisBackend {
    async fn get(&self, key: &str, cancel: &CancellationToken) -> Result<Option<String>> {
        run_cancellable(cancel, async {
            let mut conn = self.connection().await?;

            let (absolute, sliding, data): (Option<i64>, Option<i64>, Option<String>) =
                cmd("HMGET")
                    .arg(key)
                    .arg(ABSOLUTE_EXPIRATION_FIELD)
                    .arg(SLIDING_EXPIRATION_FIELD)
                    .arg(DATA_FIELD)
                    .query_async(&mut *conn)
                    .await
                    .map_err(|e| {
                        Error::BackendError(format!("Redis HMGET failed for key {}: {}", key, e))
                    })?;

            let live = match data {
                Some(text) => Self::rearm(&mut conn, key, absolute, sliding)
                    .await?
                    .then_some(text),
                None => None,
            };

            match live {
                Some(text) => {
                    debug!("✓ Redis GET {} -> HIT", key);
                    Ok(Some(text))
                }
                None => {
                    debug!("✓ Redis GET {} -> MISS", key);
                    Ok(None)
                }
            }
        })
        .await
    }

    async fn set(
        &self,
        key: &str,
        value: String,
        options: EntryOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        run_cancellable(cancel, async {
            let mut conn = self.connection().await?;

            let absolute = options.absolute_expiration.map_or(NOT_PRESENT, |d| {
                now_ticks()
                    .saturating_add(duration_to_ticks(d))
                    .min(MAX_DEADLINE_TICKS)
            });
            let sliding = options
                .sliding_expiration
                .map_or(NOT_PRESENT, duration_to_ticks);
            let window =
                EntryOptions::window(options.sliding_expiration, options.absolute_expiration);

            let mut pipeline = pipe();
            pipeline
                .atomic()
                .cmd("HSET")
                .arg(key)
                .arg(ABSOLUTE_EXPIRATION_FIELD)
                .arg(absolute)
                .arg(SLIDING_EXPIRATION_FIELD)
                .arg(sliding)
                .arg(DATA_FIELD)
                .arg(value)
                .ignore();

            match window {
                Some(ttl) => pipeline.cmd("PEXPIRE").arg(key).arg(expire_millis(ttl)),
                None => pipeline.cmd("PERSIST").arg(key),
            }
            .ignore();

            pipeline
                .query_async::<()>(&mut *conn)
                .await
                .map_err(|e| {
                    Error::BackendError(format!("Redis HSET failed for key {}: {}", key, e))
                })?;

            debug!("✓ Redis SET {} (window: {:?})", key, window);
            Ok(())
        })
        .await
    }

    async fn refresh(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        run_cancellable(cancel, async {
            let mut conn = self.connection().await?;

            let (absolute, sliding): (Option<i64>, Option<i64>) = cmd("HMGET")
                .arg(key)
                .arg(ABSOLUTE_EXPIRATION_FIELD)
                .arg(SLIDING_EXPIRATION_FIELD)
                .query_async(&mut *conn)
                .await
                .map_err(|e| {
                    Error::BackendError(format!("Redis HMGET failed for key {}: {}", key, e))
                })?;

            Self::rearm(&mut conn, key, absolute, sliding).await?;
            debug!("✓ Redis REFRESH {}", key);
            Ok(())
        })
        .await
    }

    async fn remove(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        run_cancellable(cancel, async {
            let mut conn = self.connection().await?;

            cmd("DEL")
                .arg(key)
                .query_async::<()>(&mut *conn)
                .await
                .map_err(|e| {
                    Error::BackendError(format!("Redis DEL failed for key {}: {}", key, e))
                })?;

            debug!("✓ Redis DELETE {}", key);
            Ok(())
        })
        .await
    }

    async fn health_check(&self, cancel: &CancellationToken) -> Result<bool> {
        run_cancellable(cancel, async {
            let mut conn = self.connection().await?;

            let pong: String = cmd("PING")
                .query_async(&mut *conn)
                .await
                .map_err(|e| Error::BackendError(format!("Redis PING failed: {}", e)))?;

            Ok(pong.contains("PONG"))
        })
        .await
    }
}
