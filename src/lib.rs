//! # distcache
//!
//! Typed caching helpers over a distributed key/value cache.
//!
//! ## Features
//!
//! - **Four operations:** `get`, `set`, `remove`, `get_or_create`
//! - **JSON entries:** Values are stored as JSON text, with null fields omitted on write
//! - **Sliding expiration:** Every read restarts an entry's TTL window in the backing store
//! - **Backend Agnostic:** In-memory (default) and Redis backends, or bring your own
//! - **Cancellable:** Every call takes a `CancellationToken` that backends honour
//!
//! ## Quick Start
//!
//! ```ignore
//! use distcache::{CacheService, backend::InMemoryBackend};
//! use serde::{Deserialize, Serialize};
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//!     note: Option<String>,
//! }
//!
//! // Construct once, clone everywhere (cheap - just Arc increment)
//! let cache = CacheService::new(InMemoryBackend::new());
//! let cancel = CancellationToken::new();
//!
//! cache.set("user:42", user, 10, &cancel).await?;
//! let user: Option<User> = cache.get("user:42", &cancel).await?;
//!
//! let user = cache
//!     .get_or_create(10, "user:43", |_| async { repo.find(43).await }, &cancel)
//!     .await?;
//!
//! cache.remove("user:42", &cancel).await?;
//! ```
//!
//! A stored empty or whitespace-only string reads back as a miss, and `set` refuses
//! values that serialize to JSON `null`, so `Ok(None)` from `get` always means
//! "nothing usable cached".

#[macro_use]
extern crate log;

pub mod adapter;
pub mod backend;
pub mod error;
pub mod key;
pub mod observability;
pub mod serialization;
pub mod service;

// Re-exports for convenience
pub use adapter::CacheAdapter;
pub use backend::{DistributedCache, EntryOptions};
pub use error::{Error, Result};
pub use key::CacheKeyBuilder;
pub use serialization::JsonCodec;
pub use service::CacheService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
