//! Cache key validation and construction helpers.

use crate::error::{Error, Result};
use std::fmt::Display;

/// Builder for cache keys.
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// Check that a key can be used for a cache lookup.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` if the key is empty.
    pub fn validate(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(Error::InvalidArgument(
                "cache key must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Build cache key with a prefix, e.g. `user:42`.
    pub fn build_with_prefix(prefix: &str, id: &dyn Display) -> String {
        format!("{}:{}", prefix, id)
    }

    /// Build composite key from multiple parts.
    pub fn build_composite(parts: &[&str]) -> String {
        parts.join(":")
    }

    /// Parse a composite key into parts.
    pub fn parse(key: &str) -> Vec<&str> {
        key.split(':').collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty() {
        let err = CacheKeyBuilder::validate("").unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_validate_accepts_whitespace() {
        assert!(CacheKeyBuilder::validate(" ").is_ok());
        assert!(CacheKeyBuilder::validate("user:42").is_ok());
    }

    #[test]
    fn test_cache_key_builder_prefix() {
        let key = CacheKeyBuilder::build_with_prefix("user", &42);
        assert_eq!(key, "user:42");
    }

    #[test]
    fn test_composite_key_roundtrip() {
        let key = CacheKeyBuilder::build_composite(&["user", "123", "profile"]);
        assert_eq!(key, "user:123:profile");
        assert_eq!(CacheKeyBuilder::parse(&key), vec!["user", "123", "profile"]);
    }
}
