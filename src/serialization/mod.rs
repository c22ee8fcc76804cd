//! JSON text codec for cache entries.
//!
//! Cache entries are plain JSON text so any client sharing the backing store can read
//! them. The codec has one construction-time knob: whether fields holding `null` are
//! dropped when writing. Dropped fields come back as `None` on read, because serde
//! treats a missing `Option` field as absent rather than as an error.
//!
//! # Example
//!
//! ```rust
//! use distcache::serialization::JsonCodec;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct User {
//!     id: u64,
//!     name: String,
//!     note: Option<String>,
//! }
//!
//! # fn main() -> distcache::Result<()> {
//! let codec = JsonCodec::new();
//! let user = User { id: 42, name: "Ada".to_string(), note: None };
//!
//! let text = codec.encode(&user)?;
//! assert_eq!(text, r#"{"id":42,"name":"Ada"}"#);
//!
//! let decoded: User = codec.decode(&text)?;
//! assert_eq!(user, decoded);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Encodes values to JSON text and decodes them back.
///
/// Values pass through a `serde_json::Value` tree so nulls can be stripped; numbers are
/// kept as written (`arbitrary_precision`), so 128-bit integers survive the trip.
/// Object keys are emitted in sorted order. Null elements inside arrays are kept even
/// when null fields are omitted, since dropping them would shift positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JsonCodec {
    omit_null_fields: bool,
}

impl JsonCodec {
    /// Codec that omits null fields on write.
    pub fn new() -> Self {
        JsonCodec {
            omit_null_fields: true,
        }
    }

    /// Choose whether null-valued object fields are dropped on write.
    pub fn omit_null_fields(mut self, omit: bool) -> Self {
        self.omit_null_fields = omit;
        self
    }

    /// Whether null-valued object fields are dropped on write.
    pub fn omits_null_fields(&self) -> bool {
        self.omit_null_fields
    }

    /// Convert a value to its JSON tree, applying null-field omission.
    ///
    /// # Errors
    ///
    /// Returns `Error::SerializationError` if the value cannot be represented as JSON
    /// (for example a map with non-string keys).
    pub fn to_tree<T: Serialize + ?Sized>(&self, value: &T) -> Result<Value> {
        let mut tree = serde_json::to_value(value).map_err(|e| {
            error!("Cache serialization failed: {}", e);
            Error::SerializationError(e.to_string())
        })?;

        if self.omit_null_fields {
            strip_null_fields(&mut tree);
        }

        Ok(tree)
    }

    /// Encode a value to JSON text.
    ///
    /// # Errors
    ///
    /// Returns `Error::SerializationError` if encoding fails.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        self.to_tree(value).map(|tree| tree.to_string())
    }

    /// Decode JSON text into `T`.
    ///
    /// # Errors
    ///
    /// Returns `Error::SerializationError` if the text is malformed or does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T> {
        serde_json::from_str(text).map_err(|e| {
            warn!("Cache deserialization failed: {}", e);
            Error::SerializationError(e.to_string())
        })
    }
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_null_fields(value: &mut Value) {
    match value {
        Value::Object(fields) => {
            fields.retain(|_, field| !field.is_null());
            fields.values_mut().for_each(strip_null_fields);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_null_fields),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
    struct Profile {
        id: u64,
        name: String,
        note: Option<String>,
        address: Option<Address>,
    }

    #[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
    struct Address {
        city: String,
        zip: Option<String>,
    }

    #[test]
    fn test_omits_null_fields_by_default() {
        let profile = Profile {
            id: 42,
            name: "Ada".to_string(),
            note: None,
            address: None,
        };

        let text = JsonCodec::new().encode(&profile).unwrap();
        assert_eq!(text, r#"{"id":42,"name":"Ada"}"#);
    }

    #[test]
    fn test_keeps_null_fields_when_disabled() {
        let profile = Profile {
            id: 42,
            name: "Ada".to_string(),
            note: None,
            address: None,
        };

        let codec = JsonCodec::new().omit_null_fields(false);
        let text = codec.encode(&profile).unwrap();
        assert!(text.contains(r#""note":null"#));
        assert!(text.contains(r#""address":null"#));
        assert!(!codec.omits_null_fields());
    }

    #[test]
    fn test_nested_null_fields_omitted() {
        let profile = Profile {
            id: 1,
            name: "Grace".to_string(),
            note: Some("admiral".to_string()),
            address: Some(Address {
                city: "Arlington".to_string(),
                zip: None,
            }),
        };

        let codec = JsonCodec::new();
        let text = codec.encode(&profile).unwrap();
        assert!(!text.contains("zip"));

        let decoded: Profile = codec.decode(&text).unwrap();
        assert_eq!(decoded, profile);
    }

    #[test]
    fn test_null_array_elements_kept() {
        let values = vec![Some(1), None, Some(3)];
        let text = JsonCodec::new().encode(&values).unwrap();
        assert_eq!(text, "[1,null,3]");
    }

    #[test]
    fn test_null_value_encodes_to_null_tree() {
        let tree = JsonCodec::new().to_tree(&None::<Profile>).unwrap();
        assert!(tree.is_null());
    }

    #[test]
    fn test_wide_integers_roundtrip() {
        let codec = JsonCodec::new();

        let text = codec.encode(&u128::MAX).unwrap();
        assert_eq!(text, u128::MAX.to_string());
        assert_eq!(codec.decode::<u128>(&text).unwrap(), u128::MAX);

        let text = codec.encode(&vec![i128::MIN]).unwrap();
        assert_eq!(codec.decode::<Vec<i128>>(&text).unwrap(), vec![i128::MIN]);
    }

    #[test]
    fn test_malformed_text_rejected() {
        let result: Result<Profile> = JsonCodec::new().decode("{\"id\": 42,");
        match result.unwrap_err() {
            Error::SerializationError(_) => {}
            e => panic!("Expected SerializationError, got {:?}", e),
        }
    }

    #[test]
    fn test_wrong_shape_rejected() {
        let result: Result<Profile> = JsonCodec::new().decode(r#"{"id":"not a number"}"#);
        assert!(matches!(result, Err(Error::SerializationError(_))));
    }

    #[test]
    fn test_non_string_map_keys_rejected() {
        let mut map = HashMap::new();
        map.insert((1, 2), "pair");

        let result = JsonCodec::new().encode(&map);
        assert!(matches!(result, Err(Error::SerializationError(_))));
    }
}
