//! # Canonical Serialization — Blob Byte Production
//!
//! `CanonicalBytes` is the only input the blob codec accepts. The settings
//! document is serialized with `serde_jcs` (RFC 8785): sorted keys, compact
//! separators, no whitespace. Two runs over the same logical document
//! therefore produce the same plaintext, and only the rotation offset
//! differs between encoded blobs.
//!
//! Floats are legal here since float settings carry float defaults.
//! `serde_json` already maps non-finite floats to `null`, so the document
//! model never hands one to this module.

use serde::Serialize;

use crate::error::CanonicalizationError;

/// Compact canonical JSON bytes of a settings document.
///
/// The inner buffer is private; [`CanonicalBytes::new`] is the only
/// constructor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Serialize `obj` to canonical bytes.
    ///
    /// # Errors
    ///
    /// `SerializationFailed` if serde cannot represent the value (for
    /// example a map with non-string keys).
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        let s = serde_jcs::to_string(&value)?;
        Ok(Self(s.into_bytes()))
    }

    /// The canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume and return the inner buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::Value;

    proptest! {
        #[test]
        fn canonical_bytes_are_deterministic(
            keys in prop::collection::vec("[A-Za-z]{1,8}", 0..8),
            value in any::<i64>(),
        ) {
            let mut map = serde_json::Map::new();
            for k in &keys {
                map.insert(k.clone(), Value::from(value));
            }
            let mut reversed = serde_json::Map::new();
            for k in keys.iter().rev() {
                reversed.insert(k.clone(), Value::from(value));
            }
            let a = CanonicalBytes::new(&Value::Object(map)).unwrap();
            let b = CanonicalBytes::new(&Value::Object(reversed)).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
