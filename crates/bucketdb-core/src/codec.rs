//! Record codec: values are stored as UTF-8 JSON text.
//!
//! An empty payload decodes to `None`, so a zero-byte object reads the
//! same as a missing one.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::BucketDbError;
use crate::Result;

/// Serialise `value` for storage under `key`.
pub fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|source| BucketDbError::Encode {
            key: key.to_string(),
            source,
        })
}

/// Parse a stored payload read from `key`.
pub fn decode<T: DeserializeOwned>(key: &str, payload: &[u8]) -> Result<Option<T>> {
    if payload.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(payload)
        .map(Some)
        .map_err(|source| BucketDbError::Decode {
            key: key.to_string(),
            source,
        })
}
