//! Single-record operations on bucket-absolute keys.

use serde::de::DeserializeOwned;
use serde::Serialize;

use bucketdb_core::codec;
use bucketdb_core::storage::ObjectStoreAdapter;
use bucketdb_core::Result;

/// Read and decode the value at `key`.
///
/// A missing object and an empty payload both yield `Ok(None)`.
pub async fn fetch_one<T: DeserializeOwned>(
    storage: &dyn ObjectStoreAdapter,
    bucket: &str,
    key: &str,
) -> Result<Option<T>> {
    match storage.get(bucket, key).await {
        Ok(payload) => codec::decode(key, &payload),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Encode `value` and write it to `key`, replacing any previous value.
pub async fn save_one<T: Serialize + ?Sized>(
    storage: &dyn ObjectStoreAdapter,
    bucket: &str,
    key: &str,
    value: &T,
) -> Result<()> {
    let payload = codec::encode(key, value)?;
    storage.put(bucket, key, payload).await
}

/// Delete the object at `key`; deleting a missing key succeeds.
pub async fn delete_one(storage: &dyn ObjectStoreAdapter, bucket: &str, key: &str) -> Result<()> {
    storage.delete(bucket, key).await
}
