//! The ObjectStoreAdapter trait, the single interface to object storage.
//!
//! Every byte bucketdb reads or writes goes through this trait.
//! Implementations include `LocalBackend` (filesystem) and `S3Backend`
//! (any S3-compatible endpoint) in the `bucketdb-storage` crate. Table
//! code never talks to a store directly.

use async_trait::async_trait;
use bytes::Bytes;

use crate::types::{DeleteOutcome, ListPage, ListRequest};
use crate::Result;

/// Raw object operations against a named bucket.
///
/// Keys passed here are bucket-absolute. Implementations must be
/// `Send + Sync` so one adapter can serve many tables and tasks.
///
/// No operation retries; a transient failure surfaces immediately.
#[async_trait]
pub trait ObjectStoreAdapter: Send + Sync {
    /// List one page of entries under `request.prefix`, in ascending key
    /// order, starting after `request.continuation` when present.
    async fn list(&self, bucket: &str, request: &ListRequest) -> Result<ListPage>;

    /// Read an object. Returns [`BucketDbError::NotFound`](crate::BucketDbError::NotFound)
    /// if the key does not exist.
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes>;

    /// Write an object. Overwrites if it already exists.
    async fn put(&self, bucket: &str, key: &str, data: Bytes) -> Result<()>;

    /// Delete an object. Does not error if the key does not exist.
    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;

    /// Delete many objects in one request.
    ///
    /// Returns one outcome per requested key, in request order. An `Err`
    /// means the request as a whole failed.
    async fn delete_batch(&self, bucket: &str, keys: &[String]) -> Result<Vec<DeleteOutcome>>;
}
