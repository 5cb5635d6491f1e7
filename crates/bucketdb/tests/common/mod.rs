//! Shared helpers for bucketdb integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use bucketdb::{BucketDbError, Database, DeleteOutcome, ObjectStoreAdapter, Result};
use bucketdb_core::types::{ListPage, ListRequest};
use bucketdb_storage::LocalBackend;

pub const BUCKET: &str = "s3-nosql-test";

/// Start a database over a fresh local bucket directory.
pub async fn local_database(tmp: &std::path::Path) -> Database {
    let backend = LocalBackend::new(tmp).await.expect("backend should start");
    Database::new(Arc::new(backend), BUCKET)
}

/// Wraps another adapter, failing reads and writes of keys that contain
/// `poison` and counting calls.
pub struct Instrumented {
    inner: Arc<dyn ObjectStoreAdapter>,
    poison: Option<String>,
    pub lists: AtomicUsize,
    pub deletes: AtomicUsize,
    pub batch_deletes: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl Instrumented {
    pub fn new(inner: Arc<dyn ObjectStoreAdapter>) -> Self {
        Self {
            inner,
            poison: None,
            lists: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            batch_deletes: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn poisoned(inner: Arc<dyn ObjectStoreAdapter>, poison: &str) -> Self {
        Self {
            poison: Some(poison.to_string()),
            ..Self::new(inner)
        }
    }

    fn check(&self, key: &str) -> Result<()> {
        match &self.poison {
            Some(poison) if key.contains(poison.as_str()) => Err(BucketDbError::storage_msg(
                format!("injected failure for {key}"),
            )),
            _ => Ok(()),
        }
    }

    /// Hold a request open across a few scheduler turns so concurrent
    /// requests overlap.
    async fn track<T>(&self, fut: impl std::future::Future<Output = T>) -> T {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        let out = fut.await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        out
    }
}

#[async_trait]
impl ObjectStoreAdapter for Instrumented {
    async fn list(&self, bucket: &str, request: &ListRequest) -> Result<ListPage> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.inner.list(bucket, request).await
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        self.check(key)?;
        self.track(self.inner.get(bucket, key)).await
    }

    async fn put(&self, bucket: &str, key: &str, data: Bytes) -> Result<()> {
        self.check(key)?;
        self.track(self.inner.put(bucket, key, data)).await
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(bucket, key).await
    }

    async fn delete_batch(&self, bucket: &str, keys: &[String]) -> Result<Vec<DeleteOutcome>> {
        self.batch_deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_batch(bucket, keys).await
    }
}
