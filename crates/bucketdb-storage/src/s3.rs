//! S3-compatible object storage backend.
//!
//! [`S3Backend`] implements the [`ObjectStoreAdapter`] trait using the
//! `object_store` crate, supporting any S3-compatible endpoint: AWS S3,
//! MinIO, Ceph, etc. One client is built per bucket on first use and
//! cached for the lifetime of the backend.
//!
//! Pagination uses `list_with_offset`, so the continuation token is the
//! last key of the previous page. This relies on the store listing keys in
//! lexicographic order, which S3 and the in-memory store both guarantee.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use bucketdb_core::error::BucketDbError;
use bucketdb_core::storage::ObjectStoreAdapter;
use bucketdb_core::types::{DeleteOutcome, ListPage, ListRequest, ObjectEntry, PageToken};
use bucketdb_core::{Result, DEFAULT_PAGE_SIZE};

/// Connection settings shared by every bucket client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct S3Options {
    /// AWS region; falls back to `AWS_REGION` / `AWS_DEFAULT_REGION`.
    pub region: Option<String>,

    /// Custom endpoint for MinIO and other S3-compatible services.
    pub endpoint: Option<String>,

    /// Allow plain-HTTP endpoints.
    pub allow_http: bool,
}

impl S3Options {
    /// Parse options from an S3 storage URI.
    ///
    /// # URI Format
    ///
    /// `s3://?region=us-east-1&endpoint=http://minio:9000`
    ///
    /// The bucket is not part of the URI; it belongs to the database.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let stripped = uri
            .strip_prefix("s3://")
            .ok_or_else(|| BucketDbError::Config {
                message: format!("S3 URI must start with 's3://': {uri}"),
            })?;

        let authority = stripped.split('?').next().unwrap_or(stripped);
        if !authority.trim_matches('/').is_empty() {
            return Err(BucketDbError::Config {
                message: format!(
                    "S3 URI must not name a bucket, configure it on the database instead: {uri}"
                ),
            });
        }

        let endpoint = extract_query_param(uri, "endpoint");
        let allow_http = match extract_query_param(uri, "allow_http") {
            Some(value) => value == "true",
            None => endpoint
                .as_deref()
                .is_some_and(|e| e.starts_with("http://")),
        };

        Ok(Self {
            region: extract_query_param(uri, "region"),
            endpoint,
            allow_http,
        })
    }
}

#[derive(Debug, Clone)]
enum StoreKind {
    S3(S3Options),
    InMemory,
}

impl StoreKind {
    fn build(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        match self {
            StoreKind::S3(options) => {
                let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
                if let Some(region) = &options.region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = &options.endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                if options.allow_http {
                    builder = builder.with_allow_http(true);
                }
                let store = builder.build().map_err(|e| {
                    BucketDbError::storage(format!("Failed to create S3 client for {bucket}"), e)
                })?;
                Ok(Arc::new(store))
            }
            StoreKind::InMemory => Ok(Arc::new(InMemory::new())),
        }
    }
}

/// An [`ObjectStoreAdapter`] backed by S3-compatible object storage.
///
/// Credentials are read from the standard `AWS_*` environment variables.
/// Uses the `object_store` crate for S3 operations with built-in
/// retry logic and connection pooling.
pub struct S3Backend {
    kind: StoreKind,
    stores: RwLock<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl S3Backend {
    /// Create a backend talking to S3 with the given options.
    pub fn new(options: S3Options) -> Self {
        debug!(region = ?options.region, endpoint = ?options.endpoint, "S3Backend initialised");
        Self {
            kind: StoreKind::S3(options),
            stores: RwLock::new(HashMap::new()),
        }
    }

    /// Create a backend from an `s3://` storage URI.
    pub fn from_uri(uri: &str) -> Result<Self> {
        Ok(Self::new(S3Options::from_uri(uri)?))
    }

    /// Create a backend where every bucket is an empty in-memory store.
    pub fn in_memory() -> Self {
        Self {
            kind: StoreKind::InMemory,
            stores: RwLock::new(HashMap::new()),
        }
    }

    /// Return the client for `bucket`, building it on first use.
    async fn store_for(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        if bucket.is_empty() {
            return Err(BucketDbError::invalid_argument("bucket name must not be empty"));
        }
        if let Some(store) = self.stores.read().await.get(bucket) {
            return Ok(Arc::clone(store));
        }

        let mut stores = self.stores.write().await;
        if let Some(store) = stores.get(bucket) {
            return Ok(Arc::clone(store));
        }
        let store = self.kind.build(bucket)?;
        stores.insert(bucket.to_string(), Arc::clone(&store));
        debug!(bucket = %bucket, "Created object store client");
        Ok(store)
    }
}

#[async_trait]
impl ObjectStoreAdapter for S3Backend {
    #[instrument(skip(self, request), fields(bucket = %bucket, prefix = %request.prefix))]
    async fn list(&self, bucket: &str, request: &ListRequest) -> Result<ListPage> {
        let store = self.store_for(bucket).await?;
        let max_keys = request
            .max_keys
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);

        // object_store prefixes match whole path segments, so list the
        // enclosing directory and filter on the raw string prefix.
        let parent = match request.prefix.rfind('/') {
            Some(idx) => Some(object_path(&request.prefix[..idx])?),
            None => None,
        };

        let mut stream = match &request.continuation {
            Some(token) => {
                let offset = object_path(token.as_str())?;
                store.list_with_offset(parent.as_ref(), &offset)
            }
            None => store.list(parent.as_ref()),
        };

        let mut entries = Vec::new();
        let mut more = false;
        while let Some(meta) = stream.try_next().await.map_err(|e| {
            BucketDbError::storage(
                format!("S3 list failed for prefix {}", request.prefix),
                e,
            )
        })? {
            let key = meta.location.to_string();
            if !key.starts_with(&request.prefix) {
                // Keys under the prefix are contiguous in listing order.
                if key.as_str() > request.prefix.as_str() {
                    break;
                }
                continue;
            }
            if entries.len() == max_keys {
                more = true;
                break;
            }
            entries.push(ObjectEntry {
                key,
                size: meta.size as u64,
                last_modified: Some(meta.last_modified),
                e_tag: meta.e_tag,
            });
        }

        let next_token = if more {
            entries
                .last()
                .map(|entry| PageToken::new(entry.key.clone()))
        } else {
            None
        };
        debug!(count = entries.len(), more, "S3 list page");
        Ok(ListPage {
            entries,
            next_token,
        })
    }

    #[instrument(skip(self), fields(bucket = %bucket, key = %key))]
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let store = self.store_for(bucket).await?;
        let path = object_path(key)?;
        let result = store.get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => BucketDbError::NotFound {
                key: key.to_string(),
            },
            other => BucketDbError::storage(format!("S3 get failed for {key}"), other),
        })?;
        let bytes = result
            .bytes()
            .await
            .map_err(|e| BucketDbError::storage(format!("S3 get bytes failed for {key}"), e))?;
        Ok(bytes)
    }

    #[instrument(skip(self, data), fields(bucket = %bucket, key = %key, size = data.len()))]
    async fn put(&self, bucket: &str, key: &str, data: Bytes) -> Result<()> {
        let store = self.store_for(bucket).await?;
        let path = object_path(key)?;
        store
            .put(&path, PutPayload::from(data))
            .await
            .map_err(|e| BucketDbError::storage(format!("S3 put failed for {key}"), e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %bucket, key = %key))]
    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let store = self.store_for(bucket).await?;
        let path = object_path(key)?;
        // S3 delete is idempotent, it does not error if the key is missing
        match store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(BucketDbError::storage(
                format!("S3 delete failed for {key}"),
                e,
            )),
        }
    }

    #[instrument(skip(self, keys), fields(bucket = %bucket, count = keys.len()))]
    async fn delete_batch(&self, bucket: &str, keys: &[String]) -> Result<Vec<DeleteOutcome>> {
        let store = self.store_for(bucket).await?;
        let paths: Vec<Result<ObjectPath>> = keys.iter().map(|k| object_path(k)).collect();
        let valid: Vec<ObjectPath> = paths
            .iter()
            .filter_map(|p| p.as_ref().ok())
            .cloned()
            .collect();
        let locations = futures::stream::iter(valid.into_iter().map(Ok)).boxed();

        let mut deleted = HashSet::new();
        let mut errors = Vec::new();
        let mut results = store.delete_stream(locations);
        while let Some(result) = results.next().await {
            match result {
                Ok(path) => {
                    deleted.insert(path.to_string());
                }
                Err(object_store::Error::NotFound { path, .. }) => {
                    deleted.insert(path);
                }
                Err(e) => errors.push(e.to_string()),
            }
        }

        let outcomes = keys
            .iter()
            .zip(paths.iter())
            .map(|(key, path)| {
                let path: &str = match path {
                    Ok(path) => path.as_ref(),
                    Err(e) => return DeleteOutcome::failed(key.clone(), e.to_string()),
                };
                if deleted.contains(path) {
                    return DeleteOutcome::deleted(key.clone());
                }
                let message = errors
                    .iter()
                    .find(|e| e.contains(path))
                    .cloned()
                    .unwrap_or_else(|| {
                        if errors.is_empty() {
                            "delete was not confirmed by the store".to_string()
                        } else {
                            errors.join("; ")
                        }
                    });
                DeleteOutcome::failed(key.clone(), message)
            })
            .collect();
        Ok(outcomes)
    }
}

/// Map a key to the object path whose text is exactly that key.
///
/// `Path::from` percent-encodes reserved characters and drops empty
/// segments, which would make listed keys differ from the keys written.
fn object_path(key: &str) -> Result<ObjectPath> {
    let invalid = |reason: String| {
        BucketDbError::invalid_argument(format!("key '{key}' is not a valid object key: {reason}"))
    };
    if key.is_empty() {
        return Err(invalid("empty key".to_string()));
    }
    let path = ObjectPath::parse(key).map_err(|e| invalid(e.to_string()))?;
    let text: &str = path.as_ref();
    if text != key {
        return Err(invalid("leading or trailing '/'".to_string()));
    }
    Ok(path)
}

/// Extract a query parameter value from a URI.
fn extract_query_param(uri: &str, param: &str) -> Option<String> {
    let query = uri.split('?').nth(1)?;
    for pair in query.split('&') {
        let mut kv = pair.splitn(2, '=');
        if kv.next()? == param {
            return kv.next().map(|v| v.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUCKET: &str = "s3-nosql-test";

    fn list_request(prefix: &str, max_keys: Option<usize>, token: Option<PageToken>) -> ListRequest {
        ListRequest {
            prefix: prefix.to_string(),
            max_keys,
            continuation: token,
        }
    }

    #[test]
    fn test_options_from_bare_uri() {
        let options = S3Options::from_uri("s3://").unwrap();
        assert_eq!(options, S3Options::default());
    }

    #[test]
    fn test_options_with_query() {
        let options =
            S3Options::from_uri("s3://?region=eu-west-1&endpoint=http://minio:9000").unwrap();
        assert_eq!(options.region.as_deref(), Some("eu-west-1"));
        assert_eq!(options.endpoint.as_deref(), Some("http://minio:9000"));
        assert!(options.allow_http);
    }

    #[test]
    fn test_options_reject_bucket_in_uri() {
        assert!(S3Options::from_uri("s3://my-bucket/prefix").is_err());
        assert!(S3Options::from_uri("http://example.com").is_err());
    }

    #[test]
    fn test_extract_query_param() {
        assert_eq!(
            extract_query_param("s3://?region=us-east-1", "region"),
            Some("us-east-1".to_string())
        );
        assert_eq!(extract_query_param("s3://?region=us-east-1", "missing"), None);
        assert_eq!(extract_query_param("s3://", "region"), None);
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let backend = S3Backend::in_memory();
        backend
            .put(BUCKET, "tests/1.json", Bytes::from("{\"a\":1}"))
            .await
            .unwrap();
        let data = backend.get(BUCKET, "tests/1.json").await.unwrap();
        assert_eq!(data, Bytes::from("{\"a\":1}"));
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let backend = S3Backend::in_memory();
        let result = backend.get(BUCKET, "missing.json").await;
        assert!(matches!(result, Err(BucketDbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_buckets_are_isolated() {
        let backend = S3Backend::in_memory();
        backend.put("one", "k.json", Bytes::from("1")).await.unwrap();
        assert!(backend.get("two", "k.json").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_paginates_with_offset() {
        let backend = S3Backend::in_memory();
        for i in 0..5 {
            backend
                .put(BUCKET, &format!("t/{i}.json"), Bytes::from("x"))
                .await
                .unwrap();
        }
        backend.put(BUCKET, "u/0.json", Bytes::from("x")).await.unwrap();

        let mut seen = Vec::new();
        let mut token = None;
        let mut pages = 0;
        loop {
            let page = backend
                .list(BUCKET, &list_request("t/", Some(2), token))
                .await
                .unwrap();
            pages += 1;
            seen.extend(page.entries.into_iter().map(|e| e.key));
            token = page.next_token;
            if token.is_none() {
                break;
            }
        }
        assert_eq!(pages, 3);
        assert_eq!(
            seen,
            vec!["t/0.json", "t/1.json", "t/2.json", "t/3.json", "t/4.json"]
        );
    }

    #[tokio::test]
    async fn test_list_partial_segment_prefix() {
        let backend = S3Backend::in_memory();
        backend.put(BUCKET, "logs/app-1", Bytes::from("1")).await.unwrap();
        backend.put(BUCKET, "logs/db-1", Bytes::from("1")).await.unwrap();

        let page = backend
            .list(BUCKET, &list_request("logs/app", None, None))
            .await
            .unwrap();
        let keys: Vec<_> = page.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["logs/app-1"]);
        assert_eq!(page.entries[0].size, 1);
        assert!(page.entries[0].last_modified.is_some());
    }

    #[tokio::test]
    async fn test_listed_keys_match_written_keys() {
        let backend = S3Backend::in_memory();
        let written = ["t/a b.json", "t/a%20b.json", "t/a~1", "t/a~2", "t/odd #[x]"];
        for key in written {
            backend.put(BUCKET, key, Bytes::from("x")).await.unwrap();
        }

        let mut seen = Vec::new();
        let mut token = None;
        loop {
            let page = backend
                .list(BUCKET, &list_request("t/", Some(1), token))
                .await
                .unwrap();
            assert!(page.entries.len() <= 1);
            seen.extend(page.entries.into_iter().map(|e| e.key));
            token = page.next_token;
            if token.is_none() {
                break;
            }
        }
        let mut expected: Vec<_> = written.iter().map(|k| k.to_string()).collect();
        expected.sort();
        assert_eq!(seen, expected);

        for key in &seen {
            assert_eq!(backend.get(BUCKET, key).await.unwrap(), Bytes::from("x"));
        }
    }

    #[tokio::test]
    async fn test_prefix_with_reserved_characters() {
        let backend = S3Backend::in_memory();
        backend.put(BUCKET, "we~ird/1", Bytes::from("1")).await.unwrap();
        backend.put(BUCKET, "weird/1", Bytes::from("1")).await.unwrap();

        let page = backend
            .list(BUCKET, &list_request("we~ird/", None, None))
            .await
            .unwrap();
        let keys: Vec<_> = page.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["we~ird/1"]);
    }

    #[tokio::test]
    async fn test_rejects_keys_that_would_be_rewritten() {
        let backend = S3Backend::in_memory();
        for key in ["", "/lead", "trail/", "a//b", "a/../b"] {
            let result = backend.put(BUCKET, key, Bytes::from("x")).await;
            assert!(
                matches!(result, Err(BucketDbError::InvalidArgument { .. })),
                "key {key:?} should be rejected"
            );
        }
        assert_eq!(object_path("a~b c").unwrap().to_string(), "a~b c");
    }

    #[tokio::test]
    async fn test_delete_batch_reports_invalid_keys() {
        let backend = S3Backend::in_memory();
        backend.put(BUCKET, "t/a~1", Bytes::from("x")).await.unwrap();
        let keys = vec!["t/a~1".to_string(), "t//bad".to_string()];
        let outcomes = backend.delete_batch(BUCKET, &keys).await.unwrap();
        assert!(outcomes[0].is_deleted());
        assert!(!outcomes[1].is_deleted());
        assert!(backend.get(BUCKET, "t/a~1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let backend = S3Backend::in_memory();
        backend.delete(BUCKET, "never-written").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_batch() {
        let backend = S3Backend::in_memory();
        for key in ["t/a", "t/b", "t/c"] {
            backend.put(BUCKET, key, Bytes::from("x")).await.unwrap();
        }
        let keys: Vec<String> = ["t/a", "t/b"].iter().map(|k| k.to_string()).collect();
        let outcomes = backend.delete_batch(BUCKET, &keys).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(DeleteOutcome::is_deleted));

        let page = backend
            .list(BUCKET, &list_request("t/", None, None))
            .await
            .unwrap();
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].key, "t/c");
    }
}
