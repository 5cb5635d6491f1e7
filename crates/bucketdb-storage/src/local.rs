//! Filesystem-backed object store for development and tests.
//!
//! [`LocalBackend`] implements the [`ObjectStoreAdapter`] trait using the
//! local filesystem. Each bucket is a directory under the base directory
//! and each key is a file path relative to its bucket directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, instrument};

use bucketdb_core::error::BucketDbError;
use bucketdb_core::storage::ObjectStoreAdapter;
use bucketdb_core::types::{DeleteOutcome, ListPage, ListRequest, ObjectEntry, PageToken};
use bucketdb_core::{Result, DEFAULT_PAGE_SIZE};

/// An [`ObjectStoreAdapter`] backed by the local filesystem.
///
/// Buckets map to sub-directories of `base_dir`. A bucket directory that
/// does not exist lists as empty; parent directories are created on `put`.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    base_dir: PathBuf,
}

impl LocalBackend {
    /// Create a new `LocalBackend` rooted at the given directory.
    ///
    /// The directory is created if it does not exist.
    pub async fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).await.map_err(|e| {
            BucketDbError::storage(
                format!("Failed to create base directory: {}", base_dir.display()),
                e,
            )
        })?;
        debug!(base_dir = %base_dir.display(), "LocalBackend initialised");
        Ok(Self { base_dir })
    }

    /// Return the base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf> {
        let invalid = bucket.is_empty()
            || bucket == "."
            || bucket == ".."
            || bucket.contains(['/', '\\']);
        if invalid {
            return Err(BucketDbError::invalid_argument(format!(
                "invalid bucket name '{bucket}'"
            )));
        }
        Ok(self.base_dir.join(bucket))
    }

    /// Return the full filesystem path for a key in a bucket.
    fn key_to_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.bucket_dir(bucket)?.join(key))
    }
}

/// Reject keys that would escape the bucket directory or cannot be files.
fn validate_key(key: &str) -> Result<()> {
    let bad_segment = key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if bad_segment || key.contains('\\') {
        return Err(BucketDbError::invalid_argument(format!(
            "key '{key}' is not a valid object key"
        )));
    }
    Ok(())
}

#[async_trait]
impl ObjectStoreAdapter for LocalBackend {
    #[instrument(skip(self, request), fields(bucket = %bucket, prefix = %request.prefix))]
    async fn list(&self, bucket: &str, request: &ListRequest) -> Result<ListPage> {
        let root = self.bucket_dir(bucket)?;
        if request.prefix.split('/').any(|s| s == "." || s == "..") {
            return Err(BucketDbError::invalid_argument(format!(
                "prefix '{}' is not a valid key prefix",
                request.prefix
            )));
        }
        // Only walk the directory the prefix can live in.
        let start = match request.prefix.rfind('/') {
            Some(idx) => root.join(&request.prefix[..idx]),
            None => root.clone(),
        };
        if matches!(fs::metadata(&start).await, Ok(meta) if !meta.is_dir()) {
            return Ok(ListPage::default());
        }

        let after = request.continuation.as_ref().map(PageToken::as_str);
        let mut entries = Vec::new();
        list_recursive(&root, &start, &request.prefix, after, &mut entries).await?;
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        let max_keys = request
            .max_keys
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let next_token = if entries.len() > max_keys {
            entries.truncate(max_keys);
            entries.last().map(|entry| PageToken::new(entry.key.clone()))
        } else {
            None
        };

        debug!(
            "Listed {} entries with prefix '{}' in {}",
            entries.len(),
            request.prefix,
            bucket
        );
        Ok(ListPage {
            entries,
            next_token,
        })
    }

    #[instrument(skip(self), fields(bucket = %bucket, key = %key))]
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let path = self.key_to_path(bucket, key)?;
        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BucketDbError::NotFound {
                    key: key.to_string(),
                }
            } else {
                BucketDbError::storage(format!("Failed to read {}", path.display()), e)
            }
        })?;
        debug!("Get {} bytes from {}", data.len(), key);
        Ok(Bytes::from(data))
    }

    #[instrument(skip(self, data), fields(bucket = %bucket, key = %key, size = data.len()))]
    async fn put(&self, bucket: &str, key: &str, data: Bytes) -> Result<()> {
        let path = self.key_to_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                BucketDbError::storage(
                    format!(
                        "Failed to create parent directories for {}",
                        path.display()
                    ),
                    e,
                )
            })?;
        }
        fs::write(&path, &data).await.map_err(|e| {
            BucketDbError::storage(format!("Failed to write {}", path.display()), e)
        })?;
        debug!("Put {} bytes to {}", data.len(), key);
        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %bucket, key = %key))]
    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let path = self.key_to_path(bucket, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Delete {}: already absent", key);
                Ok(())
            }
            Err(e) => Err(BucketDbError::storage(
                format!("Failed to delete {}", path.display()),
                e,
            )),
        }
    }

    #[instrument(skip(self, keys), fields(bucket = %bucket, count = keys.len()))]
    async fn delete_batch(&self, bucket: &str, keys: &[String]) -> Result<Vec<DeleteOutcome>> {
        // The filesystem has no multi-delete; report each key on its own.
        let mut outcomes = Vec::with_capacity(keys.len());
        for key in keys {
            let outcome = match self.delete(bucket, key).await {
                Ok(()) => DeleteOutcome::deleted(key.clone()),
                Err(e) => DeleteOutcome::failed(key.clone(), e.to_string()),
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

/// Recursively list the files under `dir` whose keys start with `prefix`
/// and sort after `after`, producing keys relative to `root`.
///
/// Directories that cannot hold a matching key are not descended into, and
/// only files that survive the key filters are stat'ed.
async fn list_recursive(
    root: &Path,
    dir: &Path,
    prefix: &str,
    after: Option<&str>,
    results: &mut Vec<ObjectEntry>,
) -> Result<()> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(BucketDbError::storage(
                format!("Failed to read directory {}", dir.display()),
                e,
            ))
        }
    };

    while let Some(entry) = entries.next_entry().await.map_err(|e| {
        BucketDbError::storage(
            format!("Failed to read directory entry in {}", dir.display()),
            e,
        )
    })? {
        let path = entry.path();
        let file_type = entry.file_type().await.map_err(|e| {
            BucketDbError::storage(format!("Failed to stat {}", path.display()), e)
        })?;
        let key = relative_key(root, &path)?;

        if file_type.is_dir() {
            let dir_key = format!("{key}/");
            if may_hold_keys(&dir_key, prefix, after) {
                Box::pin(list_recursive(root, &path, prefix, after, results)).await?;
            }
            continue;
        }

        if !key.starts_with(prefix) || after.is_some_and(|token| key.as_str() <= token) {
            continue;
        }
        let metadata = entry.metadata().await.map_err(|e| {
            BucketDbError::storage(format!("Failed to stat {}", path.display()), e)
        })?;
        results.push(ObjectEntry {
            key,
            size: metadata.len(),
            last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            e_tag: None,
        });
    }

    Ok(())
}

/// Key of `path` relative to the bucket directory, with `/` separators.
fn relative_key(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|e| BucketDbError::Internal {
            message: format!("Path prefix strip failed: {e}"),
        })?;
    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/"))
}

/// Whether a directory whose keys all start with `dir_key` can contain a
/// key matching `prefix` that sorts after `after`.
fn may_hold_keys(dir_key: &str, prefix: &str, after: Option<&str>) -> bool {
    let overlaps = dir_key.starts_with(prefix) || prefix.starts_with(dir_key);
    // Every key under the directory sorts below a larger token that does
    // not share the directory's key prefix.
    let passed = after.is_some_and(|token| token > dir_key && !token.starts_with(dir_key));
    overlaps && !passed
}
