//! The database: a bucket handle that mints tables.
//!
//! [`Database`] holds the object store adapter and the bucket name. It
//! performs no I/O of its own: every read and write goes through the
//! [`Table`]s it creates.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use bucketdb_core::config::{DatabaseConfig, DEFAULT_MAX_CONCURRENCY};
use bucketdb_core::storage::ObjectStoreAdapter;
use bucketdb_core::types::{BucketName, PageSize};
use bucketdb_core::Result;

use crate::table::Table;

/// A bucket of tables.
///
/// Cloning is cheap; clones share the same adapter.
#[derive(Clone)]
pub struct Database {
    storage: Arc<dyn ObjectStoreAdapter>,
    bucket: BucketName,
    page_size: PageSize,
    max_concurrency: usize,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("bucket", &self.bucket)
            .field("page_size", &self.page_size)
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Create a database over `bucket` with default tuning.
    pub fn new(storage: Arc<dyn ObjectStoreAdapter>, bucket: impl Into<BucketName>) -> Self {
        Self {
            storage,
            bucket: bucket.into(),
            page_size: PageSize::DEFAULT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Create a database over an existing adapter using `config` for the
    /// bucket and tuning. `config.storage_uri` is ignored.
    pub fn with_config(
        storage: Arc<dyn ObjectStoreAdapter>,
        config: &DatabaseConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            storage,
            bucket: config.bucket.clone(),
            page_size: config.page_size,
            max_concurrency: config.max_concurrency,
        })
    }

    /// Open the adapter named by `config.storage_uri` and wrap it.
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        config.validate()?;
        let storage = bucketdb_storage::open(&config.storage_uri).await?;
        info!(
            storage_uri = %config.storage_uri,
            bucket = %config.bucket,
            page_size = config.page_size.effective(),
            max_concurrency = config.max_concurrency,
            "Database opened"
        );
        Self::with_config(storage, config)
    }

    /// Return a table rooted at `prefix`.
    ///
    /// The prefix is normalised, so `"a//b/"` and `"a/b"` name the same
    /// table.
    pub fn table(&self, prefix: &str) -> Table {
        Table::new(
            Arc::clone(&self.storage),
            self.bucket.clone(),
            prefix,
            self.page_size,
            self.max_concurrency,
        )
    }

    /// The bucket backing this database.
    pub fn bucket(&self) -> &BucketName {
        &self.bucket
    }

    /// The shared object store adapter.
    pub fn storage(&self) -> &Arc<dyn ObjectStoreAdapter> {
        &self.storage
    }
}
