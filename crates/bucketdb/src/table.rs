//! Tables: prefix-scoped views over a bucket.
//!
//! A [`Table`] owns a normalised key prefix. Every key a caller passes in
//! is relative to that prefix and every key handed back has the prefix
//! stripped; the object store only ever sees `prefix + key`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::stream::{self, Stream, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use bucketdb_core::error::BucketDbError;
use bucketdb_core::storage::ObjectStoreAdapter;
use bucketdb_core::types::{BucketName, DeleteOutcome, ObjectEntry, PageSize, PageToken};
use bucketdb_core::Result;

use crate::bulk::{self, ContentPage, FetchResult};
use crate::record;
use crate::scan::{self, ScanPage, ScanRequest};

/// Normalise a table prefix.
///
/// Empty segments are dropped and every remaining segment is followed by
/// exactly one `/`, so the result is either empty or ends with a single
/// `/` and never contains `//`.
///
/// ```
/// use bucketdb::table::normalize_prefix;
///
/// assert_eq!(normalize_prefix("a//b/"), "a/b/");
/// assert_eq!(normalize_prefix("a/b"), "a/b/");
/// assert_eq!(normalize_prefix("/"), "");
/// ```
pub fn normalize_prefix(prefix: &str) -> String {
    prefix
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(String::with_capacity(prefix.len() + 1), |mut acc, segment| {
            acc.push_str(segment);
            acc.push('/');
            acc
        })
}

/// Strip `prefix` from a bucket-absolute key. Keys outside the prefix are
/// returned unchanged.
fn strip(prefix: &str, key: &str) -> String {
    key.strip_prefix(prefix).unwrap_or(key).to_string()
}

/// A key-prefix-scoped view over a bucket with row-level and bulk CRUD.
///
/// Tables are cheap to clone and hold no resources of their own. The page
/// size is a plain value read at call time; change it with
/// [`set_limit`](Table::set_limit) on an owned table or derive a new
/// table with [`with_limit`](Table::with_limit).
#[derive(Clone)]
pub struct Table {
    storage: Arc<dyn ObjectStoreAdapter>,
    bucket: BucketName,
    prefix: String,
    limit: PageSize,
    max_concurrency: usize,
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("limit", &self.limit)
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}

impl Table {
    pub(crate) fn new(
        storage: Arc<dyn ObjectStoreAdapter>,
        bucket: BucketName,
        prefix: &str,
        limit: PageSize,
        max_concurrency: usize,
    ) -> Self {
        Self {
            storage,
            bucket,
            prefix: normalize_prefix(prefix),
            limit,
            max_concurrency,
        }
    }

    /// The normalised prefix, empty or ending in `/`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The bucket this table lives in.
    pub fn bucket(&self) -> &BucketName {
        &self.bucket
    }

    /// The page size used by scans.
    pub fn limit(&self) -> PageSize {
        self.limit
    }

    /// Set the page size for subsequent scans. Values `<= 0` select the
    /// backend default.
    pub fn set_limit(&mut self, limit: impl Into<PageSize>) {
        self.limit = limit.into();
    }

    /// Return this table with a different page size.
    pub fn with_limit(mut self, limit: impl Into<PageSize>) -> Self {
        self.set_limit(limit);
        self
    }

    fn absolute(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn relative(&self, key: &str) -> String {
        strip(&self.prefix, key)
    }

    fn scan_request<'a>(
        &'a self,
        keyword: &'a str,
        token: Option<&'a PageToken>,
    ) -> ScanRequest<'a> {
        ScanRequest {
            prefix: &self.prefix,
            keyword,
            limit: self.limit,
            token,
        }
    }

    /// List one page of entries whose key contains `keyword`.
    ///
    /// Pass `None` to start from the beginning, or the previous page's
    /// `next_token` to continue.
    pub async fn find(&self, keyword: &str, token: Option<&PageToken>) -> Result<ScanPage> {
        let mut page = scan::scan(
            self.storage.as_ref(),
            self.bucket.as_str(),
            self.scan_request(keyword, token),
        )
        .await?;
        for entry in &mut page.entries {
            entry.key = self.relative(&entry.key);
        }
        Ok(page)
    }

    /// Stream every entry whose key contains `keyword`, across all pages.
    pub fn find_all(
        &self,
        keyword: &str,
    ) -> impl Stream<Item = Result<ObjectEntry>> + Send + 'static {
        let prefix = self.prefix.clone();
        scan::scan_pages(
            Arc::clone(&self.storage),
            self.bucket.to_string(),
            self.prefix.clone(),
            keyword.to_string(),
            self.limit,
        )
        .map_ok(move |page| {
            let prefix = prefix.clone();
            stream::iter(page.entries.into_iter().map(move |mut entry| {
                entry.key = strip(&prefix, &entry.key);
                Ok::<_, BucketDbError>(entry)
            }))
        })
        .try_flatten()
    }

    /// Fetch the values of one page of matching entries.
    ///
    /// Only a single page is read; continue with `next_token`.
    pub async fn find_with_content<T: DeserializeOwned>(
        &self,
        keyword: &str,
        token: Option<&PageToken>,
    ) -> Result<ContentPage<T>> {
        let page = bulk::find_with_content(
            self.storage.as_ref(),
            self.bucket.as_str(),
            self.scan_request(keyword, token),
            self.max_concurrency,
        )
        .await?;
        Ok(ContentPage {
            values: page
                .values
                .into_iter()
                .map(|(k, v)| (self.relative(&k), v))
                .collect(),
            failed: page
                .failed
                .into_iter()
                .map(|(k, e)| (self.relative(&k), e))
                .collect(),
            next_token: page.next_token,
        })
    }

    /// Store `value` under `key`, replacing any previous value.
    pub async fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        record::save_one(
            self.storage.as_ref(),
            self.bucket.as_str(),
            &self.absolute(key),
            value,
        )
        .await
    }

    /// Read the value under `key`; `None` when missing or empty.
    pub async fn fetch_one<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        record::fetch_one(self.storage.as_ref(), self.bucket.as_str(), &self.absolute(key)).await
    }

    /// Delete the row under `key`.
    pub async fn delete_one(&self, key: &str) -> Result<()> {
        record::delete_one(self.storage.as_ref(), self.bucket.as_str(), &self.absolute(key)).await
    }

    /// Fetch many rows concurrently; failed keys are reported, not fatal.
    pub async fn fetch_all<T, K>(&self, keys: &[K]) -> Result<FetchResult<T>>
    where
        T: DeserializeOwned,
        K: AsRef<str>,
    {
        let absolute: Vec<String> = keys.iter().map(|k| self.absolute(k.as_ref())).collect();
        let fetched = bulk::fetch_all(
            self.storage.as_ref(),
            self.bucket.as_str(),
            &absolute,
            self.max_concurrency,
        )
        .await?;
        Ok(fetched.map_keys(|k| self.relative(&k)))
    }

    /// Save many rows concurrently, returning the outcome for each key.
    pub async fn save_many<K, T, I>(&self, items: I) -> Result<HashMap<String, Result<()>>>
    where
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
        T: Serialize,
    {
        let absolute: Vec<(String, T)> = items
            .into_iter()
            .map(|(k, v)| (self.absolute(k.as_ref()), v))
            .collect();
        let saved = bulk::save_many(
            self.storage.as_ref(),
            self.bucket.as_str(),
            absolute,
            self.max_concurrency,
        )
        .await?;
        Ok(saved
            .into_iter()
            .map(|(k, result)| (self.relative(&k), result))
            .collect())
    }

    /// Delete many rows with one batch request.
    pub async fn delete_many<K: AsRef<str>>(&self, keys: &[K]) -> Result<Vec<DeleteOutcome>> {
        let absolute: Vec<String> = keys.iter().map(|k| self.absolute(k.as_ref())).collect();
        let outcomes =
            bulk::delete_many(self.storage.as_ref(), self.bucket.as_str(), &absolute).await?;
        Ok(outcomes
            .into_iter()
            .map(|mut outcome| {
                outcome.key = self.relative(&outcome.key);
                outcome
            })
            .collect())
    }
}
