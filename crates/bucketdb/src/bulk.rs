//! Bulk fetch, save and delete.
//!
//! Fetch and save fan out one request per key, with at most
//! `max_concurrency` requests in flight. Each call returns only after every
//! request has finished; completion order across keys is unspecified.
//!
//! Fetch is best-effort: a key whose request fails is reported in
//! [`FetchResult::failed`] and never fails the whole call. Save reports a
//! result per key. Delete issues a single batch request.

use std::collections::HashMap;

use futures::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use bucketdb_core::error::BucketDbError;
use bucketdb_core::storage::ObjectStoreAdapter;
use bucketdb_core::types::{DeleteOutcome, PageToken};
use bucketdb_core::Result;

use crate::record;
use crate::scan::{scan, ScanRequest};

/// Values fetched by a bulk read.
#[derive(Debug)]
pub struct FetchResult<T> {
    /// Decoded values by key. Missing and empty objects are absent.
    pub values: HashMap<String, T>,
    /// Keys whose read or decode failed, with the error.
    pub failed: HashMap<String, BucketDbError>,
}

impl<T> Default for FetchResult<T> {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
            failed: HashMap::new(),
        }
    }
}

impl<T> FetchResult<T> {
    /// Rewrite every key in both maps.
    pub(crate) fn map_keys(self, f: impl Fn(String) -> String) -> Self {
        Self {
            values: self.values.into_iter().map(|(k, v)| (f(k), v)).collect(),
            failed: self.failed.into_iter().map(|(k, e)| (f(k), e)).collect(),
        }
    }
}

/// One scanned page together with the values stored under its keys.
#[derive(Debug)]
pub struct ContentPage<T> {
    /// Decoded values by key.
    pub values: HashMap<String, T>,
    /// Keys on this page whose read or decode failed.
    pub failed: HashMap<String, BucketDbError>,
    /// Token for the next page, `None` at the end of the sequence.
    pub next_token: Option<PageToken>,
}

/// Fetch every key concurrently.
///
/// Fails with [`BucketDbError::InvalidArgument`] when `keys` is empty, and
/// never because of a single key.
pub async fn fetch_all<T: DeserializeOwned>(
    storage: &dyn ObjectStoreAdapter,
    bucket: &str,
    keys: &[String],
    max_concurrency: usize,
) -> Result<FetchResult<T>> {
    if keys.is_empty() {
        return Err(BucketDbError::invalid_argument(
            "please provide at least one object key to fetch",
        ));
    }

    let mut fetches = stream::iter(keys)
        .map(move |key| async move {
            let fetched = record::fetch_one::<T>(storage, bucket, key).await;
            (key, fetched)
        })
        .buffer_unordered(max_concurrency.max(1));

    let mut result = FetchResult::default();
    while let Some((key, fetched)) = fetches.next().await {
        match fetched {
            Ok(Some(value)) => {
                result.values.insert(key.clone(), value);
            }
            Ok(None) => debug!(key = %key, "No value stored"),
            Err(e) => {
                warn!(key = %key, error = %e, "Fetch failed, leaving key out of the result");
                result.failed.insert(key.clone(), e);
            }
        }
    }

    debug!(
        requested = keys.len(),
        fetched = result.values.len(),
        failed = result.failed.len(),
        "Bulk fetch complete"
    );
    Ok(result)
}

/// Save every entry concurrently and report the outcome per key.
pub async fn save_many<T: Serialize>(
    storage: &dyn ObjectStoreAdapter,
    bucket: &str,
    items: Vec<(String, T)>,
    max_concurrency: usize,
) -> Result<HashMap<String, Result<()>>> {
    if items.is_empty() {
        return Err(BucketDbError::invalid_argument(
            "please provide at least one entry to save",
        ));
    }

    let requested = items.len();
    let mut saves = stream::iter(items)
        .map(move |(key, value)| async move {
            let saved = record::save_one(storage, bucket, &key, &value).await;
            (key, saved)
        })
        .buffer_unordered(max_concurrency.max(1));

    let mut results = HashMap::with_capacity(requested);
    while let Some((key, saved)) = saves.next().await {
        if let Err(e) = &saved {
            warn!(key = %key, error = %e, "Save failed");
        }
        results.insert(key, saved);
    }

    debug!(requested, "Bulk save complete");
    Ok(results)
}

/// Delete every key with one batch request to the store.
pub async fn delete_many(
    storage: &dyn ObjectStoreAdapter,
    bucket: &str,
    keys: &[String],
) -> Result<Vec<DeleteOutcome>> {
    if keys.is_empty() {
        return Err(BucketDbError::invalid_argument(
            "please provide at least one object key to delete",
        ));
    }

    let outcomes = storage.delete_batch(bucket, keys).await?;
    for outcome in outcomes.iter().filter(|o| !o.is_deleted()) {
        warn!(key = %outcome.key, error = ?outcome.error, "Delete failed");
    }
    debug!(requested = keys.len(), "Batch delete complete");
    Ok(outcomes)
}

/// Scan one page and fetch the values of every key on it.
///
/// Only the requested page is read; the caller continues with the
/// returned token.
pub async fn find_with_content<T: DeserializeOwned>(
    storage: &dyn ObjectStoreAdapter,
    bucket: &str,
    request: ScanRequest<'_>,
    max_concurrency: usize,
) -> Result<ContentPage<T>> {
    let page = scan(storage, bucket, request).await?;
    let keys: Vec<String> = page.entries.into_iter().map(|entry| entry.key).collect();

    if keys.is_empty() {
        return Ok(ContentPage {
            values: HashMap::new(),
            failed: HashMap::new(),
            next_token: page.next_token,
        });
    }

    let fetched = fetch_all(storage, bucket, &keys, max_concurrency).await?;
    Ok(ContentPage {
        values: fetched.values,
        failed: fetched.failed,
        next_token: page.next_token,
    })
}
