//! Paginated key scans with keyword filtering.
//!
//! [`scan`] lists one page of entries under a prefix and keeps only the
//! entries whose key contains the keyword. The keyword filter runs after
//! the page is listed, so a page may hold fewer than `limit` matches even
//! when more exist further on. [`scan_pages`] follows continuation tokens
//! until the end of the sequence.

use std::sync::Arc;

use futures::stream::{self, Stream};
use serde::Serialize;
use tracing::debug;

use bucketdb_core::error::BucketDbError;
use bucketdb_core::storage::ObjectStoreAdapter;
use bucketdb_core::types::{ListPage, ListRequest, ObjectEntry, PageSize, PageToken};
use bucketdb_core::Result;

/// Parameters of one scan call.
#[derive(Debug, Clone, Copy)]
pub struct ScanRequest<'a> {
    /// Bucket-absolute key prefix.
    pub prefix: &'a str,
    /// Substring every returned key must contain; empty keeps everything.
    pub keyword: &'a str,
    /// Page size for the underlying list call.
    pub limit: PageSize,
    /// Resume after this token; `None` starts from the beginning.
    pub token: Option<&'a PageToken>,
}

/// One page of scan results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanPage {
    /// Entries that matched the keyword, in key order.
    pub entries: Vec<ObjectEntry>,
    /// Token for the next page, `None` at the end of the sequence.
    pub next_token: Option<PageToken>,
}

/// List one page under `request.prefix` and filter it by keyword.
pub async fn scan(
    storage: &dyn ObjectStoreAdapter,
    bucket: &str,
    request: ScanRequest<'_>,
) -> Result<ScanPage> {
    let list = ListRequest {
        prefix: request.prefix.to_string(),
        max_keys: request.limit.max_keys(),
        continuation: request.token.cloned(),
    };
    let page = storage.list(bucket, &list).await?;
    validate_page(&request, &page)?;

    let listed = page.entries.len();
    let entries: Vec<ObjectEntry> = if request.keyword.is_empty() {
        page.entries
    } else {
        page.entries
            .into_iter()
            .filter(|entry| entry.key.contains(request.keyword))
            .collect()
    };
    let next_token = page
        .next_token
        .and_then(|token| PageToken::non_empty(token.0));

    debug!(
        bucket = %bucket,
        prefix = %request.prefix,
        keyword = %request.keyword,
        listed,
        matched = entries.len(),
        more = next_token.is_some(),
        "Scanned page"
    );
    Ok(ScanPage {
        entries,
        next_token,
    })
}

/// Reject list pages that cannot have come from a well-behaved store.
fn validate_page(request: &ScanRequest<'_>, page: &ListPage) -> Result<()> {
    if let Some(entry) = page
        .entries
        .iter()
        .find(|entry| !entry.key.starts_with(request.prefix))
    {
        return Err(BucketDbError::malformed(format!(
            "entry '{}' is outside prefix '{}'",
            entry.key, request.prefix
        )));
    }
    if let Some(max) = request.limit.max_keys() {
        if page.entries.len() > max {
            return Err(BucketDbError::malformed(format!(
                "page holds {} entries, more than the requested {max}",
                page.entries.len()
            )));
        }
    }
    if let (Some(next), Some(current)) = (&page.next_token, request.token) {
        if next == current {
            return Err(BucketDbError::malformed(format!(
                "continuation token '{next}' did not advance"
            )));
        }
    }
    Ok(())
}

struct ScanCursor {
    storage: Arc<dyn ObjectStoreAdapter>,
    bucket: String,
    prefix: String,
    keyword: String,
    limit: PageSize,
    token: Option<PageToken>,
}

/// Lazily scan every page under `prefix`, one list call per poll.
///
/// The stream starts from the beginning and ends after the page without a
/// continuation token, or after the first error.
pub fn scan_pages(
    storage: Arc<dyn ObjectStoreAdapter>,
    bucket: String,
    prefix: String,
    keyword: String,
    limit: PageSize,
) -> impl Stream<Item = Result<ScanPage>> + Send + 'static {
    let cursor = ScanCursor {
        storage,
        bucket,
        prefix,
        keyword,
        limit,
        token: None,
    };

    stream::try_unfold(Some(cursor), next_page)
}

async fn next_page(
    cursor: Option<ScanCursor>,
) -> Result<Option<(ScanPage, Option<ScanCursor>)>> {
    let Some(mut cursor) = cursor else {
        return Ok(None);
    };
    let page = scan(
        cursor.storage.as_ref(),
        &cursor.bucket,
        ScanRequest {
            prefix: &cursor.prefix,
            keyword: &cursor.keyword,
            limit: cursor.limit,
            token: cursor.token.as_ref(),
        },
    )
    .await?;

    let next = page.next_token.clone().map(|token| {
        cursor.token = Some(token);
        cursor
    });
    Ok(Some((page, next)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use bucketdb_core::types::DeleteOutcome;

    /// Serves one canned list page, whatever the request.
    struct CannedList(ListPage);

    #[async_trait]
    impl ObjectStoreAdapter for CannedList {
        async fn list(&self, _bucket: &str, _request: &ListRequest) -> Result<ListPage> {
            Ok(self.0.clone())
        }
        async fn get(&self, _bucket: &str, key: &str) -> Result<Bytes> {
            Err(BucketDbError::NotFound {
                key: key.to_string(),
            })
        }
        async fn put(&self, _bucket: &str, _key: &str, _data: Bytes) -> Result<()> {
            Ok(())
        }
        async fn delete(&self, _bucket: &str, _key: &str) -> Result<()> {
            Ok(())
        }
        async fn delete_batch(&self, _bucket: &str, _keys: &[String]) -> Result<Vec<DeleteOutcome>> {
            Ok(Vec::new())
        }
    }

    fn entry(key: &str) -> ObjectEntry {
        ObjectEntry {
            key: key.to_string(),
            size: 1,
            last_modified: None,
            e_tag: None,
        }
    }

    fn request<'a>(prefix: &'a str, keyword: &'a str, token: Option<&'a PageToken>) -> ScanRequest<'a> {
        ScanRequest {
            prefix,
            keyword,
            limit: PageSize::DEFAULT,
            token,
        }
    }

    #[tokio::test]
    async fn test_keyword_filters_after_listing() {
        let store = CannedList(ListPage {
            entries: vec![entry("t/test-1"), entry("t/prod-1"), entry("t/test-2")],
            next_token: Some(PageToken::new("t/test-2")),
        });
        let page = scan(&store, "b", request("t/", "test", None)).await.unwrap();
        let keys: Vec<_> = page.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["t/test-1", "t/test-2"]);
        assert_eq!(page.next_token, Some(PageToken::new("t/test-2")));
    }

    #[tokio::test]
    async fn test_empty_token_ends_sequence() {
        let store = CannedList(ListPage {
            entries: vec![entry("t/a")],
            next_token: Some(PageToken::new("")),
        });
        let page = scan(&store, "b", request("t/", "", None)).await.unwrap();
        assert!(page.next_token.is_none());
    }

    #[tokio::test]
    async fn test_entry_outside_prefix_is_malformed() {
        let store = CannedList(ListPage {
            entries: vec![entry("t/a"), entry("other/b")],
            next_token: None,
        });
        let result = scan(&store, "b", request("t/", "", None)).await;
        assert!(matches!(result, Err(BucketDbError::MalformedResponse { .. })));
    }

    #[tokio::test]
    async fn test_oversized_page_is_malformed() {
        let store = CannedList(ListPage {
            entries: vec![entry("t/a"), entry("t/b"), entry("t/c")],
            next_token: None,
        });
        let mut req = request("t/", "", None);
        req.limit = PageSize::from(2usize);
        let result = scan(&store, "b", req).await;
        assert!(matches!(result, Err(BucketDbError::MalformedResponse { .. })));
    }

    #[tokio::test]
    async fn test_stuck_token_is_malformed_and_ends_stream() {
        use futures::StreamExt;

        let token = PageToken::new("t/a");
        let store = CannedList(ListPage {
            entries: vec![entry("t/a")],
            next_token: Some(token.clone()),
        });
        let result = scan(&store, "b", request("t/", "", Some(&token))).await;
        assert!(matches!(result, Err(BucketDbError::MalformedResponse { .. })));

        // The first page succeeds, the second repeats the token and fails,
        // and nothing follows the error.
        let results: Vec<_> = scan_pages(
            Arc::new(store),
            "b".to_string(),
            "t/".to_string(),
            String::new(),
            PageSize::DEFAULT,
        )
        .collect()
        .await;
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }
}
