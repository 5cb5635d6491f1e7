//! Object store adapters for bucketdb.
//!
//! This crate provides concrete implementations of the
//! [`ObjectStoreAdapter`](bucketdb_core::ObjectStoreAdapter) trait:
//!
//! - [`LocalBackend`]: filesystem-backed buckets for development and tests
//! - [`S3Backend`]: S3-compatible object storage (or in-memory stores)
//!
//! [`open`] picks one from a storage URI.

pub mod local;
pub mod s3;

use std::path::PathBuf;
use std::sync::Arc;

use bucketdb_core::error::BucketDbError;
use bucketdb_core::storage::ObjectStoreAdapter;
use bucketdb_core::Result;

pub use local::LocalBackend;
pub use s3::{S3Backend, S3Options};

/// Open the adapter described by a storage URI.
///
/// - `s3://?region=..&endpoint=..` → [`S3Backend`]
/// - `memory://` → [`S3Backend::in_memory`]
/// - `local://<path>` or a bare path → [`LocalBackend`] (`~/` is expanded)
pub async fn open(uri: &str) -> Result<Arc<dyn ObjectStoreAdapter>> {
    if uri.starts_with("s3://") {
        return Ok(Arc::new(S3Backend::from_uri(uri)?));
    }
    if uri.starts_with("memory://") {
        return Ok(Arc::new(S3Backend::in_memory()));
    }

    // Parse local URI: "local://<path>" or treat as raw path
    let path = uri.strip_prefix("local://").unwrap_or(uri);
    if path.is_empty() {
        return Err(BucketDbError::Config {
            message: format!("storage URI has no path: '{uri}'"),
        });
    }

    // Expand ~ to home directory
    let expanded = if let Some(rest) = path.strip_prefix("~/") {
        let home = home_dir().ok_or_else(|| BucketDbError::Config {
            message: "Cannot determine home directory".to_string(),
        })?;
        home.join(rest)
    } else {
        PathBuf::from(path)
    };

    Ok(Arc::new(LocalBackend::new(expanded).await?))
}

/// Best-effort home directory detection.
fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE").ok().map(PathBuf::from)
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}
