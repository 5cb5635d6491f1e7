//! bucketdb: a document store over object-storage buckets.
//!
//! A [`Database`] is a bucket handle. Each [`Table`] it mints is a key
//! prefix inside that bucket, and each row is one JSON object stored under
//! `prefix + key`. Tables offer row-level CRUD, paginated keyword scans
//! and concurrent bulk fetch/save/delete.
//!
//! ```no_run
//! # async fn demo() -> bucketdb::Result<()> {
//! use bucketdb::{Database, DatabaseConfig};
//! use serde_json::{json, Value};
//!
//! let db = Database::open(&DatabaseConfig::new("memory://", "s3-nosql-test")).await?;
//! let table = db.table("tests");
//! table.save("1.json", &json!({"a": 1})).await?;
//! let value: Option<Value> = table.fetch_one("1.json").await?;
//! assert_eq!(value, Some(json!({"a": 1})));
//! # Ok(())
//! # }
//! ```

pub mod bulk;
pub mod database;
pub mod record;
pub mod scan;
pub mod table;

pub use bucketdb_core::{
    BucketDbError, BucketName, DatabaseConfig, DeleteOutcome, ObjectEntry, ObjectStoreAdapter,
    PageSize, PageToken, Result,
};
pub use bulk::{ContentPage, FetchResult};
pub use database::Database;
pub use scan::ScanPage;
pub use table::Table;
