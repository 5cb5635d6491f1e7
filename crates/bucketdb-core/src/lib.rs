//! bucketdb core types, traits, configuration, and errors.
//!
//! This crate provides the building blocks shared by the storage adapters
//! and the table layer: typed names, the [`ObjectStoreAdapter`] trait,
//! the JSON record codec, database configuration and the unified error type.

pub mod codec;
pub mod config;
pub mod error;
pub mod storage;
pub mod types;

pub use config::DatabaseConfig;
pub use error::BucketDbError;
pub use storage::ObjectStoreAdapter;
pub use types::*;

/// Convenience Result type using [`BucketDbError`].
pub type Result<T> = std::result::Result<T, BucketDbError>;
