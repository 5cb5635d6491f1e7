//! Database configuration.
//!
//! [`DatabaseConfig`] captures where the data lives (storage URI and bucket)
//! and the tuning parameters applied to every table the database mints.

use serde::{Deserialize, Serialize};

use crate::error::BucketDbError;
use crate::types::{BucketName, PageSize};
use crate::Result;

/// Default cap on in-flight requests for one bulk operation.
pub const DEFAULT_MAX_CONCURRENCY: usize = 32;

/// Configuration for a bucketdb database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Storage URI: `"local://~/.bucketdb"`, `"memory://"` or
    /// `"s3://?region=eu-west-1"`.
    pub storage_uri: String,

    /// Bucket holding every table of this database. Must already exist.
    pub bucket: BucketName,

    /// Default page size for scans; `<= 0` means the backend default.
    #[serde(default)]
    pub page_size: PageSize,

    /// Maximum number of concurrent requests issued by one bulk operation.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

impl DatabaseConfig {
    /// Create a configuration with default tuning.
    ///
    /// # Example
    ///
    /// ```
    /// use bucketdb_core::config::DatabaseConfig;
    ///
    /// let config = DatabaseConfig::new("memory://", "s3-nosql-test");
    /// assert_eq!(config.bucket.as_str(), "s3-nosql-test");
    /// assert!(config.max_concurrency > 0);
    /// ```
    pub fn new(storage_uri: impl Into<String>, bucket: impl Into<BucketName>) -> Self {
        Self {
            storage_uri: storage_uri.into(),
            bucket: bucket.into(),
            page_size: PageSize::DEFAULT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Check the values a database cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.bucket.as_str().is_empty() {
            return Err(BucketDbError::Config {
                message: "bucket name must not be empty".to_string(),
            });
        }
        if self.max_concurrency == 0 {
            return Err(BucketDbError::Config {
                message: "max_concurrency must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_PAGE_SIZE;

    #[test]
    fn test_new_uses_defaults() {
        let config = DatabaseConfig::new("local://data", "bucket");
        assert_eq!(config.page_size.effective(), DEFAULT_PAGE_SIZE);
        assert_eq!(config.max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_bucket() {
        let config = DatabaseConfig::new("memory://", "");
        assert!(matches!(
            config.validate(),
            Err(BucketDbError::Config { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = DatabaseConfig::new("memory://", "b");
        config.max_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_deserialization_fills_defaults() {
        let config: DatabaseConfig =
            serde_json::from_str(r#"{"storage_uri": "memory://", "bucket": "b"}"#).unwrap();
        assert_eq!(config.page_size, PageSize::DEFAULT);
        assert_eq!(config.max_concurrency, DEFAULT_MAX_CONCURRENCY);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = DatabaseConfig::new("s3://?region=eu-west-1", "bucket");
        config.page_size = PageSize::from(200i64);
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: DatabaseConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, config);
    }
}
