//! Unified error types for bucketdb.
//!
//! All errors are represented by [`BucketDbError`], using `thiserror`
//! for ergonomic error definitions. Library code never uses `unwrap()`;
//! all fallible operations return `Result<T, BucketDbError>`.

use thiserror::Error;

/// The unified error type for all bucketdb operations.
#[derive(Error, Debug)]
pub enum BucketDbError {
    /// The object store failed (network, permission, throttling, I/O).
    #[error("Storage error: {message}")]
    Storage {
        /// Human-readable description of the failure.
        message: String,
        /// The underlying error, if available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The requested key was not found in storage.
    #[error("Not found: {key}")]
    NotFound {
        /// The storage key that was not found.
        key: String,
    },

    /// A list response did not have the expected shape.
    #[error("Malformed list response: {message}")]
    MalformedResponse {
        /// What was wrong with the response.
        message: String,
    },

    /// A stored payload is not valid JSON for the requested type.
    #[error("Failed to decode value at {key}: {source}")]
    Decode {
        /// The storage key whose payload failed to decode.
        key: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be serialised to JSON.
    #[error("Failed to encode value for {key}: {source}")]
    Encode {
        /// The storage key the value was destined for.
        key: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A caller passed an argument the operation cannot accept.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the rejected argument.
        message: String,
    },

    /// Invalid configuration was provided.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },

    /// An internal error (bug).
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl BucketDbError {
    /// Create a storage error from a message and source error.
    pub fn storage(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a storage error from a message only.
    pub fn storage_msg(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a malformed-response error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Whether this error means the object simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
