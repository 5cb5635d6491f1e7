//! Typed names and the value types exchanged with object stores.
//!
//! [`BucketName`] and [`PageToken`] are newtype wrappers around `String`,
//! so a continuation token cannot be passed where a bucket is expected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Page size used when a caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

macro_rules! define_name {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new value from a string.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Return the inner string value.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_name!(
    /// Name of the object-storage bucket backing a database.
    BucketName
);

define_name!(
    /// Opaque cursor meaning "resume listing after this point".
    ///
    /// Only valid for the bucket and prefix that produced it.
    PageToken
);

impl PageToken {
    /// Turn a backend cursor into a token, treating an empty string as
    /// "end of sequence".
    pub fn non_empty(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }
}

/// Maximum number of entries requested per list call.
///
/// Any value `<= 0` means "use the backend default" ([`DEFAULT_PAGE_SIZE`]).
/// Conversions exist from the common integer types so callers can pass
/// whatever numeric type they hold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub struct PageSize(Option<usize>);

impl PageSize {
    /// The backend default page size.
    pub const DEFAULT: PageSize = PageSize(None);

    /// The explicit limit, or `None` for the backend default.
    pub fn max_keys(self) -> Option<usize> {
        self.0
    }

    /// The number of entries one page will hold at most.
    pub fn effective(self) -> usize {
        self.0.unwrap_or(DEFAULT_PAGE_SIZE)
    }
}

impl From<i64> for PageSize {
    fn from(n: i64) -> Self {
        if n <= 0 {
            Self(None)
        } else {
            Self(Some(usize::try_from(n).unwrap_or(usize::MAX)))
        }
    }
}

impl From<i32> for PageSize {
    fn from(n: i32) -> Self {
        Self::from(i64::from(n))
    }
}

impl From<u32> for PageSize {
    fn from(n: u32) -> Self {
        Self::from(i64::from(n))
    }
}

impl From<usize> for PageSize {
    fn from(n: usize) -> Self {
        if n == 0 {
            Self(None)
        } else {
            Self(Some(n))
        }
    }
}

impl From<f64> for PageSize {
    fn from(n: f64) -> Self {
        // Saturating cast; NaN maps to 0 and therefore the default.
        Self::from(n.trunc() as i64)
    }
}

impl From<PageSize> for i64 {
    fn from(size: PageSize) -> Self {
        size.0
            .map(|n| i64::try_from(n).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }
}

/// Metadata for one object returned by a list call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// Object key. Bucket-absolute when produced by an adapter,
    /// table-relative when returned by a table.
    pub key: String,

    /// Payload size in bytes.
    pub size: u64,

    /// Last modification time, if the store reports one.
    pub last_modified: Option<DateTime<Utc>>,

    /// Entity tag, if the store reports one.
    pub e_tag: Option<String>,
}

/// Parameters of a single list call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListRequest {
    /// Only keys starting with this string are listed.
    pub prefix: String,

    /// Page size; `None` uses the backend default.
    pub max_keys: Option<usize>,

    /// Resume after this point; `None` starts from the beginning.
    pub continuation: Option<PageToken>,
}

/// One page of a list call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Entries in ascending key order.
    pub entries: Vec<ObjectEntry>,

    /// Cursor for the next page, `None` at the end of the sequence.
    pub next_token: Option<PageToken>,
}

/// Per-key result of a batch delete.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    /// The key the outcome refers to.
    pub key: String,

    /// Backend error message when this key could not be deleted.
    pub error: Option<String>,
}

impl DeleteOutcome {
    /// An outcome for a successfully deleted key.
    pub fn deleted(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            error: None,
        }
    }

    /// An outcome for a key the backend failed to delete.
    pub fn failed(key: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            error: Some(error.into()),
        }
    }

    /// Whether the key was deleted.
    pub fn is_deleted(&self) -> bool {
        self.error.is_none()
    }
}
