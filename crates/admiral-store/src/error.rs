//! Error types for the config store layer.

use thiserror::Error;

/// A result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Store error codes, numbered the way etcd numbers them.
pub mod codes {
    /// The key or directory does not exist.
    pub const KEY_NOT_FOUND: u32 = 100;
    /// The operation expects a value but found a directory.
    pub const NOT_A_FILE: u32 = 102;
    /// The operation expects a directory but found a value.
    pub const NOT_A_DIRECTORY: u32 = 104;
    /// The key already exists.
    pub const NODE_EXISTS: u32 = 105;
    /// The directory still has children.
    pub const DIRECTORY_NOT_EMPTY: u32 = 108;
}

/// Errors that can occur during config store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested key or directory does not exist.
    #[error("key not found: {0}")]
    NotFound(String),

    /// The store refused the operation.
    #[error("store rejected operation (code {code}): {message}")]
    Rejected {
        /// Store error code.
        code: u32,
        /// Message reported by the store.
        message: String,
    },

    /// The store could not be reached or answered with garbage.
    #[error("store transport error: {0}")]
    Http(String),

    /// A local database error occurred.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Returns true if this is the distinguished miss condition.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub(crate) fn rejected(code: u32, message: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
