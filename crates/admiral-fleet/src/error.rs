//! Error types for the fleet crate.

use thiserror::Error;

/// Errors that can occur talking to the cluster scheduler.
#[derive(Error, Debug)]
pub enum FleetError {
    /// The scheduler could not be reached.
    #[error("fleet request failed: {0}")]
    Http(String),

    /// The scheduler answered with an error status.
    #[error("fleet API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message reported by fleet.
        message: String,
    },

    /// A unit, or the template an instance needs, does not exist.
    #[error("unit not found: {0}")]
    UnitNotFound(String),

    /// Unit file text could not be parsed.
    #[error("invalid unit file: {0}")]
    InvalidUnit(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl FleetError {
    /// Check if this error is retriable.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::UnitNotFound(_) | Self::InvalidUnit(_) | Self::Config(_) => false,
        }
    }
}

impl From<reqwest::Error> for FleetError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// A specialized Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, FleetError>;
