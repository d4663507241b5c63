//! Error types for the control plane.
//!
//! Store and scheduler failures other than the store's miss condition are
//! upstream errors: they abort the current operation and are not classified
//! further.

use admiral_fleet::FleetError;
use admiral_store::StoreError;
use thiserror::Error;

use crate::validation::ValidationErrors;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur in control plane operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The requested entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind, e.g. `service`.
        kind: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// Input failed validation. Nothing was written.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// The requested transition is not allowed from the current state.
    #[error("{0}")]
    Conflict(String),

    /// Config store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Cluster scheduler failure.
    #[error("scheduler error: {0}")]
    Scheduler(#[from] FleetError),
}

impl ControlError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Validation(_) => 422,
            Self::Conflict(_) => 409,
            Self::Store(_) | Self::Scheduler(_) => 500,
        }
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Store(e) => matches!(e, StoreError::Http(_)),
            Self::Scheduler(e) => e.is_retriable(),
            Self::NotFound { .. } | Self::Validation(_) | Self::Conflict(_) => false,
        }
    }
}

impl From<ValidationErrors> for ControlError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_codes() {
        assert_eq!(ControlError::not_found("service", "abc").http_status_code(), 404);
        assert_eq!(
            ControlError::Validation(ValidationErrors::default()).http_status_code(),
            422
        );
        assert_eq!(ControlError::conflict("busy").http_status_code(), 409);
        assert_eq!(
            ControlError::Store(StoreError::Database("io".into())).http_status_code(),
            500
        );
        assert_eq!(
            ControlError::Scheduler(FleetError::Http("reset".into())).http_status_code(),
            500
        );
    }

    #[test]
    fn retriable_errors() {
        assert!(ControlError::Store(StoreError::Http("reset".into())).is_retriable());
        assert!(!ControlError::Store(StoreError::NotFound("/x".into())).is_retriable());
        assert!(ControlError::Scheduler(FleetError::Http("reset".into())).is_retriable());
        assert!(!ControlError::conflict("busy").is_retriable());
    }

    #[test]
    fn not_found_message_names_the_entity() {
        let err = ControlError::not_found("deployment", "d-1");
        assert_eq!(err.to_string(), "deployment not found: d-1");
    }
}
