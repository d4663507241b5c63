//! Identifier types for applications, services, deployments and unit files.
//!
//! All identifiers share one representation: a UUID v4 whose canonical text
//! form is exactly [`ID_LENGTH`] characters. Parsing is strict so that an id
//! read back from a unit name or a store key always renders identically.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of the canonical text form of every identifier.
pub const ID_LENGTH: usize = 36;

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input has an incorrect length.
    #[error("invalid length: expected {expected} characters, got {got}")]
    InvalidLength {
        /// The expected number of characters.
        expected: usize,
        /// The actual number of characters.
        got: usize,
    },

    /// The input is not a valid UUID.
    #[error("invalid UUID format")]
    InvalidUuid,
}

fn parse_uuid(s: &str) -> Result<uuid::Uuid, IdError> {
    if s.len() != ID_LENGTH {
        return Err(IdError::InvalidLength {
            expected: ID_LENGTH,
            got: s.len(),
        });
    }
    uuid::Uuid::parse_str(s).map_err(|_| IdError::InvalidUuid)
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Create an identifier from a UUID.
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Generate a new random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Return the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_uuid(s).map(Self)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.hyphenated())
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.to_string()
            }
        }
    };
}

uuid_id! {
    /// Identifier of an application, the top-level grouping of services.
    ApplicationId
}

uuid_id! {
    /// Identifier of a service.
    ServiceId
}

uuid_id! {
    /// Identifier of a deployment, one scheduling generation of a service.
    ///
    /// Appears verbatim inside every scheduled unit name of the deployment.
    DeploymentId
}

uuid_id! {
    /// Identifier of a unit file template registered with the scheduler.
    ///
    /// The template unit is named `{id}@` and its instances
    /// `{id}@{deployment}-{n}`.
    UnitFileId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_id_roundtrip() {
        let id = ServiceId::generate();
        let text = id.to_string();
        assert_eq!(text.len(), ID_LENGTH);
        let parsed = ServiceId::from_str(&text).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn ids_are_unique() {
        let a = DeploymentId::generate();
        let b = DeploymentId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_wrong_length() {
        let result = ApplicationId::from_str("deadbeef");
        assert!(matches!(
            result,
            Err(IdError::InvalidLength {
                expected: 36,
                got: 8
            })
        ));
    }

    #[test]
    fn rejects_simple_form() {
        // 32 hex digits without hyphens is a valid UUID but not the canonical form.
        let result = UnitFileId::from_str("0b7c2a6e4c1f4bd49b552f4f5f5e3d11");
        assert!(matches!(result, Err(IdError::InvalidLength { .. })));
    }

    #[test]
    fn rejects_garbage_of_right_length() {
        let result = ServiceId::from_str("zzzzzzzz-zzzz-zzzz-zzzz-zzzzzzzzzzzz");
        assert!(matches!(result, Err(IdError::InvalidUuid)));
    }

    #[test]
    fn display_is_lowercase_hyphenated() {
        let id: DeploymentId = "0B7C2A6E-4C1F-4BD4-9B55-2F4F5F5E3D11".parse().unwrap();
        assert_eq!(id.to_string(), "0b7c2a6e-4c1f-4bd4-9b55-2f4f5f5e3d11");
    }

    #[test]
    fn serde_json_uses_string_form() {
        let id = ApplicationId::generate();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let parsed: ApplicationId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn serde_json_rejects_invalid() {
        let result: Result<ServiceId, _> = serde_json::from_str("\"not-a-uuid\"");
        assert!(result.is_err());
    }
}
