//! Core types for the admiral control plane.
//!
//! This crate provides the strongly-typed identifiers shared by every other
//! admiral crate. Each identifier is a random UUID rendered in its
//! 36-character hyphenated form, which is also the form persisted in the
//! config store and used inside scheduled unit names.
//!
//! # Example
//!
//! ```
//! use admiral_core::{DeploymentId, ServiceId};
//!
//! let service = ServiceId::generate();
//! let deployment: DeploymentId = "0b7c2a6e-4c1f-4bd4-9b55-2f4f5f5e3d11".parse().unwrap();
//!
//! assert_eq!(service.to_string().len(), 36);
//! assert_eq!(deployment.to_string(), "0b7c2a6e-4c1f-4bd4-9b55-2f4f5f5e3d11");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;

pub use ids::{ApplicationId, DeploymentId, IdError, ServiceId, UnitFileId, ID_LENGTH};
