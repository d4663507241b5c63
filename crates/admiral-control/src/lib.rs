//! Control plane for admiral applications, services and deployments.
//!
//! This crate holds the registries and lifecycle rules. It persists records
//! through an [`admiral_store::ConfigStore`] and schedules units through an
//! [`admiral_fleet::ClusterScheduler`], both injected at construction.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Gateway (HTTP)                         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ControlPlane                          │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │ Application │ │  Service    │ │    Deployment       │    │
//! │  │  Registry   │→│  Registry   │→│    Registry         │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                    ┌─────────┴─────────┐
//!                    ▼                   ▼
//!             ┌────────────┐      ┌────────────┐
//!             │ ConfigStore│      │ Scheduler  │
//!             │(etcd/Rocks)│      │  (fleet)   │
//!             └────────────┘      └────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use admiral_control::{ApplicationParams, ControlConfig, ControlPlane};
//! use admiral_fleet::{FleetClient, FleetConfig};
//! use admiral_store::RocksStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RocksStore::open("/tmp/admiral")?);
//! let fleet = Arc::new(FleetClient::new(&FleetConfig::default())?);
//! let control = ControlPlane::new(store, fleet, ControlConfig::default());
//!
//! let app = control
//!     .applications()
//!     .create(ApplicationParams::new("shop"))
//!     .await?;
//! println!("Created application {}", app.id);
//! # Ok(())
//! # }
//! ```
//!
//! # State Machines
//!
//! Services move `idle → starting → running | partially running →
//! stopping → stopped → unloading → initialized → terminating →
//! terminated`. Deployments move `uninitialized → initialized → starting →
//! running | partially running → stopping → initialized`, and end in
//! `terminated`. See [`lifecycle`] for the guards.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod applications;
pub mod deployments;
pub mod error;
pub mod lifecycle;
pub mod locks;
pub mod naming;
pub mod plane;
pub mod retry;
pub mod services;
pub mod templates;
pub mod types;
pub mod validation;

pub use applications::ApplicationRegistry;
pub use deployments::DeploymentRegistry;
pub use error::{ControlError, Result};
pub use plane::ControlPlane;
pub use retry::RetryPolicy;
pub use services::ServiceRegistry;
pub use templates::{RouterParams, ServiceTemplate, TemplateParams};
pub use types::{ApplicationParams, ControlConfig, DeploymentParams, DeploymentRef, ServiceParams};
pub use validation::ValidationErrors;

// Re-export commonly used types from dependencies for convenience
pub use admiral_core::{ApplicationId, DeploymentId, ServiceId, UnitFileId};
pub use admiral_store::{
    Application, Deployment, DeploymentState, Service, ServiceState, UnitFile,
};
