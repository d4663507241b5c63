//! Cluster scheduler contract and fleet client for admiral.
//!
//! This crate provides the [`ClusterScheduler`] trait and [`FleetClient`]
//! implementation, which talks to a fleet cluster over its v1 REST API.
//! It handles:
//!
//! - Submitting unit templates (`{unitFileId}@`)
//! - Loading, starting, stopping and destroying unit instances
//! - Listing unit runtime state and cluster machines
//!
//! Unit names are canonical everywhere in admiral: the `.service` suffix fleet
//! uses is added and stripped at the wire boundary by [`unit`].
//!
//! # Example
//!
//! ```no_run
//! use admiral_fleet::{ClusterScheduler, FleetClient, FleetConfig, UnitTemplate};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fleet = FleetClient::new(&FleetConfig::default())?;
//!
//! fleet
//!     .submit(&[UnitTemplate {
//!         name: "web@".to_string(),
//!         content: "[Service]\nExecStart=/usr/bin/sleep infinity\n".to_string(),
//!     }])
//!     .await?;
//! fleet.start(&["web@deploy-0".to_string()]).await?;
//!
//! for unit in fleet.list_units().await? {
//!     println!("{}: {}", unit.name, unit.active_state.as_str());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! Enable the `test-utils` feature for an in-memory scheduler:
//!
//! ```ignore
//! use admiral_fleet::{ClusterScheduler, InMemoryScheduler, UnitTemplate};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = InMemoryScheduler::new();
//! scheduler.submit(&[UnitTemplate { name: "a@".into(), content: "[Service]\n".into() }]).await?;
//! scheduler.start(&["a@d-0".to_string()]).await?;
//! assert_eq!(scheduler.start_calls().len(), 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod fleet;
pub mod types;
pub mod unit;

pub use error::{FleetError, Result};
pub use fleet::{ClusterScheduler, FleetClient};
pub use types::{
    ActiveState, DesiredState, FleetConfig, Machine, UnitFileInfo, UnitOption, UnitState,
    UnitTemplate,
};

#[cfg(any(test, feature = "test-utils"))]
pub use fleet::mock::{InMemoryScheduler, SchedulerCall};
