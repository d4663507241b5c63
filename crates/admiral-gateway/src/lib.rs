//! HTTP gateway for the admiral control plane.
//!
//! This crate exposes the application, service and deployment registries
//! over a JSON REST API, plus read-only views of cluster machines and the
//! vulcand router configuration.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Clients                             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ HTTP
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     admiral-gateway                         │
//! │        Router + Handlers (trace, CORS, limits, timeout)     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┴──────────────┐
//!               ▼                             ▼
//!        ┌──────────────┐              ┌──────────────┐
//!        │ ControlPlane │              │ Router store │
//!        │ (registries) │              │ (/vulcand)   │
//!        └──────────────┘              └──────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use admiral_control::{ControlConfig, ControlPlane};
//! use admiral_fleet::{FleetClient, FleetConfig};
//! use admiral_gateway::{create_router, GatewayConfig, GatewayState};
//! use admiral_store::RocksStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let root = RocksStore::open("/tmp/admiral")?;
//! let store = Arc::new(root.with_namespace("/admiral"));
//! let fleet = Arc::new(FleetClient::new(&FleetConfig::default())?);
//! let control = ControlPlane::new(store, fleet, ControlConfig::default());
//!
//! let state = GatewayState::new(control, Arc::new(root), GatewayConfig::default());
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::GatewayConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::GatewayState;
