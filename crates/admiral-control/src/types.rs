//! Request types and configuration for control plane operations.
//!
//! Parameters are loosely typed on purpose: they arrive from callers as
//! strings and plain numbers, and validation reports every bad field at once
//! instead of failing on the first parse error.

use admiral_core::DeploymentId;
use admiral_store::{Deployment, DeploymentState, Service, ServiceState, UnitFile};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Input for creating an application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationParams {
    /// Human-readable name.
    #[serde(default)]
    pub name: Option<String>,
}

impl ApplicationParams {
    /// Parameters for an application with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

/// Input for creating or updating a service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceParams {
    /// Identifier; required for updates, ignored on create.
    #[serde(default)]
    pub id: Option<String>,
    /// Owning application id.
    #[serde(default)]
    pub application: Option<String>,
    /// Human-readable name.
    #[serde(default)]
    pub name: Option<String>,
    /// Service template name.
    #[serde(default)]
    pub template: Option<String>,
    /// Lifecycle state; defaults to `idle`.
    #[serde(default)]
    pub state: Option<ServiceState>,
    /// Replica count.
    #[serde(default)]
    pub units: Option<i64>,
    /// Unit file templates.
    #[serde(default)]
    pub unit_files: Vec<UnitFile>,
}

impl From<Service> for ServiceParams {
    fn from(service: Service) -> Self {
        Self {
            id: Some(service.id.to_string()),
            application: Some(service.application.to_string()),
            name: Some(service.name),
            template: Some(service.template),
            state: Some(service.state),
            units: Some(i64::from(service.units)),
            unit_files: service.unit_files,
        }
    }
}

/// Input for creating or updating a deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentParams {
    /// Identifier; generated on create when absent.
    #[serde(default)]
    pub id: Option<String>,
    /// Owning service id.
    #[serde(default)]
    pub service: Option<String>,
    /// Number of unit file templates.
    #[serde(default)]
    pub units: Option<i64>,
    /// Replicas per template.
    #[serde(default)]
    pub cardinality: Option<i64>,
    /// Lifecycle state; defaults to `uninitialized`.
    #[serde(default)]
    pub state: Option<DeploymentState>,
    /// Generation date; defaults to now.
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

impl From<Deployment> for DeploymentParams {
    fn from(deployment: Deployment) -> Self {
        Self {
            id: Some(deployment.id.to_string()),
            service: Some(deployment.service.to_string()),
            units: Some(i64::from(deployment.units)),
            cardinality: Some(i64::from(deployment.cardinality)),
            state: Some(deployment.state),
            date: Some(deployment.date),
        }
    }
}

/// A deployment named by id, or one the caller already loaded.
#[derive(Debug, Clone)]
pub enum DeploymentRef {
    /// Load the deployment from the store.
    ById(DeploymentId),
    /// Use this record as is.
    Resolved(Deployment),
}

impl From<DeploymentId> for DeploymentRef {
    fn from(id: DeploymentId) -> Self {
        Self::ById(id)
    }
}

impl From<Deployment> for DeploymentRef {
    fn from(deployment: Deployment) -> Self {
        Self::Resolved(deployment)
    }
}

/// Configuration for the control plane.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Retry policy for reconciliation reads against the scheduler.
    #[serde(default)]
    pub retry: RetryPolicy,
}

/// The next `updatedAt` for a record last updated at `previous`.
///
/// Strictly later than `previous` even when the clock has not moved.
#[must_use]
pub fn next_timestamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous {
        Some(previous) if now <= previous => previous + Duration::microseconds(1),
        _ => now,
    }
}
