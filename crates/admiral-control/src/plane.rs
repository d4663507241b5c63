//! The assembled control plane.

use std::sync::Arc;

use admiral_fleet::{ClusterScheduler, Machine};
use admiral_store::ConfigStore;

use crate::applications::ApplicationRegistry;
use crate::deployments::DeploymentRegistry;
use crate::error::Result;
use crate::services::ServiceRegistry;
use crate::types::ControlConfig;

/// The three registries wired to one config store and one scheduler.
#[derive(Clone)]
pub struct ControlPlane {
    applications: ApplicationRegistry,
    services: ServiceRegistry,
    deployments: DeploymentRegistry,
    scheduler: Arc<dyn ClusterScheduler>,
}

impl ControlPlane {
    /// Wire the registries together.
    #[must_use]
    pub fn new(
        store: Arc<dyn ConfigStore>,
        scheduler: Arc<dyn ClusterScheduler>,
        config: ControlConfig,
    ) -> Self {
        let deployments =
            DeploymentRegistry::new(Arc::clone(&store), Arc::clone(&scheduler), config.retry);
        let services = ServiceRegistry::new(
            Arc::clone(&store),
            Arc::clone(&scheduler),
            deployments.clone(),
        );
        let applications = ApplicationRegistry::new(store, services.clone());

        Self {
            applications,
            services,
            deployments,
            scheduler,
        }
    }

    /// The application registry.
    #[must_use]
    pub const fn applications(&self) -> &ApplicationRegistry {
        &self.applications
    }

    /// The service registry.
    #[must_use]
    pub const fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    /// The deployment registry.
    #[must_use]
    pub const fn deployments(&self) -> &DeploymentRegistry {
        &self.deployments
    }

    /// Machines in the cluster.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Scheduler` if the scheduler cannot be reached.
    pub async fn machines(&self) -> Result<Vec<Machine>> {
        Ok(self.scheduler.list_machines().await?)
    }
}
