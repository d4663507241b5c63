//! Service registry: records and the service state machine.
//!
//! State transitions (`start`, `stop`, `unload`, `terminate`) and deletion
//! hold the service's lock for their whole duration, so concurrent requests
//! against one service run one after another.

use std::sync::Arc;

use admiral_core::{ApplicationId, ServiceId};
use admiral_fleet::ClusterScheduler;
use admiral_store::{
    keys, ConfigStore, ConfigStoreExt, Deployment, DeleteOptions, Service, ServiceState,
    StoreError,
};
use chrono::Utc;
use futures::future::try_join_all;
use tracing::{debug, info};

use crate::deployments::DeploymentRegistry;
use crate::error::{ControlError, Result};
use crate::lifecycle::{self, DeploymentAction, StartDecision};
use crate::locks::ServiceLocks;
use crate::naming;
use crate::templates::ServiceTemplate;
use crate::types::{next_timestamp, DeploymentParams, ServiceParams};
use crate::validation::{ValidationErrors, NAME_MAX_LENGTH};

/// Replica count for services created without one.
pub const DEFAULT_UNITS: u32 = 1;
/// Largest replica count a service accepts.
pub const MAX_UNITS: u32 = 100;

struct Validated {
    id: Option<ServiceId>,
    application: ApplicationId,
    name: String,
    template: String,
    units: u32,
}

fn validate(params: &ServiceParams, create: bool) -> std::result::Result<Validated, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if !create {
        errors.id("id", params.id.as_deref());
    }
    errors.presence("name", params.name.as_deref());
    errors.max_length("name", params.name.as_deref(), NAME_MAX_LENGTH);
    errors.id("application", params.application.as_deref());
    errors.presence("template", params.template.as_deref());
    errors.max_length("template", params.template.as_deref(), NAME_MAX_LENGTH);
    errors.count_at_most("units", params.units, MAX_UNITS);

    if let Some(template) = params.template.as_deref() {
        if errors.field("template").is_empty() && ServiceTemplate::from_name(template).is_none() {
            errors.add("template", "Template is not a known service template");
        }
    }

    let id = if create {
        None
    } else {
        errors.parse("id", params.id.as_deref())
    };
    let application = errors.parse("application", params.application.as_deref());
    let units = match params.units {
        Some(units) => u32::try_from(units).ok(),
        None => Some(DEFAULT_UNITS),
    };

    match (application, &params.name, &params.template, units) {
        (Some(application), Some(name), Some(template), Some(units)) if errors.is_empty() => {
            Ok(Validated {
                id,
                application,
                name: name.clone(),
                template: template.clone(),
                units,
            })
        }
        _ => Err(errors),
    }
}

/// Registry of services.
#[derive(Clone)]
pub struct ServiceRegistry {
    store: Arc<dyn ConfigStore>,
    scheduler: Arc<dyn ClusterScheduler>,
    deployments: DeploymentRegistry,
    locks: Arc<ServiceLocks>,
}

impl ServiceRegistry {
    /// Create a registry that schedules through `deployments`.
    #[must_use]
    pub fn new(
        store: Arc<dyn ConfigStore>,
        scheduler: Arc<dyn ClusterScheduler>,
        deployments: DeploymentRegistry,
    ) -> Self {
        Self {
            store,
            scheduler,
            deployments,
            locks: Arc::new(ServiceLocks::new()),
        }
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Every service.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn all(&self) -> Result<Vec<Service>> {
        match self.store.list_documents(keys::SERVICES).await {
            Ok(services) => Ok(services),
            Err(StoreError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Services owned by an application.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn where_application_is(&self, application: &ApplicationId) -> Result<Vec<Service>> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|s| s.application == *application)
            .collect())
    }

    /// Look up one service, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn get(&self, id: &ServiceId) -> Result<Option<Service>> {
        Ok(self.store.get_document(&keys::service_path(id)).await?)
    }

    async fn require(&self, id: &ServiceId) -> Result<Service> {
        self.get(id)
            .await?
            .ok_or_else(|| ControlError::not_found("service", id))
    }

    /// Create a service in the `idle` state.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Validation` before writing anything if the
    /// parameters are invalid.
    pub async fn create(&self, params: ServiceParams) -> Result<Service> {
        self.write(params, true).await
    }

    /// Update a service. The owning application cannot change.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Validation` if the parameters are invalid and
    /// `ControlError::NotFound` if the service does not exist.
    pub async fn set(&self, params: ServiceParams) -> Result<Service> {
        self.write(params, false).await
    }

    async fn write(&self, params: ServiceParams, create: bool) -> Result<Service> {
        let valid = validate(&params, create)?;

        let previous = match valid.id {
            Some(id) => Some(self.require(&id).await?),
            None => None,
        };
        if let Some(previous) = &previous {
            if previous.application != valid.application {
                let mut errors = ValidationErrors::new();
                errors.add("application", "Application cannot be changed");
                return Err(errors.into());
            }
        }

        let now = Utc::now();
        let state = params
            .state
            .or(previous.as_ref().map(|p| p.state))
            .unwrap_or(ServiceState::Idle);
        let updated_at = next_timestamp(previous.as_ref().map(|p| p.updated_at));
        let changed_at = match &previous {
            Some(previous) if previous.state != state => Some(updated_at),
            Some(previous) => previous.changed_at,
            None => None,
        };

        let service = Service {
            id: valid.id.unwrap_or_else(ServiceId::generate),
            application: valid.application,
            name: valid.name,
            template: valid.template,
            state,
            units: valid.units,
            unit_files: params.unit_files,
            created_at: previous.as_ref().map_or(now, |p| p.created_at),
            updated_at,
            changed_at,
        };

        self.store
            .put_document(&keys::service_path(&service.id), &service)
            .await?;

        if create {
            info!(
                service_id = %service.id,
                application_id = %service.application,
                name = %service.name,
                "Service created"
            );
        } else {
            debug!(service_id = %service.id, "Service updated");
        }

        Ok(service)
    }

    /// Delete a service record.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the service does not exist.
    pub async fn del(&self, id: &ServiceId) -> Result<()> {
        let _guard = self.locks.acquire(*id).await;

        match self
            .store
            .del(&keys::service_path(id), DeleteOptions::default())
            .await
        {
            Ok(()) => {
                info!(service_id = %id, "Service deleted");
                Ok(())
            }
            Err(StoreError::NotFound(_)) => Err(ControlError::not_found("service", id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist a new state, re-reading the record first.
    async fn transition(&self, id: &ServiceId, state: ServiceState) -> Result<Service> {
        let mut service = self.require(id).await?;
        let from = service.state;

        service.state = state;
        service.updated_at = next_timestamp(Some(service.updated_at));
        if from != state {
            service.changed_at = Some(service.updated_at);
        }

        self.store
            .put_document(&keys::service_path(id), &service)
            .await?;

        info!(service_id = %id, from = %from, to = %state, "Service state changed");
        Ok(service)
    }

    // =========================================================================
    // State machine
    // =========================================================================

    /// Start the service.
    ///
    /// Reuses the latest deployment when it is `initialized` (or partially
    /// running and `start_partial` is set); otherwise creates a new
    /// deployment sized from the service. Templates are submitted, the
    /// deployment is started, and its resulting state is mirrored onto the
    /// service.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` for an unknown service,
    /// `ControlError::Conflict` if the service is terminated or its latest
    /// deployment is running or mid-transition, or an upstream error.
    pub async fn start(&self, id: &ServiceId, start_partial: bool) -> Result<Deployment> {
        let _guard = self.locks.acquire(*id).await;

        let service = self.require(id).await?;
        lifecycle::guard_service(id, service.state)?;

        let latest = self.deployments.last_deployment(id).await?;
        let latest_state = match &latest {
            Some(deployment) => Some(self.deployments.state(deployment.clone()).await?),
            None => None,
        };

        let deployment = match (lifecycle::decide_start(latest_state, start_partial)?, latest) {
            (StartDecision::Reuse, Some(deployment)) => deployment,
            _ => {
                self.deployments
                    .create(DeploymentParams {
                        service: Some(service.id.to_string()),
                        units: Some(i64::try_from(service.unit_files.len()).unwrap_or(i64::MAX)),
                        cardinality: Some(i64::from(service.units)),
                        ..Default::default()
                    })
                    .await?
            }
        };

        let deployment = self.deployments.submit(deployment).await?;
        self.transition(id, ServiceState::Starting).await?;
        let deployment = self.deployments.start(deployment, start_partial).await?;
        self.transition(id, lifecycle::service_state_for(deployment.state))
            .await?;

        Ok(deployment)
    }

    /// Stop every deployment of the service that can still be stopped.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` for an unknown service,
    /// `ControlError::Conflict` for a terminated one, or an upstream error.
    pub async fn stop(&self, id: &ServiceId) -> Result<Service> {
        let _guard = self.locks.acquire(*id).await;

        let service = self.require(id).await?;
        lifecycle::guard_service(id, service.state)?;

        let deployments: Vec<Deployment> = self
            .deployments
            .where_service_is(&[*id])
            .await?
            .into_iter()
            .filter(|d| DeploymentAction::Stop.allowed_from(d.state))
            .collect();

        self.transition(id, ServiceState::Stopping).await?;
        try_join_all(deployments.into_iter().map(|d| self.deployments.stop(d))).await?;
        self.transition(id, ServiceState::Stopped).await
    }

    /// Terminate every deployment of the service, keeping its templates so
    /// it can start again.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` for an unknown service,
    /// `ControlError::Conflict` for a terminated one, or an upstream error.
    pub async fn unload(&self, id: &ServiceId) -> Result<Service> {
        let _guard = self.locks.acquire(*id).await;
        self.unload_locked(id).await
    }

    async fn unload_locked(&self, id: &ServiceId) -> Result<Service> {
        let service = self.require(id).await?;
        lifecycle::guard_service(id, service.state)?;

        self.transition(id, ServiceState::Unloading).await?;

        let deployments: Vec<Deployment> = self
            .deployments
            .where_service_is(&[*id])
            .await?
            .into_iter()
            .filter(|d| !lifecycle::is_terminal(d.state))
            .collect();
        try_join_all(deployments.into_iter().map(|d| self.deployments.terminate(d))).await?;

        self.transition(id, ServiceState::Initialized).await
    }

    /// Unload the service and destroy its templates. A terminated service
    /// never runs again.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` for an unknown service,
    /// `ControlError::Conflict` for one already terminated, or an upstream
    /// error.
    pub async fn terminate(&self, id: &ServiceId) -> Result<Service> {
        let _guard = self.locks.acquire(*id).await;

        let service = self.unload_locked(id).await?;
        self.transition(id, ServiceState::Terminating).await?;

        let templates: Vec<String> = service
            .unit_files
            .iter()
            .map(|f| naming::template_name(&f.id))
            .collect();
        if !templates.is_empty() {
            self.scheduler.destroy(&templates).await?;
        }

        self.transition(id, ServiceState::Terminated).await
    }
}
