//! Deployment registry: persistence, reconciliation and scheduling of one
//! deployment generation.
//!
//! Every scheduling operation first persists a transitional state
//! (`starting`, `stopping`, `terminating`) and only persists the settled
//! state after the scheduler accepted the command. A failure in between
//! leaves the transitional state in place for a later call to correct.

use std::collections::HashSet;
use std::sync::Arc;

use admiral_core::{DeploymentId, ServiceId};
use admiral_fleet::{ActiveState, ClusterScheduler, UnitState, UnitTemplate};
use admiral_store::error::codes;
use admiral_store::{
    keys, ConfigStore, ConfigStoreExt, Deployment, DeploymentState, GetOptions, Service,
    StoreError,
};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{ControlError, Result};
use crate::lifecycle::{self, DeploymentAction};
use crate::naming;
use crate::retry::RetryPolicy;
use crate::types::{next_timestamp, DeploymentParams, DeploymentRef};
use crate::validation::ValidationErrors;

/// Validated deployment fields.
struct Validated {
    id: Option<DeploymentId>,
    service: ServiceId,
    units: u32,
    cardinality: u32,
}

fn validate(params: &DeploymentParams, create: bool) -> std::result::Result<Validated, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if create {
        errors.exact_length("id", params.id.as_deref(), admiral_core::ID_LENGTH);
    } else {
        errors.id("id", params.id.as_deref());
    }
    errors.id("service", params.service.as_deref());
    errors.required_count("units", params.units);
    errors.required_count("cardinality", params.cardinality);

    let id = errors.parse("id", params.id.as_deref());
    let service = errors.parse("service", params.service.as_deref());
    let units = params.units.and_then(|v| u32::try_from(v).ok());
    let cardinality = params.cardinality.and_then(|v| u32::try_from(v).ok());

    match (service, units, cardinality) {
        (Some(service), Some(units), Some(cardinality)) if errors.is_empty() => Ok(Validated {
            id,
            service,
            units,
            cardinality,
        }),
        _ => Err(errors),
    }
}

/// Registry of deployments.
#[derive(Clone)]
pub struct DeploymentRegistry {
    store: Arc<dyn ConfigStore>,
    scheduler: Arc<dyn ClusterScheduler>,
    retry: RetryPolicy,
}

impl DeploymentRegistry {
    /// Create a registry over the given store and scheduler.
    #[must_use]
    pub fn new(
        store: Arc<dyn ConfigStore>,
        scheduler: Arc<dyn ClusterScheduler>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            scheduler,
            retry,
        }
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Every deployment of every service, terminated ones included.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn all(&self) -> Result<Vec<Deployment>> {
        match self.store.list_documents::<Deployment>(keys::DEPLOYMENTS).await {
            Ok(deployments) => Ok(deployments),
            Err(StoreError::NotFound(_)) => {
                debug!("Deployments directory missing, creating it");
                match self.store.mkdir(keys::DEPLOYMENTS).await {
                    Ok(_)
                    | Err(StoreError::Rejected {
                        code: codes::NODE_EXISTS,
                        ..
                    }) => Ok(Vec::new()),
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Deployments belonging to any of the given services.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn where_service_is(&self, services: &[ServiceId]) -> Result<Vec<Deployment>> {
        let mut deployments = Vec::new();
        for service in services {
            match self
                .store
                .list_documents::<Deployment>(&keys::service_deployments_path(service))
                .await
            {
                Ok(found) => deployments.extend(found),
                Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(deployments)
    }

    /// Look up one deployment, or `None` if it does not exist.
    ///
    /// Only the matching record is decoded.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the record does not
    /// decode.
    pub async fn get(&self, id: &DeploymentId) -> Result<Option<Deployment>> {
        let tree = match self
            .store
            .get(keys::DEPLOYMENTS, GetOptions::recursive())
            .await
        {
            Ok(tree) => tree,
            Err(StoreError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let suffix = format!("/{id}");
        match tree.leaves().into_iter().find(|leaf| leaf.key.ends_with(&suffix)) {
            Some(leaf) => Ok(self.store.get_document(&leaf.key).await?),
            None => Ok(None),
        }
    }

    /// Turn a reference into a record.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if an id does not name a deployment.
    pub async fn resolve(&self, deployment: impl Into<DeploymentRef>) -> Result<Deployment> {
        match deployment.into() {
            DeploymentRef::Resolved(deployment) => Ok(deployment),
            DeploymentRef::ById(id) => self
                .get(&id)
                .await?
                .ok_or_else(|| ControlError::not_found("deployment", id)),
        }
    }

    /// The service's deployment with the latest `date`, or `None` if it has
    /// never been deployed. Ties keep the first one listed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn last_deployment(&self, service: &ServiceId) -> Result<Option<Deployment>> {
        let deployments = self.where_service_is(std::slice::from_ref(service)).await?;
        Ok(deployments
            .into_iter()
            .fold(None, |latest: Option<Deployment>, d| match latest {
                Some(latest) if d.date <= latest.date => Some(latest),
                _ => Some(d),
            }))
    }

    /// Create a deployment.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Validation` before writing anything if the
    /// parameters are invalid.
    pub async fn create(&self, params: DeploymentParams) -> Result<Deployment> {
        self.write(params, true).await
    }

    /// Update a deployment. The owning service cannot change.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Validation` if the parameters are invalid and
    /// `ControlError::NotFound` if the deployment does not exist.
    pub async fn set(&self, params: DeploymentParams) -> Result<Deployment> {
        self.write(params, false).await
    }

    async fn write(&self, params: DeploymentParams, create: bool) -> Result<Deployment> {
        let valid = validate(&params, create)?;

        let previous = match valid.id {
            Some(id) => self.get(&id).await?,
            None => None,
        };

        match (&previous, valid.id) {
            (Some(_), Some(_)) if create => {
                let mut errors = ValidationErrors::new();
                errors.add("id", "Id has already been taken");
                return Err(errors.into());
            }
            (None, Some(id)) if !create => return Err(ControlError::not_found("deployment", id)),
            (Some(previous), _) if previous.service != valid.service => {
                let mut errors = ValidationErrors::new();
                errors.add("service", "Service cannot be changed");
                return Err(errors.into());
            }
            _ => {}
        }

        let now = Utc::now();
        let deployment = Deployment {
            id: valid.id.unwrap_or_else(DeploymentId::generate),
            service: valid.service,
            units: valid.units,
            cardinality: valid.cardinality,
            state: params
                .state
                .or(previous.as_ref().map(|p| p.state))
                .unwrap_or(DeploymentState::Uninitialized),
            date: params
                .date
                .or(previous.as_ref().map(|p| p.date))
                .unwrap_or(now),
            created_at: previous.as_ref().map_or(now, |p| p.created_at),
            updated_at: next_timestamp(previous.as_ref().map(|p| p.updated_at)),
        };

        self.store
            .put_document(
                &keys::deployment_path(&deployment.service, &deployment.id),
                &deployment,
            )
            .await?;

        if create {
            info!(
                deployment_id = %deployment.id,
                service_id = %deployment.service,
                units = deployment.units,
                cardinality = deployment.cardinality,
                "Deployment created"
            );
        } else {
            debug!(deployment_id = %deployment.id, "Deployment updated");
        }

        Ok(deployment)
    }

    /// Persist a new state on a record this registry already holds.
    async fn transition(
        &self,
        mut deployment: Deployment,
        state: DeploymentState,
    ) -> Result<Deployment> {
        let from = deployment.state;
        deployment.state = state;
        deployment.updated_at = next_timestamp(Some(deployment.updated_at));

        self.store
            .put_document(
                &keys::deployment_path(&deployment.service, &deployment.id),
                &deployment,
            )
            .await?;

        info!(
            deployment_id = %deployment.id,
            service_id = %deployment.service,
            from = %from,
            to = %state,
            "Deployment state changed"
        );
        Ok(deployment)
    }

    async fn service_of(&self, deployment: &Deployment) -> Result<Service> {
        self.store
            .get_document::<Service>(&keys::service_path(&deployment.service))
            .await?
            .ok_or_else(|| ControlError::not_found("service", deployment.service))
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    async fn live_units(&self) -> Result<Vec<UnitState>> {
        Ok(self
            .retry
            .run("list_units", || self.scheduler.list_units())
            .await?)
    }

    async fn count_running(&self, deployment: &Deployment) -> Result<usize> {
        let units = self.live_units().await?;
        Ok(units
            .iter()
            .filter(|u| u.is_running() && naming::belongs_to_deployment(&u.name, &deployment.id))
            .count())
    }

    async fn submitted(&self, service: &Service, deployment: &Deployment) -> Result<Vec<UnitState>> {
        let units = self.live_units().await?;
        Ok(naming::submitted_units(service, deployment, units))
    }

    /// Number of the deployment's units the scheduler reports as running.
    ///
    /// # Errors
    ///
    /// Returns an error if the deployment cannot be resolved or the
    /// scheduler cannot be listed.
    pub async fn running_units(&self, deployment: impl Into<DeploymentRef>) -> Result<usize> {
        let deployment = self.resolve(deployment).await?;
        self.count_running(&deployment).await
    }

    /// The deployment's effective state.
    ///
    /// A persisted `running` is checked against the scheduler and comes back
    /// as `partially running` unless every expected unit is up. Other states
    /// are returned as stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the deployment cannot be resolved or the
    /// scheduler cannot be listed.
    pub async fn state(&self, deployment: impl Into<DeploymentRef>) -> Result<DeploymentState> {
        let deployment = self.resolve(deployment).await?;
        if deployment.state != DeploymentState::Running {
            return Ok(deployment.state);
        }

        let running = self.count_running(&deployment).await?;
        let expected = deployment.expected_units();
        debug!(deployment_id = %deployment.id, running, expected, "Reconciled deployment");

        Ok(if running == expected {
            DeploymentState::Running
        } else {
            DeploymentState::PartiallyRunning
        })
    }

    /// Live units created for this deployment from the service's unit files,
    /// whatever their runtime state.
    ///
    /// # Errors
    ///
    /// Returns an error if the deployment or its service cannot be resolved,
    /// or the scheduler cannot be listed.
    pub async fn submitted_units(
        &self,
        deployment: impl Into<DeploymentRef>,
    ) -> Result<Vec<UnitState>> {
        let deployment = self.resolve(deployment).await?;
        let service = self.service_of(&deployment).await?;
        self.submitted(&service, &deployment).await
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Register the service's unit files with the scheduler, replacing any
    /// template of the same name, and mark the deployment `initialized`.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Conflict` for a terminating or terminated
    /// deployment, or an upstream error.
    pub async fn submit(&self, deployment: impl Into<DeploymentRef>) -> Result<Deployment> {
        let deployment = self.resolve(deployment).await?;
        lifecycle::guard_deployment(&deployment.id, deployment.state, DeploymentAction::Submit)?;

        let service = self.service_of(&deployment).await?;
        let templates: Vec<UnitTemplate> = service
            .unit_files
            .iter()
            .map(|f| UnitTemplate {
                name: naming::template_name(&f.id),
                content: f.content.clone(),
            })
            .collect();

        let wanted: HashSet<&str> = templates.iter().map(|t| t.name.as_str()).collect();
        let stale: Vec<String> = self
            .scheduler
            .list_unit_files()
            .await?
            .into_iter()
            .map(|f| f.name)
            .filter(|name| wanted.contains(name.as_str()))
            .collect();

        if !stale.is_empty() {
            debug!(deployment_id = %deployment.id, count = stale.len(), "Destroying stale templates");
            self.scheduler.destroy(&stale).await?;
        }

        self.scheduler.submit(&templates).await?;
        self.transition(deployment, DeploymentState::Initialized).await
    }

    /// Schedule the deployment's units.
    ///
    /// With `start_partial`, units that are already running are left alone
    /// and only the missing ones are scheduled; when none are missing the
    /// scheduler is not called. Without it, a deployment with some but not
    /// all units running is a conflict.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Conflict` if the deployment cannot start from
    /// its state or is partially running without `start_partial`, or an
    /// upstream error.
    pub async fn start(
        &self,
        deployment: impl Into<DeploymentRef>,
        start_partial: bool,
    ) -> Result<Deployment> {
        let deployment = self.resolve(deployment).await?;
        lifecycle::guard_deployment(&deployment.id, deployment.state, DeploymentAction::Start)?;

        let deployment = self
            .transition(deployment, DeploymentState::Starting)
            .await?;
        let service = self.service_of(&deployment).await?;

        let mut desired = naming::desired_units(&deployment, &service.unit_file_ids());
        let running: HashSet<String> = self
            .submitted(&service, &deployment)
            .await?
            .into_iter()
            .filter(UnitState::is_running)
            .map(|u| u.name)
            .collect();

        if start_partial {
            desired.retain(|unit| !running.contains(unit));
        } else if !running.is_empty() && running.len() < deployment.expected_units() {
            warn!(
                deployment_id = %deployment.id,
                running = running.len(),
                expected = deployment.expected_units(),
                "Refusing to start a partially running deployment"
            );
            return Err(ControlError::conflict(
                "The service is only partially running and cannot be started directly.",
            ));
        }

        if desired.is_empty() {
            debug!(deployment_id = %deployment.id, "Every unit already running");
        } else {
            self.scheduler.start(&desired).await?;
            info!(deployment_id = %deployment.id, count = desired.len(), "Scheduled units");
        }

        self.transition(deployment, DeploymentState::Running).await
    }

    /// Stop the deployment's running and starting units.
    ///
    /// Ends `initialized` when every submitted unit is stopped afterwards,
    /// `partially running` when some unit is left in another state (failed,
    /// for example).
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Conflict` for a terminating or terminated
    /// deployment, or an upstream error.
    pub async fn stop(&self, deployment: impl Into<DeploymentRef>) -> Result<Deployment> {
        let deployment = self.resolve(deployment).await?;
        lifecycle::guard_deployment(&deployment.id, deployment.state, DeploymentAction::Stop)?;

        let deployment = self
            .transition(deployment, DeploymentState::Stopping)
            .await?;
        let service = self.service_of(&deployment).await?;

        let (targets, rest): (Vec<UnitState>, Vec<UnitState>) = self
            .submitted(&service, &deployment)
            .await?
            .into_iter()
            .partition(|u| u.is_running() || u.is_starting());
        let targets: Vec<String> = targets.into_iter().map(|u| u.name).collect();

        if !targets.is_empty() {
            self.scheduler.stop(&targets).await?;
        }

        let unclean = rest
            .iter()
            .filter(|u| u.active_state != ActiveState::Inactive)
            .count();
        let state = if unclean == 0 {
            DeploymentState::Initialized
        } else {
            warn!(deployment_id = %deployment.id, unclean, "Some units did not stop cleanly");
            DeploymentState::PartiallyRunning
        };

        self.transition(deployment, state).await
    }

    /// Destroy every unit of the deployment and mark it `terminated`. A
    /// terminated deployment is history: it never starts again.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Conflict` for an already terminated
    /// deployment, or an upstream error.
    pub async fn terminate(&self, deployment: impl Into<DeploymentRef>) -> Result<Deployment> {
        let deployment = self.resolve(deployment).await?;
        lifecycle::guard_deployment(&deployment.id, deployment.state, DeploymentAction::Terminate)?;

        let deployment = self
            .transition(deployment, DeploymentState::Terminating)
            .await?;

        let live = self.live_units().await?;
        let units: Vec<String> = match self
            .store
            .get_document::<Service>(&keys::service_path(&deployment.service))
            .await?
        {
            Some(service) => naming::submitted_units(&service, &deployment, live),
            None => live
                .into_iter()
                .filter(|u| naming::belongs_to_deployment(&u.name, &deployment.id))
                .collect(),
        }
        .into_iter()
        .map(|u| u.name)
        .collect();

        if !units.is_empty() {
            self.scheduler.destroy(&units).await?;
            info!(deployment_id = %deployment.id, count = units.len(), "Destroyed units");
        }

        self.transition(deployment, DeploymentState::Terminated)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admiral_core::{ApplicationId, UnitFileId};
    use admiral_fleet::{InMemoryScheduler, SchedulerCall};
    use admiral_store::{RocksStore, ServiceState, UnitFile};
    use tempfile::TempDir;

    struct Harness {
        registry: DeploymentRegistry,
        store: Arc<RocksStore>,
        scheduler: Arc<InMemoryScheduler>,
        _dir: TempDir,
    }

    fn setup() -> Harness {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let scheduler = Arc::new(InMemoryScheduler::new());
        let registry = DeploymentRegistry::new(
            store.clone(),
            scheduler.clone(),
            RetryPolicy::none(),
        );
        Harness {
            registry,
            store,
            scheduler,
            _dir: dir,
        }
    }

    async fn service(h: &Harness, unit_files: usize, units: u32) -> Service {
        let now = Utc::now();
        let service = Service {
            id: ServiceId::generate(),
            application: ApplicationId::generate(),
            name: "web".to_string(),
            template: "fleetunits".to_string(),
            state: ServiceState::Idle,
            units,
            unit_files: (0..unit_files)
                .map(|i| UnitFile {
                    id: UnitFileId::generate(),
                    content: format!("[Service]\nExecStart=/bin/worker {i}\n"),
                })
                .collect(),
            created_at: now,
            updated_at: now,
            changed_at: None,
        };
        h.store
            .put_document(&keys::service_path(&service.id), &service)
            .await
            .unwrap();
        service
    }

    async fn deployment(h: &Harness, service: &Service) -> Deployment {
        h.registry
            .create(DeploymentParams {
                service: Some(service.id.to_string()),
                units: Some(i64::try_from(service.unit_files.len()).unwrap()),
                cardinality: Some(i64::from(service.units)),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    async fn running(h: &Harness, service: &Service) -> Deployment {
        let d = deployment(h, service).await;
        let d = h.registry.submit(d).await.unwrap();
        h.registry.start(d, false).await.unwrap()
    }

    // =========================================================================
    // Records
    // =========================================================================

    #[tokio::test]
    async fn create_validates_before_writing() {
        let h = setup();
        let result = h
            .registry
            .create(DeploymentParams {
                service: Some("short".to_string()),
                units: Some(-1),
                ..Default::default()
            })
            .await;

        match result {
            Err(ControlError::Validation(errors)) => {
                assert!(!errors.field("service").is_empty());
                assert!(!errors.field("units").is_empty());
                assert!(!errors.field("cardinality").is_empty());
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(h.registry.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_and_lookup() {
        let h = setup();
        let s = service(&h, 1, 2).await;
        let d = deployment(&h, &s).await;

        assert_eq!(d.state, DeploymentState::Uninitialized);
        assert_eq!(d.expected_units(), 2);
        assert_eq!(h.registry.get(&d.id).await.unwrap(), Some(d.clone()));
        assert_eq!(
            h.registry.where_service_is(&[s.id]).await.unwrap(),
            vec![d.clone()]
        );
        assert!(h
            .registry
            .where_service_is(&[ServiceId::generate()])
            .await
            .unwrap()
            .is_empty());
        assert!(h.registry.get(&DeploymentId::generate()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lookups_only_decode_their_own_records() {
        let h = setup();
        let s = service(&h, 1, 1).await;
        let d = deployment(&h, &s).await;

        let other = ServiceId::generate();
        h.store
            .set(
                &keys::deployment_path(&other, &DeploymentId::generate()),
                "not json",
            )
            .await
            .unwrap();

        assert_eq!(h.registry.get(&d.id).await.unwrap(), Some(d.clone()));
        assert_eq!(h.registry.last_deployment(&s.id).await.unwrap(), Some(d.clone()));
        assert_eq!(
            h.registry.where_service_is(&[s.id]).await.unwrap(),
            vec![d]
        );
        assert!(h.registry.where_service_is(&[other]).await.is_err());
    }

    #[tokio::test]
    async fn missing_directory_is_created_on_first_listing() {
        let h = setup();
        assert!(h.registry.all().await.unwrap().is_empty());

        let node = h
            .store
            .get(keys::DEPLOYMENTS, admiral_store::GetOptions::default())
            .await
            .unwrap();
        assert!(node.dir);
        assert!(h.registry.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_keeps_service_immutable_and_advances_updated_at() {
        let h = setup();
        let s = service(&h, 1, 1).await;
        let d = deployment(&h, &s).await;

        let mut params = DeploymentParams::from(d.clone());
        params.cardinality = Some(4);
        let updated = h.registry.set(params).await.unwrap();
        assert_eq!(updated.cardinality, 4);
        assert!(updated.updated_at > d.updated_at);
        assert_eq!(updated.created_at, d.created_at);

        let mut params = DeploymentParams::from(updated);
        params.service = Some(ServiceId::generate().to_string());
        let result = h.registry.set(params).await;
        assert!(matches!(result, Err(ControlError::Validation(ref e)) if !e.field("service").is_empty()));
    }

    #[tokio::test]
    async fn set_unknown_deployment_is_not_found() {
        let h = setup();
        let result = h
            .registry
            .set(DeploymentParams {
                id: Some(DeploymentId::generate().to_string()),
                service: Some(ServiceId::generate().to_string()),
                units: Some(1),
                cardinality: Some(1),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(ControlError::NotFound { kind: "deployment", .. })));
    }

    #[tokio::test]
    async fn last_deployment_picks_latest_date() {
        let h = setup();
        let s = service(&h, 1, 1).await;
        assert!(h.registry.last_deployment(&s.id).await.unwrap().is_none());

        let early = Utc::now() - chrono::Duration::hours(1);
        for date in [early, Utc::now(), early] {
            h.registry
                .create(DeploymentParams {
                    service: Some(s.id.to_string()),
                    units: Some(1),
                    cardinality: Some(1),
                    date: Some(date),
                    ..Default::default()
                })
                .await
                .unwrap();
        }

        let latest = h.registry.last_deployment(&s.id).await.unwrap().unwrap();
        assert!(latest.date > early);
    }

    #[tokio::test]
    async fn resolve_by_id() {
        let h = setup();
        let s = service(&h, 1, 1).await;
        let d = deployment(&h, &s).await;

        assert_eq!(h.registry.resolve(d.id).await.unwrap().id, d.id);
        let missing = h.registry.resolve(DeploymentId::generate()).await;
        assert!(matches!(missing, Err(ControlError::NotFound { .. })));
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    #[tokio::test]
    async fn submit_registers_templates() {
        let h = setup();
        let s = service(&h, 2, 1).await;
        let d = h.registry.submit(deployment(&h, &s).await).await.unwrap();

        assert_eq!(d.state, DeploymentState::Initialized);
        let mut expected: Vec<String> = s.unit_files.iter().map(|f| naming::template_name(&f.id)).collect();
        expected.sort();
        assert_eq!(h.scheduler.templates(), expected);
    }

    #[tokio::test]
    async fn resubmit_replaces_changed_templates() {
        let h = setup();
        let mut s = service(&h, 1, 1).await;
        let d = h.registry.submit(deployment(&h, &s).await).await.unwrap();

        s.unit_files[0].content = "[Service]\nExecStart=/bin/v2\n".to_string();
        h.store
            .put_document(&keys::service_path(&s.id), &s)
            .await
            .unwrap();

        h.registry.submit(d).await.unwrap();
        let template = naming::template_name(&s.unit_files[0].id);
        assert_eq!(
            h.scheduler.template_content(&template).as_deref(),
            Some("[Service]\nExecStart=/bin/v2\n")
        );
        assert!(h
            .scheduler
            .calls()
            .contains(&SchedulerCall::Destroy(vec![template])));
    }

    #[tokio::test]
    async fn start_schedules_every_desired_unit() {
        let h = setup();
        let s = service(&h, 1, 2).await;
        let d = running(&h, &s).await;

        assert_eq!(d.state, DeploymentState::Running);
        assert_eq!(h.scheduler.start_calls().len(), 1);
        assert_eq!(h.scheduler.start_calls()[0].len(), 2);
        assert_eq!(h.registry.running_units(d.clone()).await.unwrap(), 2);
        assert_eq!(h.registry.state(d).await.unwrap(), DeploymentState::Running);
    }

    #[tokio::test]
    async fn crashed_unit_makes_deployment_partially_running() {
        let h = setup();
        let s = service(&h, 1, 2).await;
        let d = running(&h, &s).await;

        h.scheduler
            .fail_unit(&naming::unit_name(&s.unit_files[0].id, &d.id, 1));

        assert_eq!(h.registry.running_units(d.id).await.unwrap(), 1);
        assert_eq!(
            h.registry.state(d.id).await.unwrap(),
            DeploymentState::PartiallyRunning
        );
        // The persisted state is untouched by reconciliation.
        assert_eq!(
            h.registry.get(&d.id).await.unwrap().unwrap().state,
            DeploymentState::Running
        );
    }

    #[tokio::test]
    async fn partial_start_requires_start_partial() {
        let h = setup();
        let s = service(&h, 1, 2).await;
        let d = running(&h, &s).await;
        let missing = naming::unit_name(&s.unit_files[0].id, &d.id, 1);
        h.scheduler.fail_unit(&missing);
        h.scheduler.clear_calls();

        let result = h.registry.start(d.id, false).await;
        assert!(matches!(result, Err(ControlError::Conflict(_))));
        assert!(h.scheduler.start_calls().is_empty());
        // Left in the transitional state.
        assert_eq!(
            h.registry.get(&d.id).await.unwrap().unwrap().state,
            DeploymentState::Starting
        );

        let d = h.registry.start(d.id, true).await.unwrap();
        assert_eq!(d.state, DeploymentState::Running);
        assert_eq!(h.scheduler.start_calls(), vec![vec![missing]]);
    }

    #[tokio::test]
    async fn start_partial_is_idempotent_when_fully_running() {
        let h = setup();
        let s = service(&h, 2, 2).await;
        let d = running(&h, &s).await;
        h.scheduler.clear_calls();

        let d = h.registry.start(d, true).await.unwrap();
        h.registry.start(d, true).await.unwrap();
        assert!(h.scheduler.start_calls().is_empty());
    }

    #[tokio::test]
    async fn uninitialized_deployment_cannot_start() {
        let h = setup();
        let s = service(&h, 1, 1).await;
        let d = deployment(&h, &s).await;

        let result = h.registry.start(d, false).await;
        assert!(matches!(result, Err(ControlError::Conflict(_))));
    }

    #[tokio::test]
    async fn unsubmitted_deployment_cannot_be_stopped() {
        let h = setup();
        let s = service(&h, 1, 2).await;
        let d = deployment(&h, &s).await;

        assert!(matches!(
            h.registry.stop(d.id).await,
            Err(ControlError::Conflict(_))
        ));
        assert_eq!(
            h.registry.get(&d.id).await.unwrap().unwrap().state,
            DeploymentState::Uninitialized
        );
        assert!(h.scheduler.calls().is_empty());
    }

    #[tokio::test]
    async fn stop_settles_in_initialized() {
        let h = setup();
        let s = service(&h, 1, 3).await;
        let d = running(&h, &s).await;

        let d = h.registry.stop(d).await.unwrap();
        assert_eq!(d.state, DeploymentState::Initialized);
        assert_eq!(h.registry.running_units(d.id).await.unwrap(), 0);
        assert!(matches!(
            h.scheduler.calls().last(),
            Some(SchedulerCall::Stop(units)) if units.len() == 3
        ));

        // Stopping again finds nothing to stop and stays clean.
        let d = h.registry.stop(d).await.unwrap();
        assert_eq!(d.state, DeploymentState::Initialized);
    }

    #[tokio::test]
    async fn stop_with_failed_unit_is_partial() {
        let h = setup();
        let s = service(&h, 1, 2).await;
        let d = running(&h, &s).await;
        h.scheduler
            .fail_unit(&naming::unit_name(&s.unit_files[0].id, &d.id, 0));

        let d = h.registry.stop(d).await.unwrap();
        assert_eq!(d.state, DeploymentState::PartiallyRunning);
    }

    #[tokio::test]
    async fn terminate_is_final() {
        let h = setup();
        let s = service(&h, 1, 2).await;
        let d = running(&h, &s).await;

        let d = h.registry.terminate(d).await.unwrap();
        assert_eq!(d.state, DeploymentState::Terminated);
        assert!(h.scheduler.unit_names().is_empty());
        // Templates belong to the service and survive.
        assert_eq!(h.scheduler.templates().len(), 1);

        for result in [
            h.registry.start(d.id, true).await,
            h.registry.stop(d.id).await,
            h.registry.submit(d.id).await,
            h.registry.terminate(d.id).await,
        ] {
            assert!(matches!(result, Err(ControlError::Conflict(_))));
        }
    }

    #[tokio::test]
    async fn terminate_without_service_record_uses_unit_names() {
        let h = setup();
        let s = service(&h, 1, 1).await;
        let d = running(&h, &s).await;
        h.store
            .del(&keys::service_path(&s.id), admiral_store::DeleteOptions::default())
            .await
            .unwrap();

        h.registry.terminate(d).await.unwrap();
        assert!(h.scheduler.unit_names().is_empty());
    }

    #[tokio::test]
    async fn scheduler_failure_leaves_transitional_state() {
        let h = setup();
        let s = service(&h, 1, 1).await;
        let d = h.registry.submit(deployment(&h, &s).await).await.unwrap();

        h.scheduler.fail_next_start("fleet unavailable");
        let result = h.registry.start(d.id, false).await;
        assert!(matches!(result, Err(ControlError::Scheduler(_))));
        assert_eq!(
            h.registry.get(&d.id).await.unwrap().unwrap().state,
            DeploymentState::Starting
        );
    }

    #[tokio::test]
    async fn reconciliation_reads_are_retried() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let scheduler = Arc::new(InMemoryScheduler::new());
        let registry = DeploymentRegistry::new(
            store.clone(),
            scheduler.clone(),
            RetryPolicy {
                max_attempts: 3,
                initial_backoff_ms: 1,
            },
        );
        let h = Harness {
            registry,
            store,
            scheduler,
            _dir: dir,
        };
        let s = service(&h, 1, 1).await;
        let d = running(&h, &s).await;

        h.scheduler.fail_next_list_units(2);
        assert_eq!(h.registry.running_units(d.id).await.unwrap(), 1);

        h.scheduler.fail_next_list_units(3);
        assert!(h.registry.running_units(d.id).await.is_err());
    }
}
