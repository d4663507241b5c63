//! Application registry.

use std::sync::Arc;

use admiral_core::ApplicationId;
use admiral_store::{keys, Application, ConfigStore, ConfigStoreExt, DeleteOptions, Service, StoreError};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{ControlError, Result};
use crate::services::ServiceRegistry;
use crate::types::ApplicationParams;
use crate::validation::{ValidationErrors, NAME_MAX_LENGTH};

/// Registry of applications.
#[derive(Clone)]
pub struct ApplicationRegistry {
    store: Arc<dyn ConfigStore>,
    services: ServiceRegistry,
}

impl ApplicationRegistry {
    /// Create a registry that cascades deletes into `services`.
    #[must_use]
    pub fn new(store: Arc<dyn ConfigStore>, services: ServiceRegistry) -> Self {
        Self { store, services }
    }

    /// Every application.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn all(&self) -> Result<Vec<Application>> {
        match self.store.list_documents(keys::APPLICATIONS).await {
            Ok(applications) => Ok(applications),
            Err(StoreError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Look up one application, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn get(&self, id: &ApplicationId) -> Result<Option<Application>> {
        Ok(self.store.get_document(&keys::application_path(id)).await?)
    }

    /// Create an application.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Validation` if the name is blank or longer
    /// than 36 characters.
    pub async fn create(&self, params: ApplicationParams) -> Result<Application> {
        let mut errors = ValidationErrors::new();
        errors.presence("name", params.name.as_deref());
        errors.max_length("name", params.name.as_deref(), NAME_MAX_LENGTH);
        errors.into_result()?;

        let application = Application {
            id: ApplicationId::generate(),
            name: params.name.unwrap_or_default(),
            created_at: Utc::now(),
        };
        self.store
            .put_document(&keys::application_path(&application.id), &application)
            .await?;

        info!(application_id = %application.id, name = %application.name, "Application created");
        Ok(application)
    }

    /// Delete an application and every service it owns.
    ///
    /// Services are deleted one at a time; a failure part way leaves the
    /// services already deleted gone and the application in place.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the application does not exist,
    /// or the first error hit while deleting.
    pub async fn del(&self, id: &ApplicationId) -> Result<()> {
        if self.get(id).await?.is_none() {
            return Err(ControlError::not_found("application", id));
        }

        let services = self.services(id).await?;
        debug!(application_id = %id, services = services.len(), "Deleting application services");
        for service in &services {
            if let Err(e) = self.services.del(&service.id).await {
                warn!(application_id = %id, service_id = %service.id, error = %e, "Cascade delete failed");
                return Err(e);
            }
        }

        match self
            .store
            .del(&keys::application_path(id), DeleteOptions::default())
            .await
        {
            Ok(()) => {
                info!(application_id = %id, "Application deleted");
                Ok(())
            }
            Err(StoreError::NotFound(_)) => Err(ControlError::not_found("application", id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Services owned by the application.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn services(&self, id: &ApplicationId) -> Result<Vec<Service>> {
        self.services.where_application_is(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deployments::DeploymentRegistry;
    use crate::retry::RetryPolicy;
    use crate::types::ServiceParams;
    use admiral_fleet::InMemoryScheduler;
    use admiral_store::RocksStore;
    use tempfile::TempDir;

    fn setup() -> (ApplicationRegistry, ServiceRegistry, TempDir) {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn ConfigStore> = Arc::new(RocksStore::open(dir.path()).unwrap());
        let scheduler = Arc::new(InMemoryScheduler::new());
        let deployments =
            DeploymentRegistry::new(store.clone(), scheduler.clone(), RetryPolicy::none());
        let services = ServiceRegistry::new(store.clone(), scheduler, deployments);
        (
            ApplicationRegistry::new(store, services.clone()),
            services,
            dir,
        )
    }

    async fn add_service(services: &ServiceRegistry, application: &ApplicationId) -> Service {
        services
            .create(ServiceParams {
                application: Some(application.to_string()),
                name: Some("worker".to_string()),
                template: Some("fleetunits".to_string()),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_and_get() {
        let (applications, _, _dir) = setup();
        assert!(applications.all().await.unwrap().is_empty());

        let created = applications
            .create(ApplicationParams::new("shop"))
            .await
            .unwrap();
        let fetched = applications.get(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "shop");
        assert_eq!(applications.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn name_is_validated() {
        let (applications, _, _dir) = setup();

        let blank = applications.create(ApplicationParams::default()).await;
        assert!(matches!(
            blank,
            Err(ControlError::Validation(ref e)) if e.field("name") == ["Name can't be blank"]
        ));

        let long = applications
            .create(ApplicationParams::new("a".repeat(37)))
            .await;
        assert!(matches!(long, Err(ControlError::Validation(_))));
        assert!(applications.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn del_cascades_to_services() {
        let (applications, services, _dir) = setup();
        let shop = applications.create(ApplicationParams::new("shop")).await.unwrap();
        let blog = applications.create(ApplicationParams::new("blog")).await.unwrap();
        add_service(&services, &shop.id).await;
        add_service(&services, &shop.id).await;
        let kept = add_service(&services, &blog.id).await;

        assert_eq!(applications.services(&shop.id).await.unwrap().len(), 2);

        applications.del(&shop.id).await.unwrap();
        assert!(applications.get(&shop.id).await.unwrap().is_none());
        assert!(applications.services(&shop.id).await.unwrap().is_empty());

        let remaining = services.all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, kept.id);
    }

    #[tokio::test]
    async fn del_missing_is_not_found() {
        let (applications, _, _dir) = setup();
        assert!(matches!(
            applications.del(&ApplicationId::generate()).await,
            Err(ControlError::NotFound { kind: "application", .. })
        ));
    }
}
