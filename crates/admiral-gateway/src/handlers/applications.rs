//! Application endpoints, including the services nested under them.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tracing::warn;

use admiral_control::{
    ApplicationId, ApplicationParams, ServiceParams, ServiceTemplate, TemplateParams,
};

use super::{cached, parse_id};
use crate::error::ApiError;
use crate::state::GatewayState;

/// Request to create a service under an application.
#[derive(Debug, Deserialize)]
pub struct CreateServiceBody {
    /// Service name.
    #[serde(default)]
    pub name: Option<String>,
    /// Service template name, e.g. `fleetunits`.
    #[serde(default)]
    pub template: Option<String>,
    /// Replicas per deployment.
    #[serde(default)]
    pub units: Option<i64>,
    /// Parameters for the template.
    #[serde(default)]
    pub parameters: TemplateParams,
}

async fn require_application(state: &GatewayState, id: &ApplicationId) -> Result<(), ApiError> {
    match state.control.applications().get(id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::NotFound(format!(
            "The application {id} was not found."
        ))),
    }
}

/// `GET /v1/applications`
///
/// # Errors
///
/// Returns an error if the config store fails.
pub async fn list_applications(
    State(state): State<Arc<GatewayState>>,
) -> Result<impl IntoResponse, ApiError> {
    let applications = state.control.applications().all().await?;
    Ok(cached(&state, applications))
}

/// `POST /v1/applications`
///
/// # Errors
///
/// Returns a validation error for a blank or overlong name.
pub async fn create_application(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<ApplicationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let application = state.control.applications().create(body).await?;
    Ok((StatusCode::CREATED, Json(application)))
}

/// `GET /v1/applications/:id`
///
/// # Errors
///
/// Returns 404 if the application does not exist.
pub async fn get_application(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: ApplicationId = parse_id(&id, "application")?;
    let application = state
        .control
        .applications()
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("The application {id} was not found.")))?;

    Ok(Json(application))
}

/// `DELETE /v1/applications/:id`, deleting its services too.
///
/// # Errors
///
/// Returns 404 if the application does not exist.
pub async fn delete_application(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: ApplicationId = parse_id(&id, "application")?;
    state.control.applications().del(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /v1/applications/:id/services`
///
/// # Errors
///
/// Returns 404 if the application does not exist.
pub async fn list_application_services(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: ApplicationId = parse_id(&id, "application")?;
    require_application(&state, &id).await?;

    let services = state.control.applications().services(&id).await?;
    Ok(cached(&state, services))
}

/// `POST /v1/applications/:id/services`
///
/// Creates the service, then applies its template. If the template
/// parameters are rejected the new service is removed again.
///
/// # Errors
///
/// Returns 404 if the application does not exist and a validation error
/// for bad service fields or template parameters.
pub async fn create_application_service(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
    Json(body): Json<CreateServiceBody>,
) -> Result<impl IntoResponse, ApiError> {
    let id: ApplicationId = parse_id(&id, "application")?;
    require_application(&state, &id).await?;

    let services = state.control.services();
    let service = services
        .create(ServiceParams {
            application: Some(id.to_string()),
            name: body.name,
            template: body.template,
            units: body.units,
            ..ServiceParams::default()
        })
        .await?;

    let template = ServiceTemplate::from_name(&service.template)
        .ok_or_else(|| ApiError::Internal(format!("unknown template {}", service.template)))?;

    match template.apply(services, &service.id, body.parameters).await {
        Ok(service) => Ok((StatusCode::CREATED, Json(service))),
        Err(e) => {
            if let Err(cleanup) = services.del(&service.id).await {
                warn!(service_id = %service.id, error = %cleanup, "Failed to remove service after template error");
            }
            Err(e.into())
        }
    }
}
