//! Service endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use admiral_control::{Deployment, Service, ServiceId, ValidationErrors};

use super::{cached, parse_id};
use crate::error::ApiError;
use crate::state::GatewayState;

/// Request to move a service to another state.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetStateBody {
    /// Target state: `running`, `stopped`, `initialized` or `terminated`.
    #[serde(default)]
    pub state: Option<String>,
    /// When starting, schedule only the units that are not running.
    #[serde(default)]
    pub start_partial: bool,
}

/// Result of a state change.
#[derive(Debug, Serialize)]
pub struct SetStateResponse {
    /// The service after the change.
    pub service: Service,
    /// The deployment that was started, for `running`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<Deployment>,
}

/// Target states a caller may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Running,
    Stopped,
    Initialized,
    Terminated,
}

impl Target {
    fn parse(state: Option<&str>) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.presence("state", state);
        let target = match state {
            Some("running") => Some(Self::Running),
            Some("stopped") => Some(Self::Stopped),
            Some("initialized") => Some(Self::Initialized),
            Some("terminated") => Some(Self::Terminated),
            _ => None,
        };
        match target {
            Some(target) => Ok(target),
            None => {
                if errors.is_empty() {
                    errors.add(
                        "state",
                        "State must be one of running, stopped, initialized or terminated",
                    );
                }
                Err(errors)
            }
        }
    }
}

fn not_found(id: &ServiceId) -> ApiError {
    ApiError::NotFound(format!("The service {id} was not found."))
}

/// `GET /v1/services`
///
/// # Errors
///
/// Returns an error if the config store fails.
pub async fn list_services(
    State(state): State<Arc<GatewayState>>,
) -> Result<impl IntoResponse, ApiError> {
    let services = state.control.services().all().await?;
    Ok(cached(&state, services))
}

/// `GET /v1/services/:id`
///
/// # Errors
///
/// Returns 404 if the service does not exist.
pub async fn get_service(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: ServiceId = parse_id(&id, "service")?;
    let service = state
        .control
        .services()
        .get(&id)
        .await?
        .ok_or_else(|| not_found(&id))?;

    Ok(Json(service))
}

/// `DELETE /v1/services/:id`
///
/// # Errors
///
/// Returns 404 if the service does not exist.
pub async fn delete_service(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: ServiceId = parse_id(&id, "service")?;
    state.control.services().del(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /v1/services/:id/state`
///
/// # Errors
///
/// Returns a validation error for an unknown target state, 404 for an
/// unknown service and 409 when the transition is not allowed.
pub async fn set_service_state(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
    Json(body): Json<SetStateBody>,
) -> Result<impl IntoResponse, ApiError> {
    let id: ServiceId = parse_id(&id, "service")?;
    let target = Target::parse(body.state.as_deref()).map_err(ApiError::Validation)?;
    let services = state.control.services();

    info!(service_id = %id, target = ?target, start_partial = body.start_partial, "Service state requested");

    let (service, deployment) = match target {
        Target::Running => {
            let deployment = services.start(&id, body.start_partial).await?;
            let service = services.get(&id).await?.ok_or_else(|| not_found(&id))?;
            (service, Some(deployment))
        }
        Target::Stopped => (services.stop(&id).await?, None),
        Target::Initialized => (services.unload(&id).await?, None),
        Target::Terminated => (services.terminate(&id).await?, None),
    };

    Ok(Json(SetStateResponse {
        service,
        deployment,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_parse() {
        assert_eq!(Target::parse(Some("running")).unwrap(), Target::Running);
        assert_eq!(Target::parse(Some("terminated")).unwrap(), Target::Terminated);

        let blank = Target::parse(None).unwrap_err();
        assert_eq!(blank.field("state"), ["State can't be blank"]);

        let unknown = Target::parse(Some("paused")).unwrap_err();
        assert_eq!(unknown.field("state").len(), 1);
        assert!(unknown.field("state")[0].starts_with("State must be one of"));
    }
}
