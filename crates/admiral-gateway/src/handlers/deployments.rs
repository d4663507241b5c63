//! Deployment endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;

use super::cached;
use crate::error::ApiError;
use crate::state::GatewayState;

/// `GET /v1/deployments`
///
/// # Errors
///
/// Returns an error if the config store fails.
pub async fn list_deployments(
    State(state): State<Arc<GatewayState>>,
) -> Result<impl IntoResponse, ApiError> {
    let deployments = state.control.deployments().all().await?;
    Ok(cached(&state, deployments))
}
