//! Cluster machine endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;

use super::cached;
use crate::error::ApiError;
use crate::state::GatewayState;

/// `GET /v1/machines`
///
/// # Errors
///
/// Returns an error if the scheduler cannot be reached.
pub async fn list_machines(
    State(state): State<Arc<GatewayState>>,
) -> Result<impl IntoResponse, ApiError> {
    let machines = state.control.machines().await?;
    Ok(cached(&state, machines))
}
