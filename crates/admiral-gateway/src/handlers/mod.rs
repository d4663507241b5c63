//! HTTP request handlers.

pub mod applications;
pub mod deployments;
pub mod health;
pub mod machines;
pub mod router;
pub mod services;

use std::str::FromStr;

use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::GatewayState;

/// A list response that clients may cache privately.
fn cached<T: Serialize>(state: &GatewayState, items: Vec<T>) -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, state.config.list_cache_control())],
        Json(items),
    )
}

/// Parse an identifier from the request path.
fn parse_id<T: FromStr>(raw: &str, kind: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid {kind} id: {raw}")))
}
