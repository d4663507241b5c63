//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::map_response_body::MapResponseBodyLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{applications, deployments, health, machines, router, services};
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// - `GET /` - API banner
/// - `GET /health` - Health check
///
/// ## Applications
/// - `GET /v1/applications` - List applications
/// - `POST /v1/applications` - Create application
/// - `GET /v1/applications/:id` - Get application
/// - `DELETE /v1/applications/:id` - Delete application and its services
/// - `GET /v1/applications/:id/services` - List the application's services
/// - `POST /v1/applications/:id/services` - Create a service from a template
///
/// ## Services
/// - `GET /v1/services` - List services
/// - `GET /v1/services/:id` - Get service
/// - `DELETE /v1/services/:id` - Delete service
/// - `POST /v1/services/:id/state` - Start, stop, unload or terminate
///
/// ## Cluster
/// - `GET /v1/deployments` - List deployments
/// - `GET /v1/machines` - List machines
/// - `GET /v1/router/backends` - vulcand backend ids
/// - `GET /v1/router/frontends` - vulcand frontends
pub fn create_router(state: GatewayState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(MapResponseBodyLayer::new(axum::body::Body::new))
        .layer(RequestBodyLimitLayer::new(state.config.max_body_bytes))
        .layer(TimeoutLayer::new(state.config.request_timeout()));

    let state = Arc::new(state);

    Router::new()
        .route("/", get(health::index))
        .route("/health", get(health::health))
        // Applications
        .route(
            "/v1/applications",
            get(applications::list_applications).post(applications::create_application),
        )
        .route(
            "/v1/applications/:id",
            get(applications::get_application).delete(applications::delete_application),
        )
        .route(
            "/v1/applications/:id/services",
            get(applications::list_application_services)
                .post(applications::create_application_service),
        )
        // Services
        .route("/v1/services", get(services::list_services))
        .route(
            "/v1/services/:id",
            get(services::get_service).delete(services::delete_service),
        )
        .route(
            "/v1/services/:id/state",
            post(services::set_service_state),
        )
        // Cluster
        .route("/v1/deployments", get(deployments::list_deployments))
        .route("/v1/machines", get(machines::list_machines))
        .route("/v1/router/backends", get(router::list_backends))
        .route("/v1/router/frontends", get(router::list_frontends))
        .layer(middleware)
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
