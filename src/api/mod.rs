//! HTTP API server for virtrest.
//!
//! Every request opens its own hypervisor session, does its work in a
//! blocking task, and releases all native handles before the response is
//! sent.
//!
//! # Example
//!
//! ```bash
//! # Start the server
//! virtrest serve --listen 127.0.0.1:8080
//!
//! # Pause a domain
//! curl -X POST http://localhost:8080/domains/vm1/suspend
//! ```

pub mod error;
pub mod handlers;
pub mod state;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::OpenApi;

use state::ApiState;

/// OpenAPI document for the HTTP surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "virtrest",
        description = "Lifecycle control for hypervisor-managed virtual machines"
    ),
    paths(
        handlers::health::ping,
        handlers::domains::list_domains,
        handlers::domains::get_domain,
        handlers::domains::domain_action,
    ),
    components(schemas(
        crate::domain::DomainDescriptor,
        crate::domain::DomainState,
        crate::domain::DomainAction,
        error::ErrorResponse,
    )),
    tags(
        (name = "domains", description = "Domain listing and lifecycle actions"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Create the API router with all endpoints.
pub fn create_router(state: Arc<ApiState>) -> Router {
    let domain_routes = Router::new()
        .route("/", get(handlers::domains::list_domains))
        .route("/:name", get(handlers::domains::get_domain))
        .route("/:name/:action", post(handlers::domains::domain_action))
        .layer(TimeoutLayer::new(state.request_timeout()));

    // CORS: localhost origins only; the API has no authentication.
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:8080"),
            HeaderValue::from_static("http://127.0.0.1:8080"),
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/ping", get(handlers::health::ping))
        .route("/openapi.json", get(openapi_json))
        .nest("/domains", domain_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
