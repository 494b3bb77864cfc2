//! Domain handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::api::error::{ApiError, ErrorResponse};
use crate::api::state::ApiState;
use crate::domain::{DomainAction, DomainDescriptor, UnknownAction};

/// GET /domains - List all domains.
#[utoipa::path(
    get,
    path = "/domains",
    tag = "domains",
    responses(
        (status = 200, description = "Every domain, in hypervisor order", body = Vec<DomainDescriptor>),
        (status = 500, description = "Hypervisor failure", body = ErrorResponse)
    )
)]
pub async fn list_domains(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<DomainDescriptor>>, ApiError> {
    let domains = state
        .run(|session| {
            let ids = session.enumerate()?;
            ids.into_iter()
                .map(|id| session.describe(id))
                .collect::<crate::Result<Vec<_>>>()
        })
        .await?;

    Ok(Json(domains))
}

/// GET /domains/:name - Get a domain.
#[utoipa::path(
    get,
    path = "/domains/{name}",
    tag = "domains",
    params(("name" = String, Path, description = "Domain name")),
    responses(
        (status = 200, description = "Domain snapshot", body = DomainDescriptor),
        (status = 404, description = "No such domain", body = ErrorResponse),
        (status = 500, description = "Hypervisor failure", body = ErrorResponse)
    )
)]
pub async fn get_domain(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
) -> Result<Json<DomainDescriptor>, ApiError> {
    let domain = state
        .run(move |session| {
            let id = session.lookup(&name)?;
            session.describe(id)
        })
        .await?;

    Ok(Json(domain))
}

/// POST /domains/:name/:action - Apply a lifecycle action.
#[utoipa::path(
    post,
    path = "/domains/{name}/{action}",
    tag = "domains",
    params(
        ("name" = String, Path, description = "Domain name"),
        ("action" = DomainAction, Path, description = "Lifecycle action")
    ),
    responses(
        (status = 200, description = "Domain snapshot after the action", body = DomainDescriptor),
        (status = 404, description = "No such domain or action", body = ErrorResponse),
        (status = 500, description = "Hypervisor rejected the action", body = ErrorResponse)
    )
)]
pub async fn domain_action(
    State(state): State<Arc<ApiState>>,
    Path((name, action)): Path<(String, String)>,
) -> Result<Json<DomainDescriptor>, ApiError> {
    let action: DomainAction = action
        .parse()
        .map_err(|e: UnknownAction| ApiError::NotFound(e.to_string()))?;

    let domain = state
        .run(move |session| {
            let id = session.lookup(&name)?;
            session.perform(id, action)
        })
        .await?;

    Ok(Json(domain))
}
