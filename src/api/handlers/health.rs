//! Liveness probe.

/// GET /ping - Liveness probe.
#[utoipa::path(
    get,
    path = "/ping",
    tag = "health",
    responses((status = 200, description = "Server is up", body = String, content_type = "text/plain"))
)]
pub async fn ping() -> &'static str {
    "pong"
}
