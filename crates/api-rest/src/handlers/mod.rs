//! REST handlers, grouped by resource.

pub mod accounts;
pub mod forms;
pub mod knowledge;
pub mod narratives;
pub mod sessions;

use api_shared::{pb, HealthService};
use axum::response::Json;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = pb::HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Reports process liveness for monitoring and load balancer checks.
pub async fn health() -> Json<pb::HealthRes> {
    Json(HealthService::check_health())
}
