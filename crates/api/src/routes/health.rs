//! Liveness endpoint for load balancers.

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /health — reports that the storefront is accepting requests.
///
/// Does not touch the store; a database outage surfaces through request
/// errors and metrics, not here.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
