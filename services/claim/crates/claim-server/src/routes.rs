//! HTTP surface of claimd.

use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use claim_common::ClaimResponse;
use tower_http::trace::TraceLayer;

use crate::error::ClaimError;
use crate::handshake::ClaimService;

/// Path of the claim endpoint.
pub const CLAIM_PATH: &str = "/api/v2/claim";

/// Build the router:
///   - `/api/v2/claim` → claim handshake
///   - `/health`       → liveness probe
pub fn router(service: Arc<ClaimService>) -> Router {
    Router::new()
        .route(CLAIM_PATH, get(claim))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn claim(
    State(service): State<Arc<ClaimService>>,
    RawQuery(query): RawQuery,
) -> Result<Json<ClaimResponse>, ClaimError> {
    service
        .handle(query.as_deref().unwrap_or_default())
        .await
        .map(Json)
}

async fn health() -> StatusCode {
    StatusCode::OK
}
