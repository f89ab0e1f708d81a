//! Health check endpoint.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use toggo_common::AppResult;

use crate::middleware::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Report liveness once the database answers.
async fn healthcheck(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    toggo_db::ping(&state.db).await?;
    Ok(Json(HealthResponse { status: "ok" }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/healthcheck", get(healthcheck))
}
