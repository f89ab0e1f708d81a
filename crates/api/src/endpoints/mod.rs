//! API endpoints.

mod health;
mod rank_polls;
mod vote_polls;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(vote_polls::router())
        .merge(rank_polls::router())
}

/// Liveness routes, served outside the versioned API prefix.
pub fn health_router() -> Router<AppState> {
    health::router()
}
