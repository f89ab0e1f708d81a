//! HTTP API layer for toggo.
//!
//! This crate provides the REST API for trip polls:
//!
//! - **Endpoints**: vote polls, rank polls, health check
//! - **Extractors**: bearer authentication, JSON bodies with typed rejections
//! - **Middleware**: JWT verification and shared application state
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::{health_router, router};
pub use middleware::{AppState, JwtVerifier};
