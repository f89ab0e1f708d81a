//! API middleware.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use toggo_common::{AppError, AppResult};
use toggo_core::{RankPollService, VotePollService};
use uuid::Uuid;

use crate::extractors::AuthUser;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub vote_poll_service: VotePollService,
    pub rank_poll_service: RankPollService,
    pub jwt: JwtVerifier,
    pub db: Arc<DatabaseConnection>,
}

/// Claims carried by bearer tokens. `sub` is the user ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// HS256 bearer token verifier.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    #[must_use]
    pub fn new(secret: &str, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Resolve a token to the user it was issued for.
    pub fn verify(&self, token: &str) -> AppResult<Uuid> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer token");
            AppError::Unauthorized
        })?;
        Uuid::parse_str(&data.claims.sub).map_err(|_| AppError::Unauthorized)
    }
}

/// Authentication middleware.
///
/// Attaches the caller to the request when a valid bearer token is present.
/// Routes that need a caller reject the request through [`AuthUser`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(token) = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        && let Ok(user_id) = state.jwt.verify(token)
    {
        req.extensions_mut().insert(AuthUser(user_id));
    }

    next.run(req).await
}
