//! Back-office authentication.
//!
//! The admin API is guarded by a single bearer token (`ADMIN_API_TOKEN`).
//! Use [`RequireAdmin`] as an extractor, or mount it on a whole router with
//! `axum::middleware::from_extractor_with_state`.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use secrecy::ExposeSecret;

use crate::error::AppError;
use crate::security::constant_time_compare;
use crate::state::AppState;

/// Extractor that rejects requests without the admin bearer token.
pub struct RequireAdmin;

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

        if !constant_time_compare(token, state.config().admin_token.expose_secret()) {
            tracing::warn!(path = %parts.uri.path(), "Rejected admin request with wrong token");
            return Err(AppError::Unauthorized("Invalid admin token".to_string()));
        }

        Ok(Self)
    }
}

/// The token from an `Authorization: Bearer <token>` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
