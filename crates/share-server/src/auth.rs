//! Staff Authentication
//!
//! Staff routes take `Authorization: Bearer <STAFF_API_TOKEN>`. Without a
//! configured token they are switched off entirely.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

use crate::handlers::ApiError;
use crate::state::AppState;

pub async fn require_staff(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let expected = state.staff_token.as_deref().ok_or(ApiError::StaffDisabled)?;

    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| tokens_match(token.trim(), expected));

    if authorized {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(path = %request.uri().path(), "Rejected staff request");
        Err(ApiError::Unauthorized)
    }
}

/// Compare fixed-length digests so the check does not leak the token length
fn tokens_match(provided: &str, expected: &str) -> bool {
    Sha256::digest(provided.as_bytes()) == Sha256::digest(expected.as_bytes())
}
