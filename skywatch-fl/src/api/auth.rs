//! Authentication middleware for skywatch-fl
//!
//! Every protected route requires `Authorization: Bearer <token>`. The
//! middleware verifies the token and attaches the decoded principal to
//! the request; failures answer 401 with a reason that distinguishes an
//! expired token from every other rejection.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use skywatch_common::api::auth::AuthError;
use tracing::warn;

use crate::AppState;

/// Decoded principal attached to authenticated requests
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: String,
    pub username: String,
}

/// Authentication middleware
///
/// Applied to protected routes only; `/health` stays open.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let claims = state.verifier.verify_header(header).map_err(|e| {
        warn!(uri = %request.uri(), "authentication failed: {}", e);
        AuthRejection(e)
    })?;

    request.extensions_mut().insert(CurrentUser {
        user_id: claims.user_id,
        username: claims.username,
    });

    Ok(next.run(request).await)
}

/// 401 response wrapper for token verification failures
#[derive(Debug)]
pub struct AuthRejection(pub AuthError);

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = match &self.0 {
            AuthError::ExpiredToken => json!({
                "message": "Token Expired",
            }),
            other => json!({
                "message": "Unauthorized: Invalid Token",
                "details": other.to_string(),
            }),
        };

        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}
