use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::auth::jwt;
use crate::error::AppError;
use crate::state::SharedState;

/// An authenticated administrator, taken from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub email: String,
}

impl FromRequestParts<SharedState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| AppError::Unauthorized("Access token required".to_string()))?;

        let claims = jwt::decode_token(token, &state.config.jwt_secret).map_err(|e| {
            tracing::debug!("Rejected bearer token: {e}");
            AppError::Forbidden("Invalid or expired token".to_string())
        })?;

        Ok(AdminUser {
            email: claims.email,
        })
    }
}

/// The second whitespace-separated word of the header, if non-empty.
fn bearer_token(header: &str) -> Option<&str> {
    header.split_whitespace().nth(1)
}
