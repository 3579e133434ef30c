use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::auth::jwt::{encode_token, Claims};
use crate::error::AppError;
use crate::response::{ApiJson, Envelope};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserInfo,
}

#[derive(Serialize)]
pub struct UserInfo {
    pub email: String,
}

pub async fn login(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Envelope<LoginResponse>, AppError> {
    let identity = state
        .identity
        .authenticate(&req.email, &req.password)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| {
            tracing::warn!("Failed login attempt");
            AppError::Unauthorized("Invalid credentials".to_string())
        })?;

    let claims = Claims::new(identity.email.clone());
    let token = encode_token(&claims, &state.config.jwt_secret).map_err(AppError::Internal)?;

    tracing::info!(email = %identity.email, "Admin logged in");

    Ok(Envelope::data(LoginResponse {
        token,
        user: UserInfo {
            email: identity.email,
        },
    })
    .with_message("Login successful"))
}
