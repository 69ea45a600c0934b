// Authentication endpoints

use axum::{extract::State, http::HeaderMap, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::routes::AppState;
use crate::domain::User;
use crate::errors::{AppError, Result};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SignOutResponse {
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Resolve the bearer token in the Authorization header to a live user.
pub(crate) async fn current_user(state: &AppState, headers: &HeaderMap) -> Result<User> {
    let header = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::AuthenticationFailed)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AppError::AuthenticationFailed)?;

    state.users.verify_token(token).await
}

/// POST /v1/auth/signin
///
/// Exchange name and password for a bearer token
pub async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<SignInResponse>> {
    let token = state.users.sign_in(&req.name, &req.password).await?;

    Ok(Json(SignInResponse {
        token: token.token().to_string(),
        expires_at: token.expires_at(),
    }))
}

/// POST /v1/auth/signout
///
/// Delete the caller's active token
pub async fn sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SignOutResponse>> {
    let user = current_user(&state, &headers).await?;
    state.users.sign_out(user.id()).await?;

    Ok(Json(SignOutResponse {
        message: "Successfully signed out".to_string(),
    }))
}
