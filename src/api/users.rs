// User account endpoints

use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::auth::current_user;
use crate::api::routes::AppState;
use crate::domain::User;
use crate::errors::Result;

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub name: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id(),
            name: user.name().to_string(),
            created_at: user.created_at(),
            updated_at: user.updated_at(),
        }
    }
}

/// POST /v1/users
///
/// Create a user account
pub async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let user = state
        .users
        .sign_up(&req.name, &req.password, &req.confirm_password)
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// GET /v1/users/me
pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<UserResponse>> {
    let user = current_user(&state, &headers).await?;
    Ok(Json(UserResponse::from(&user)))
}

/// PUT /v1/users/password
pub async fn update_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<Json<UserResponse>> {
    let user = current_user(&state, &headers).await?;
    let user = state
        .users
        .update_password(user.id(), &req.password, &req.confirm_password)
        .await?;

    Ok(Json(UserResponse::from(&user)))
}

/// DELETE /v1/users
///
/// Soft-delete the caller's account and its agents
pub async fn delete_account(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode> {
    let user = current_user(&state, &headers).await?;
    state.users.delete(user.id()).await?;

    Ok(StatusCode::NO_CONTENT)
}
