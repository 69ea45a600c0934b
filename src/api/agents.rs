// Agent management endpoints

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::auth::current_user;
use crate::api::policies::PolicyResponse;
use crate::api::routes::AppState;
use crate::domain::{Agent, AgentToken};
use crate::errors::Result;

#[derive(Debug, Deserialize)]
pub struct CreateAgentRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameAgentRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAgentPoliciesRequest {
    pub policy_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub id: Uuid,
    pub name: String,
    pub policy_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Agent> for AgentResponse {
    fn from(agent: &Agent) -> Self {
        Self {
            id: agent.id(),
            name: agent.name().to_string(),
            policy_ids: agent.policy_ids().to_vec(),
            created_at: agent.created_at(),
            updated_at: agent.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AgentTokenResponse {
    pub token: String,
    pub generated_at: DateTime<Utc>,
}

impl From<&AgentToken> for AgentTokenResponse {
    fn from(token: &AgentToken) -> Self {
        Self {
            token: token.token().to_string(),
            generated_at: token.generated_at(),
        }
    }
}

/// GET /v1/agents
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<AgentResponse>>> {
    let user = current_user(&state, &headers).await?;
    let agents = state.agents.list(user.id()).await?;

    Ok(Json(agents.iter().map(AgentResponse::from).collect()))
}

/// POST /v1/agents
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateAgentRequest>,
) -> Result<(StatusCode, Json<AgentResponse>)> {
    let user = current_user(&state, &headers).await?;
    let agent = state.agents.create(user.id(), &req.name).await?;

    Ok((StatusCode::CREATED, Json(AgentResponse::from(&agent))))
}

/// GET /v1/agents/:id
pub async fn get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<AgentResponse>> {
    let user = current_user(&state, &headers).await?;
    let agent = state.agents.get(id, user.id()).await?;

    Ok(Json(AgentResponse::from(&agent)))
}

/// PUT /v1/agents/:id
pub async fn rename(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<RenameAgentRequest>,
) -> Result<Json<AgentResponse>> {
    let user = current_user(&state, &headers).await?;
    let agent = state.agents.rename(id, user.id(), &req.name).await?;

    Ok(Json(AgentResponse::from(&agent)))
}

/// DELETE /v1/agents/:id
pub async fn delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let user = current_user(&state, &headers).await?;
    state.agents.delete(id, user.id()).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/agents/:id/policies
pub async fn get_policies(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PolicyResponse>>> {
    let user = current_user(&state, &headers).await?;
    let policies = state.agents.get_policies(id, user.id()).await?;

    Ok(Json(policies.iter().map(PolicyResponse::from).collect()))
}

/// PUT /v1/agents/:id/policies
///
/// Replace the agent's policy associations with the given set
pub async fn update_policies(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAgentPoliciesRequest>,
) -> Result<Json<AgentResponse>> {
    let user = current_user(&state, &headers).await?;
    let agent = state
        .agents
        .update_policies(id, user.id(), &req.policy_ids)
        .await?;

    Ok(Json(AgentResponse::from(&agent)))
}

/// GET /v1/agents/:id/token
pub async fn get_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<AgentTokenResponse>> {
    let user = current_user(&state, &headers).await?;
    let token = state.agents.get_token(id, user.id()).await?;

    Ok(Json(AgentTokenResponse::from(&token)))
}

/// POST /v1/agents/:id/token
///
/// Issue a token for the agent, replacing any existing one
pub async fn issue_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<AgentTokenResponse>)> {
    let user = current_user(&state, &headers).await?;
    let token = state.agents.issue_token(id, user.id()).await?;

    Ok((StatusCode::CREATED, Json(AgentTokenResponse::from(&token))))
}

/// DELETE /v1/agents/:id/token
pub async fn delete_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let user = current_user(&state, &headers).await?;
    state.agents.delete_token(id, user.id()).await?;

    Ok(StatusCode::NO_CONTENT)
}
