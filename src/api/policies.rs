// Policy management endpoints

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::agents::AgentResponse;
use crate::api::auth::current_user;
use crate::api::routes::AppState;
use crate::domain::Policy;
use crate::errors::Result;
use crate::usecase::PolicyUpdate;

#[derive(Debug, Deserialize)]
pub struct CreatePolicyRequest {
    pub name: String,
    pub service: String,
    pub path: String,
    pub methods: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePolicyRequest {
    pub name: Option<String>,
    pub service: Option<String>,
    pub path: Option<String>,
    pub methods: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePolicyAgentsRequest {
    pub agent_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct PolicyResponse {
    pub id: Uuid,
    pub name: String,
    pub service: String,
    pub path: String,
    pub methods: Vec<String>,
    pub agent_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Policy> for PolicyResponse {
    fn from(policy: &Policy) -> Self {
        Self {
            id: policy.id(),
            name: policy.name().to_string(),
            service: policy.service().as_str().to_string(),
            path: policy.path().to_string(),
            methods: policy
                .methods()
                .iter()
                .map(|m| m.as_str().to_string())
                .collect(),
            agent_ids: policy.agent_ids().to_vec(),
            created_at: policy.created_at(),
            updated_at: policy.updated_at(),
        }
    }
}

/// GET /v1/policies
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<PolicyResponse>>> {
    let user = current_user(&state, &headers).await?;
    let policies = state.policies.list(user.id()).await?;

    Ok(Json(policies.iter().map(PolicyResponse::from).collect()))
}

/// POST /v1/policies
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreatePolicyRequest>,
) -> Result<(StatusCode, Json<PolicyResponse>)> {
    let user = current_user(&state, &headers).await?;
    let policy = state
        .policies
        .create(user.id(), &req.name, &req.service, &req.path, &req.methods)
        .await?;

    Ok((StatusCode::CREATED, Json(PolicyResponse::from(&policy))))
}

/// GET /v1/policies/:id
pub async fn get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<PolicyResponse>> {
    let user = current_user(&state, &headers).await?;
    let policy = state.policies.get(id, user.id()).await?;

    Ok(Json(PolicyResponse::from(&policy)))
}

/// PUT /v1/policies/:id
///
/// Update any subset of the policy's fields
pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePolicyRequest>,
) -> Result<Json<PolicyResponse>> {
    let user = current_user(&state, &headers).await?;
    let update = PolicyUpdate {
        name: req.name,
        service: req.service,
        path: req.path,
        methods: req.methods,
    };
    let policy = state.policies.update(id, user.id(), update).await?;

    Ok(Json(PolicyResponse::from(&policy)))
}

/// DELETE /v1/policies/:id
pub async fn delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let user = current_user(&state, &headers).await?;
    state.policies.delete(id, user.id()).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/policies/:id/agents
pub async fn get_agents(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AgentResponse>>> {
    let user = current_user(&state, &headers).await?;
    let agents = state.policies.get_agents(id, user.id()).await?;

    Ok(Json(agents.iter().map(AgentResponse::from).collect()))
}

/// PUT /v1/policies/:id/agents
///
/// Replace the policy's agent associations with the given set
pub async fn update_agents(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePolicyAgentsRequest>,
) -> Result<Json<PolicyResponse>> {
    let user = current_user(&state, &headers).await?;
    let policy = state
        .policies
        .update_agents(id, user.id(), &req.agent_ids)
        .await?;

    Ok(Json(PolicyResponse::from(&policy)))
}
