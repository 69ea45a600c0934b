// Health endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::api::routes::AppState;
use crate::db;

/// GET /health/live - Liveness probe
pub async fn liveness() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /health/ready - Readiness probe, pings the database
pub async fn readiness(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    db::health_check(&state.db_pool)
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    Ok(Json(json!({ "status": "ok" })))
}
