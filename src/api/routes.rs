use crate::{
    api::{agents, auth, health, policies, users},
    usecase::{AgentUsecase, PolicyUsecase, UserUsecase},
};
use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub users: Arc<UserUsecase>,
    pub agents: Arc<AgentUsecase>,
    pub policies: Arc<PolicyUsecase>,
}

pub fn create_router(state: AppState) -> Router {
    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health endpoints
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        // API v1 routes
        .nest("/v1", v1_routes())
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Add state
        .with_state(state)
}

fn v1_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(users::sign_up).delete(users::delete_account))
        .route("/users/me", get(users::me))
        .route("/users/password", put(users::update_password))
        .route("/auth/signin", post(auth::sign_in))
        .route("/auth/signout", post(auth::sign_out))
        .route("/agents", get(agents::list).post(agents::create))
        .route(
            "/agents/:id",
            get(agents::get).put(agents::rename).delete(agents::delete),
        )
        .route(
            "/agents/:id/policies",
            get(agents::get_policies).put(agents::update_policies),
        )
        .route(
            "/agents/:id/token",
            get(agents::get_token)
                .post(agents::issue_token)
                .delete(agents::delete_token),
        )
        .route("/policies", get(policies::list).post(policies::create))
        .route(
            "/policies/:id",
            get(policies::get)
                .put(policies::update)
                .delete(policies::delete),
        )
        .route(
            "/policies/:id/agents",
            get(policies::get_agents).put(policies::update_agents),
        )
}
