use agent_gate::{
    api::{create_router, AppState},
    config::Config,
    db::{
        create_pool, run_migrations, PgAgentRepository, PgAgentTokenRepository,
        PgPermissionRepository, PgPolicyRepository, PgTransactionManager, PgUserRepository,
        PgUserTokenRepository,
    },
    observability::init_tracing,
    usecase::{AgentUsecase, PolicyUsecase, UserUsecase},
};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    // Initialize tracing/logging
    init_tracing(&config.observability);

    tracing::info!("Starting Agent Gate service");
    tracing::info!("Configuration loaded: {:?}", config.server);

    // Create database connection pool
    let db_pool = create_pool(&config.database).await?;

    // Run database migrations
    run_migrations(&db_pool).await?;

    // Composition root: one canonical repository per entity, wired by
    // interface into the use-case layer.
    let tx = Arc::new(PgTransactionManager::new(db_pool.clone()));
    let user_repo = Arc::new(PgUserRepository);
    let agent_repo = Arc::new(PgAgentRepository);
    let policy_repo = Arc::new(PgPolicyRepository);
    let permission_repo = Arc::new(PgPermissionRepository);
    let user_token_repo = Arc::new(PgUserTokenRepository);
    let agent_token_repo = Arc::new(PgAgentTokenRepository);

    let users = Arc::new(UserUsecase::new(
        tx.clone(),
        user_repo.clone(),
        agent_repo.clone(),
        user_token_repo,
    ));
    let agents = Arc::new(AgentUsecase::new(
        tx.clone(),
        agent_repo.clone(),
        policy_repo.clone(),
        permission_repo.clone(),
        agent_token_repo,
    ));
    let policies = Arc::new(PolicyUsecase::new(
        tx,
        policy_repo,
        agent_repo,
        permission_repo,
    ));

    let state = AppState {
        db_pool,
        users,
        agents,
        policies,
    };

    // Create router
    let app = create_router(state);

    // Bind server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;
    tracing::info!("Listening on http://{}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Agent Gate service is ready to accept requests");

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
