use anyhow::Context;
use relaydesk::bootstrap;
use relaydesk::config::Config;
use relaydesk::infrastructure::http::router::build_router;
use relaydesk::infrastructure::observability;
use relaydesk::infrastructure::persistence::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("invalid configuration")?;

    let _observability = observability::init(&config)
        .map_err(|e| anyhow::anyhow!("failed to initialise observability: {}", e))?;
    tracing::info!("Configuration loaded");

    // Initialize database connection
    let db = Database::connect(&config.database_url, config.persistence_timeout())
        .await
        .context("failed to connect to the database")?;
    tracing::info!("Database connection established");

    // Run migrations
    db.run_migrations()
        .await
        .context("failed to apply migrations")?;
    tracing::info!("Database migrations applied");

    bootstrap::initialize_admin(&db, &config)
        .await
        .context("failed to initialise admin user")?;

    let state = bootstrap::build_app_state(db, &config)?;
    let app = build_router(state);

    let addr = config.server_address();
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
