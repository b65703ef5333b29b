use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use auth::{
    AppState,
    activity::{ActivityConfig, ActivityRecorder},
    config::AuthConfig,
    password::Argon2Verifier,
    routes,
    store::{PgSessionStore, SessionStore},
    token::OsTokenGenerator,
};
use common::database;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting authentication service");

    let config = AuthConfig::from_env()?;

    // Initialize database connection pool
    let db_config = database::DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    // Check database connectivity
    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let store = PgSessionStore::new(pool, config.store_timeout());
    store.migrate().await?;
    info!("Database migrations applied");

    let store: Arc<dyn SessionStore> = Arc::new(store);
    let activity = ActivityRecorder::start(Arc::clone(&store), ActivityConfig::from(&config));

    let app_state = AppState::new(
        store,
        Arc::new(Argon2Verifier::new()),
        Arc::new(OsTokenGenerator),
        activity,
        &config,
    );

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("Authentication service listening on {}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Authentication service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
