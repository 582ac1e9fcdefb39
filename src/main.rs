//! newsportal - A small news portal

use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use newsportal::{
    api::{self, AppState},
    config::Config,
    db::{
        self,
        DatabasePool,
        repositories::{
            SqlxAuthorRepository, SqlxCategoryRepository, SqlxPostRepository,
            SqlxSessionRepository, SqlxUserRepository,
        },
    },
    services::{PostService, UserService},
    theme::TemplateEngine,
};

/// How often expired sessions are purged
const SESSION_CLEANUP_INTERVAL_SECS: u64 = 3600;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newsportal=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting newsportal...");

    // Load configuration
    let config_path = Config::default_path();
    let config = Config::load_with_env(&config_path)?;
    tracing::info!("Configuration loaded from {}", config_path.display());

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create repositories and services
    let user_service = Arc::new(UserService::with_session_ttl_days(
        SqlxUserRepository::boxed(pool.clone()),
        SqlxSessionRepository::boxed(pool.clone()),
        config.session.ttl_days,
    ));
    let post_service = Arc::new(PostService::new(
        SqlxPostRepository::boxed(pool.clone()),
        SqlxAuthorRepository::boxed(pool.clone()),
        SqlxCategoryRepository::boxed(pool.clone()),
    ));

    // Initialize templates
    let templates = TemplateEngine::new(&config.templates.path)?;
    tracing::info!("Templates loaded (overrides from {})", config.templates.path.display());

    let state = AppState {
        post_service,
        user_service: user_service.clone(),
        templates: Arc::new(templates),
        secure_cookie: config.session.secure_cookie,
    };

    // Purge expired sessions periodically
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(SESSION_CLEANUP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            match user_service.cleanup_expired_sessions().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "Expired sessions removed"),
                Err(e) => tracing::warn!(error = %e, "Failed to remove expired sessions"),
            }
        }
    });

    // Build router
    let app = api::build_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    pool.close().await;
    Ok(())
}
