use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use newsdesk::api;
use newsdesk::auth::AuthService;
use newsdesk::config::{AuthMode, Config, DatabaseBackend};
use newsdesk::storage::{PostgresStorage, SqliteStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database.url);
            Arc::new(SqliteStorage::new(&config.database.url, config.database.max_connections).await?)
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage: {}", config.database.url);
            Arc::new(
                PostgresStorage::new(&config.database.url, config.database.max_connections).await?,
            )
        }
    };

    info!("Initializing database...");
    storage.init().await?;
    info!("Database initialized successfully");

    // Initialize auth service
    let auth_service = Arc::new(AuthService::new(&config.auth)?);

    match config.auth.mode {
        AuthMode::None => {
            info!("🔓 Authentication is disabled - article mutations are open");
        }
        AuthMode::Jwt => {
            if let Some(jwt) = config.auth.jwt.as_ref() {
                info!(
                    "🔐 JWT authentication enabled (issuer: {}, audience: {})",
                    jwt.issuer, jwt.audience
                );
            }
        }
    }

    info!(
        "Visit dedup window: {}s, trusted proxies: {}",
        config.analytics.dedup_window_secs, config.analytics.trusted_proxy_count
    );

    let router = api::create_router(Arc::clone(&storage), auth_service, &config)?;

    if let Some(ref static_dir) = config.frontend.static_dir {
        info!("🎨 Serving frontend from directory: {}", static_dir);
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 newsdesk listening on http://{}", addr);
    info!("   - API endpoints available at http://{}/api/...", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
