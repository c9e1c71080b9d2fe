use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use bazaar_api::{app, AppState, AuthConfig, Repositories};
use bazaar_store::{Config, DbClient, RedisClient, StorageBackend};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bazaar_api=debug,bazaar_store=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Bazaar API on port {}", config.server.port);

    let repos = match config.storage.backend {
        StorageBackend::Postgres => {
            let db = DbClient::new(&config.database.url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Repositories::postgres(&db)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Repositories::in_memory()
        }
    };

    let auth = AuthConfig {
        secret: config.auth.jwt_secret.clone(),
        expiration: config.auth.jwt_expiration_seconds,
    };
    let mut state = AppState::new(repos, auth).context("Failed to register metrics")?;

    if config.redis.url.is_empty() {
        tracing::info!("Redis not configured, rate limiting disabled");
    } else {
        match RedisClient::new(&config.redis.url).await {
            Ok(redis) => state = state.with_rate_limit(Arc::new(redis), config.server.rate_limit_per_minute),
            Err(e) => tracing::warn!(error = %e, "Redis unavailable, rate limiting disabled"),
        }
    }

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
