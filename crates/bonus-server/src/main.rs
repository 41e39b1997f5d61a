//! Bonus server entry point.

use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, Method};
use bonus_server::{create_router, db, AppState, PgBonusStore, ServerConfig};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    tracing::info!(
        bind_addr = %config.bind_addr,
        earn_rate = %config.ledger.earn_rate,
        max_bonus_per_order = ?config.ledger.max_bonus_per_order,
        store_timeout_ms = config.ledger.store_timeout.as_millis() as u64,
        cas_max_attempts = config.ledger.cas_max_attempts,
        "Starting bonus server"
    );

    let pool = db::create_pool(
        &config.database_url,
        config.db_max_connections,
        config.ledger.store_timeout,
    )
    .await
    .context("Failed to connect to database")?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    let state = AppState::new(Arc::new(PgBonusStore::new(pool)), config.ledger);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %listener.local_addr()?, "Bonus server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
