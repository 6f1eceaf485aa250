use std::sync::Arc;

use anyhow::{Context, Result};
use bistro_service::config::{load_service_config, StoreConfig};
use bistro_service::store::{DocumentStore, MemoryDocumentStore, PgDocumentStore};
use bistro_service::{build_router, cors_layer, AppState};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal outside local development.
    let _ = dotenvy::dotenv();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bistro_service=info,tower_http=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = load_service_config()?;

    let (store, pool): (Arc<dyn DocumentStore>, Option<PgPool>) = match &config.store {
        StoreConfig::Postgres {
            url,
            max_connections,
        } => {
            let pool = PgPoolOptions::new()
                .max_connections(*max_connections)
                .connect(url)
                .await
                .context("Failed to connect to Postgres")?;
            PgDocumentStore::migrate(&pool)
                .await
                .context("Failed to apply migrations")?;
            info!("document store connected");
            (Arc::new(PgDocumentStore::new(pool.clone())), Some(pool))
        }
        StoreConfig::Memory => {
            warn!("using in-memory document store; data is lost on shutdown");
            (Arc::new(MemoryDocumentStore::new()), None)
        }
    };

    let state = AppState::new(store, config.jwt.clone())?;

    if let Some(email) = &config.bootstrap_admin_email {
        state
            .users()
            .ensure_admin(email)
            .await
            .context("Failed to ensure bootstrap admin")?;
        info!(email = %email, "bootstrap admin ensured");
    }

    let app = build_router(state).layer(cors_layer(&config.cors_allowed_origins)?);

    let addr = config.socket_addr()?;
    info!(%addr, "starting bistro-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pool) = pool {
        pool.close().await;
        info!("document store connections closed");
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(?err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(?err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
