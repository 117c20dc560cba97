//! Storefront API server

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront::api::{build_app, AppState};
use storefront::assets::AssetStore;
use storefront::config::AppConfig;
use storefront::notify::Notifier;
use storefront::store::postgres::{connect_pool, run_migrations};
use storefront::store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("invalid configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    tracing::debug!(?config, "configuration loaded");

    let pool = connect_pool(&config).await.context("failed to connect to database")?;
    run_migrations(&pool).await.context("failed to run migrations")?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(error) => {
                tracing::warn!(%error, "NATS unavailable, notifications will only be logged");
                None
            }
        },
        None => None,
    };

    let state = AppState::new(
        PgStore::new(pool),
        AssetStore::new(&config.asset_root, &config.asset_base_url),
        Notifier::new(nats),
    )
    .with_session_ttl(config.session_ttl_hours);
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "storefront listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to install SIGTERM handler");
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
    tracing::info!("shutdown signal received");
}
