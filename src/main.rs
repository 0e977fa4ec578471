use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use edu_gateway::auth::TokenCodec;
use edu_gateway::backend::UnconfiguredBackend;
use edu_gateway::policy::{self, default_policies};
use edu_gateway::routes;
use edu_gateway::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so ACCESS_KEY, REFRESH_KEY, DATABASE_URL etc. are picked up
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let config = edu_gateway::config::config();
    tracing::info!("Starting gateway in {:?} mode", config.environment);
    config.validate().context("invalid configuration")?;

    let codec = Arc::new(TokenCodec::from_config(&config.security));
    codec.ensure_configured()?;

    // Policy must be fully loaded before the listener is bound
    let policies = policy::open_store(config)
        .await
        .context("failed to open policy store")?;
    if config.policy.load_defaults {
        policies
            .load_policies(&default_policies())
            .await
            .context("failed to load default policies")?;
    }
    let rules = policies.list_policies().await?;
    tracing::info!("Policy store ready with {} rules", rules.len());
    routes::audit_policy(&rules);

    let state = AppState::new(codec, policies, Arc::new(UnconfiguredBackend));
    let app = routes::app(state, config);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("Gateway listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
