mod api;
mod middleware;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use reeltrack_db::PoolConfig;
use reeltrack_upstream::{UpstreamClient, UpstreamConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = reeltrack_core::load_app_config()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    let pool = reeltrack_db::connect_pool(
        &config.database_url,
        PoolConfig::from_app_config(&config),
    )
    .await?;
    reeltrack_db::run_migrations(&pool).await?;

    // The seed endpoint resolves usernames through the same client the
    // worker uses; if construction fails (bad proxy, say) the admin
    // surface still comes up, read-only on resolution.
    let upstream = match UpstreamClient::new(UpstreamConfig::from_app_config(&config)) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!(error = %e, "upstream client unavailable — seed will reject null user_pk");
            None
        }
    };

    let heartbeat_interval_secs = if config.test_mode { 10 } else { 30 };
    let app = api::build_app(api::AppState {
        pool,
        upstream,
        heartbeat_interval_secs,
    });

    tracing::info!(addr = %config.bind_addr, "admin API listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("interrupt received — shutting down admin API");
        })
        .await?;

    Ok(())
}
