use std::net::SocketAddr;

use anyhow::Context;
use rcl_api::{ApiConfig, ApiState, jobs, metrics, router, tracing::init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment variables
    dotenvy::dotenv().ok();
    let config = ApiConfig::from_env()?;

    init_tracing(&config.env);
    let metrics_handle = metrics::init_metrics()?;

    let database_url = config
        .database_url
        .clone()
        .context("DATABASE_URL must be set")?;
    let pool = rcl_db::create_pool(&database_url, config.db_max_connections).await?;
    rcl_db::ensure_db_and_migrate(&database_url, &pool).await?;

    let port = config.port;
    let allowed_origins = config.parsed_allowed_origins();
    let state = ApiState::new(config, pool)?;

    let _job_handles = jobs::start_background_jobs(state.pool.clone());

    let app = router::app(state, metrics_handle, allowed_origins);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Server listening");

    // Peer addresses are the rate limiter's fallback key
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
