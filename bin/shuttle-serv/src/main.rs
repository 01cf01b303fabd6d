use rcl_api::{ApiConfig, ApiState, jobs, metrics, router};

#[shuttle_runtime::main]
async fn main(
    #[shuttle_shared_db::Postgres] pool: sqlx::PgPool,
    #[shuttle_runtime::Secrets] secrets: shuttle_runtime::SecretStore,
) -> shuttle_axum::ShuttleAxum {
    let config = ApiConfig::from_shuttle_secrets(&secrets)
        .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    // Shuttle installs its own tracing subscriber
    let metrics_handle = metrics::init_metrics()?;

    rcl_db::MIGRATOR
        .run(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration error: {}", e))?;

    let allowed_origins = config.parsed_allowed_origins();
    let environment = config.env;
    let state = ApiState::new(config, pool)?;

    let _job_handles = jobs::start_background_jobs(state.pool.clone());

    let app = router::app(state, metrics_handle, allowed_origins);

    tracing::info!(?environment, "Recall API ready");

    Ok(app.into())
}
