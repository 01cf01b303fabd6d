use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::{
    metrics,
    middleware::{cors::create_cors_layer, request_id, security_headers},
    state::ApiState,
    v1,
};

/// API routes without the server-wide layers
pub fn router() -> Router<ApiState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/v1", v1::routes())
        .fallback(handler_404)
}

/// The complete application: API routes, `/metrics`, CORS, request tracing,
/// metrics tracking, request ids and security headers.
pub fn app(state: ApiState, metrics_handle: PrometheusHandle, allowed_origins: Vec<String>) -> Router {
    let environment = state.environment;

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let metrics_app = Router::new()
        .route("/metrics", get(metrics::metrics_handler))
        .with_state(metrics_handle);

    let app = router()
        .with_state(state)
        .merge(metrics_app)
        .layer(create_cors_layer(allowed_origins))
        .layer(trace_layer)
        .layer(middleware::from_fn(metrics::track_metrics))
        .layer(middleware::from_fn(request_id::request_id_middleware));

    security_headers::apply_security_headers(app, environment)
}

/// Liveness: the process is up
async fn health() -> StatusCode {
    StatusCode::OK
}

/// Readiness: the database answers
async fn readiness(State(state): State<ApiState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}

async fn handler_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "The requested resource was not found" })),
    )
}
