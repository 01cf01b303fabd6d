//! Prometheus metrics for monitoring API performance and health.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use regex::Regex;
use std::{sync::LazyLock, time::Instant};

static UUID_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("valid UUID regex")
});
static NUMBER_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\d+").expect("valid number regex"));

/// Initialize the Prometheus metrics exporter
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )?
        // Model calls are much slower than regular requests
        .set_buckets_for_metric(
            Matcher::Full("llm_request_duration_seconds".to_string()),
            &[0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 40.0, 60.0],
        )?;

    let handle = builder.install_recorder()?;

    Ok(handle)
}

/// Middleware to record HTTP request metrics
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let in_flight = gauge!("http_requests_in_flight", "method" => method.clone(), "path" => path.clone());
    in_flight.increment(1.0);

    let response = next.run(req).await;

    in_flight.decrement(1.0);

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(
        "http_requests_total",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status.clone()
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path,
        "status" => status
    )
    .record(duration);

    response
}

/// Replace UUIDs and numeric IDs in a path with `:id` to keep label cardinality low
fn normalize_path(path: &str) -> String {
    let normalized = UUID_SEGMENT.replace_all(path, ":id");
    NUMBER_SEGMENT.replace_all(&normalized, "/:id").into_owned()
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (StatusCode::OK, handle.render())
}

/// Record authentication events
pub fn record_auth_event(event_type: &str, method: &str, success: bool) {
    let status = if success { "success" } else { "failure" };

    counter!(
        "auth_events_total",
        "type" => event_type.to_string(),
        "method" => method.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record one call to the language model
pub fn record_llm_request(duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!("llm_requests_total", "status" => status).increment(1);
    histogram!("llm_request_duration_seconds").record(duration_secs);
}

/// Record a card review by rating
pub fn record_card_review(rating: &str) {
    counter!("card_reviews_total", "rating" => rating.to_string()).increment(1);
}

/// Record a graded quiz and its score (0-100)
pub fn record_quiz_graded(score: f64) {
    counter!("quizzes_graded_total").increment(1);
    histogram!("quiz_score_percent").record(score);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("/v1/decks/550e8400-e29b-41d4-a716-446655440000"),
            "/v1/decks/:id"
        );
        assert_eq!(normalize_path("/v1/decks/123"), "/v1/decks/:id");
        assert_eq!(
            normalize_path("/v1/decks/550e8400-e29b-41d4-a716-446655440000/cards"),
            "/v1/decks/:id/cards"
        );
        assert_eq!(
            normalize_path("/v1/quizzes/550E8400-E29B-41D4-A716-446655440000/submit"),
            "/v1/quizzes/:id/submit"
        );
        assert_eq!(normalize_path("/health"), "/health");
    }
}
