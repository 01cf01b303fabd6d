//! Per-route-group rate limiting with `tower_governor`, keyed by client IP.
//!
//! Quotas are expressed as a replenish period and a burst size: a client may
//! send `burst` requests at once, then one more every `replenish` milliseconds.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Duration;

/// General authenticated endpoints: 10 requests per second, burst of 30
pub const GENERAL_REPLENISH_MS: u64 = 100;
pub const GENERAL_BURST_SIZE: u32 = 30;

/// Login and registration: 2 requests per second, burst of 5
pub const AUTH_REPLENISH_MS: u64 = 500;
pub const AUTH_BURST_SIZE: u32 = 5;

/// Endpoints that call the language model: 1 request every 6 seconds, burst of 5
pub const LLM_REPLENISH_MS: u64 = 6000;
pub const LLM_BURST_SIZE: u32 = 5;

/// Build a `GovernorLayer` keyed by client IP (`X-Forwarded-For`, `X-Real-IP`,
/// `Forwarded`, then the peer address), adding `x-ratelimit-*` headers.
///
/// ```ignore
/// Router::new()
///     .route("/decks", get(list_decks))
///     .layer(make_rate_limit_layer!(
///         rate_limit::GENERAL_REPLENISH_MS,
///         rate_limit::GENERAL_BURST_SIZE
///     ));
/// ```
#[macro_export]
macro_rules! make_rate_limit_layer {
    ($replenish_ms:expr, $burst:expr) => {{
        let config = ::tower_governor::governor::GovernorConfigBuilder::default()
            .per_millisecond($replenish_ms)
            .burst_size($burst)
            .key_extractor(::tower_governor::key_extractor::SmartIpKeyExtractor)
            .use_headers()
            .finish()
            .expect("rate limit quota must have a non-zero period and burst size");

        ::tower_governor::GovernorLayer::new(config)
    }};
}

/// Adds a small constant delay to responses from credential endpoints so that
/// response time does not reveal whether an account exists.
pub async fn timing_safe_middleware(req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    tokio::time::sleep(Duration::from_millis(50)).await;

    response
}
