//! Tracing and logging configuration.

use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Environment;

const DEVELOPMENT_FILTER: &str = "info,rcl_api=debug,rcl_db=debug,tower_http=debug,sqlx=warn";
const PRODUCTION_FILTER: &str = "info,tower_http=info,sqlx=warn";

/// Initialize tracing for the given environment.
///
/// Development logs are pretty-printed with file and line numbers. Production
/// logs are flattened JSON events carrying the current span (and so the request
/// ID) for log aggregation.
///
/// `RUST_LOG` overrides the default filter, e.g. `RUST_LOG=debug,tower_http=trace`.
pub fn init_tracing(env: &Environment) {
    if env.is_development() {
        init_development_tracing();
    } else {
        init_production_tracing();
    }
}

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn init_development_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true)
                .with_file(true)
                .pretty()
                .with_filter(filter(DEVELOPMENT_FILTER)),
        )
        .init();

    tracing::info!("Tracing initialized in development mode");
}

fn init_production_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .flatten_event(true)
                .with_target(true)
                .with_filter(filter(PRODUCTION_FILTER)),
        )
        .init();

    tracing::info!("Tracing initialized in production mode");
}
