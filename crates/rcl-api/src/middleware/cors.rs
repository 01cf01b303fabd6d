use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};

use super::request_id::REQUEST_ID_HEADER;

/// Creates the CORS layer for the configured frontend origins.
///
/// Credentials are allowed because the session lives in cookies. Origins that
/// are not valid header values are skipped with a warning.
pub fn create_cors_layer(allowed_origins: Vec<String>) -> CorsLayer {
    let origins = allowed_origins
        .into_iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect::<Vec<_>>();

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, request_id.clone()])
        .expose_headers([request_id])
        .allow_credentials(true)
}
