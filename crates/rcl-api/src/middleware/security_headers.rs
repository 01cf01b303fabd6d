use axum::{
    Router,
    extract::Request,
    http::{HeaderName, HeaderValue, header},
    middleware::{self, Next},
    response::Response,
};

use crate::config::Environment;

/// Headers set on every response. Card HTML is served as JSON strings, so
/// sniffing and framing are both shut off.
const ALWAYS: [(HeaderName, &str); 3] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::REFERRER_POLICY, "no-referrer"),
];

/// One year, production only since local development runs on plain HTTP
const HSTS: &str = "max-age=31536000; includeSubDomains";

async fn set_security_headers(environment: Environment, req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    for (name, value) in ALWAYS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    if environment.is_production() {
        headers.insert(header::STRICT_TRANSPORT_SECURITY, HeaderValue::from_static(HSTS));
    }

    response
}

/// Wrap `router` so every response, including errors and the fallback, carries
/// the security headers
pub fn apply_security_headers<S>(router: Router<S>, environment: Environment) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn(move |req, next| {
        set_security_headers(environment, req, next)
    }))
}
