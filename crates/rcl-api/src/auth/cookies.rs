use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::state::CookieConfig;

pub const AUTH_COOKIE: &str = "auth_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Create an auth cookie with the JWT token
///
/// Cookies are secure (HTTPS-only) in production and may be used over HTTP in
/// development. When a cookie domain is configured it is set so the session is
/// shared across subdomains.
pub fn create_auth_cookie(token: String, config: &CookieConfig) -> Cookie<'static> {
    build(
        AUTH_COOKIE,
        token,
        time::Duration::hours(config.jwt_expiry_hours),
        config,
    )
}

/// Create a refresh token cookie
pub fn create_refresh_token_cookie(token: String, config: &CookieConfig) -> Cookie<'static> {
    build(
        REFRESH_COOKIE,
        token,
        time::Duration::days(config.refresh_token_expiry_days),
        config,
    )
}

/// Cookie matching `name` by path and domain, for use with `PrivateCookieJar::remove`
pub fn removal_cookie(name: &'static str, config: &CookieConfig) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, "")).path("/").build();
    if let Some(domain) = &config.domain {
        cookie.set_domain(domain.clone());
    }
    cookie
}

fn build(
    name: &'static str,
    value: String,
    max_age: time::Duration,
    config: &CookieConfig,
) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, value))
        .path("/")
        .max_age(max_age)
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(!config.environment.is_development())
        .build();

    if let Some(domain) = &config.domain {
        cookie.set_domain(domain.clone());
    }

    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;

    fn config(environment: Environment, domain: Option<&str>) -> CookieConfig {
        CookieConfig {
            environment,
            domain: domain.map(String::from),
            jwt_expiry_hours: 24,
            refresh_token_expiry_days: 30,
        }
    }

    #[test]
    fn test_create_auth_cookie_development() {
        let cookie = create_auth_cookie("test_token".to_string(), &config(Environment::Development, None));

        assert_eq!(cookie.name(), "auth_token");
        assert_eq!(cookie.value(), "test_token");
        assert_eq!(cookie.path(), Some("/"));
        assert!(cookie.http_only().unwrap_or(false));
        assert!(
            !cookie.secure().unwrap_or(true),
            "Should not be secure in development"
        );
        assert_eq!(cookie.domain(), None);
        assert_eq!(cookie.max_age(), Some(time::Duration::hours(24)));
    }

    #[test]
    fn test_create_auth_cookie_production() {
        let cookie = create_auth_cookie(
            "test_token".to_string(),
            &config(Environment::Production, Some(".recall.app")),
        );

        assert!(
            cookie.secure().unwrap_or(false),
            "Should be secure in production"
        );
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        // The cookie library may strip the leading dot
        let domain = cookie.domain().unwrap();
        assert!(
            domain == ".recall.app" || domain == "recall.app",
            "Unexpected domain: {domain}"
        );
    }

    #[test]
    fn test_create_refresh_token_cookie() {
        let cookie = create_refresh_token_cookie(
            "refresh".to_string(),
            &config(Environment::Development, None),
        );

        assert_eq!(cookie.name(), "refresh_token");
        assert!(cookie.http_only().unwrap_or(false));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(30)));
    }

    #[test]
    fn test_removal_cookie_matches_domain() {
        let cookie = removal_cookie(AUTH_COOKIE, &config(Environment::Production, Some("recall.app")));

        assert_eq!(cookie.name(), "auth_token");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.domain(), Some("recall.app"));
    }
}
