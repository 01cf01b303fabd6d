pub mod cookies;
pub mod jwt;
pub mod middleware;
pub mod refresh_token;
pub mod routes;
pub mod service;
pub mod validation;

pub use middleware::AuthUser;
pub use routes::routes;
