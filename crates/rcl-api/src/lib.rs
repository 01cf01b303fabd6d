pub mod auth;
pub mod card;
pub mod category;
pub mod config;
pub mod deck;
pub mod error;
pub mod jobs;
pub mod llm;
pub mod markdown;
pub mod metrics;
pub mod middleware;
pub mod normalization;
pub mod quiz;
pub mod review;
pub mod router;
pub mod state;
pub mod tracing;
pub mod user;
pub mod v1;
pub mod validation;

pub use config::ApiConfig;
pub use state::{ApiState, AuthConfig, CookieConfig};
