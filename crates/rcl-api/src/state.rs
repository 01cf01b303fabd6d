use std::{sync::Arc, time::Duration};

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sqlx::PgPool;

use crate::{
    ApiConfig,
    config::Environment,
    error::ApiError,
    llm::{LanguageModel, OpenAiClient},
};

#[derive(Clone)]
pub struct ApiState {
    pub pool: PgPool,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub refresh_token_expiry_days: i64,
    pub cookie_key: Key,
    pub cookie_domain: Option<String>,
    pub environment: Environment,
    pub bcrypt_cost: u32,
    /// `None` when no model is configured; generation endpoints answer 503
    pub llm: Option<Arc<dyn LanguageModel>>,
}

/// Subset of the state needed to validate access tokens
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

/// Attributes applied to every auth cookie
#[derive(Clone, Debug)]
pub struct CookieConfig {
    pub environment: Environment,
    pub domain: Option<String>,
    pub jwt_expiry_hours: i64,
    pub refresh_token_expiry_days: i64,
}

impl ApiState {
    pub fn new(config: ApiConfig, pool: PgPool) -> anyhow::Result<Self> {
        let cookie_key = Key::from(config.cookie_secret.as_bytes());

        let llm: Option<Arc<dyn LanguageModel>> = match config.llm_api_key {
            Some(api_key) => {
                let client = OpenAiClient::new(
                    &config.llm_base_url,
                    api_key,
                    config.llm_model.clone(),
                    Duration::from_secs(config.llm_timeout_secs),
                )?;
                tracing::info!(model = %config.llm_model, "Language model client configured");
                Some(Arc::new(client))
            }
            None => {
                tracing::warn!("Language model not configured (missing LLM_API_KEY)");
                None
            }
        };

        Ok(Self {
            pool,
            jwt_secret: config.jwt_secret,
            jwt_expiry_hours: config.jwt_expiry_hours,
            refresh_token_expiry_days: config.refresh_token_expiry_days,
            cookie_key,
            cookie_domain: config.cookie_domain,
            environment: config.env,
            bcrypt_cost: config.bcrypt_cost,
            llm,
        })
    }

    /// The configured language model, or 503 when there is none.
    pub fn llm(&self) -> Result<&dyn LanguageModel, ApiError> {
        self.llm.as_deref().ok_or_else(|| {
            ApiError::ServiceUnavailable("Language model is not configured".to_string())
        })
    }

    pub fn cookie_config(&self) -> CookieConfig {
        CookieConfig::from_ref(self)
    }
}

impl FromRef<ApiState> for Key {
    fn from_ref(state: &ApiState) -> Self {
        state.cookie_key.clone()
    }
}

impl FromRef<ApiState> for AuthConfig {
    fn from_ref(state: &ApiState) -> Self {
        Self {
            jwt_secret: state.jwt_secret.clone(),
        }
    }
}

impl FromRef<ApiState> for CookieConfig {
    fn from_ref(state: &ApiState) -> Self {
        Self {
            environment: state.environment,
            domain: state.cookie_domain.clone(),
            jwt_expiry_hours: state.jwt_expiry_hours,
            refresh_token_expiry_days: state.refresh_token_expiry_days,
        }
    }
}
