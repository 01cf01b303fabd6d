use anyhow::{Context, bail};
use serde::Deserialize;

/// Minimum length accepted for `COOKIE_SECRET`, required by the private cookie key.
pub const MIN_COOKIE_SECRET_LEN: usize = 64;

/// Minimum length accepted for `JWT_SECRET`.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Deployment environment, read from `ENV`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub const fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Application configuration, deserialized from environment variables with `envy`.
///
/// Every field maps to the upper-cased variable of the same name, e.g.
/// `jwt_expiry_hours` is read from `JWT_EXPIRY_HOURS`.
#[derive(Clone, Debug, Deserialize)]
pub struct ApiConfig {
    /// Not needed on Shuttle, where the pool is provisioned by the runtime
    #[serde(default)]
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub cookie_secret: String,

    #[serde(default)]
    pub env: Environment,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Comma separated list of origins allowed by CORS
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: String,
    /// Domain attribute of auth cookies, host-only when unset
    #[serde(default)]
    pub cookie_domain: Option<String>,

    #[serde(default = "default_jwt_expiry_hours")]
    pub jwt_expiry_hours: i64,
    #[serde(default = "default_refresh_token_expiry_days")]
    pub refresh_token_expiry_days: i64,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// Quiz and card generation are disabled when unset
    #[serde(default)]
    pub llm_api_key: Option<String>,
    #[serde(default = "default_llm_base_url")]
    pub llm_base_url: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,
}

const fn default_port() -> u16 {
    3000
}

fn default_allowed_origins() -> String {
    "http://localhost:5173".to_string()
}

const fn default_jwt_expiry_hours() -> i64 {
    24
}

const fn default_refresh_token_expiry_days() -> i64 {
    30
}

const fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

const fn default_db_max_connections() -> u32 {
    10
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

const fn default_llm_timeout_secs() -> u64 {
    60
}

/// Keys forwarded from the Shuttle secret store.
#[cfg(feature = "shuttle")]
const SHUTTLE_KEYS: &[&str] = &[
    "JWT_SECRET",
    "COOKIE_SECRET",
    "ENV",
    "ALLOWED_ORIGINS",
    "COOKIE_DOMAIN",
    "JWT_EXPIRY_HOURS",
    "REFRESH_TOKEN_EXPIRY_DAYS",
    "BCRYPT_COST",
    "LLM_API_KEY",
    "LLM_BASE_URL",
    "LLM_MODEL",
    "LLM_TIMEOUT_SECS",
];

impl ApiConfig {
    /// Load the configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let config: Self =
            envy::from_env().context("Failed to read configuration from environment")?;
        if config.database_url.is_none() {
            bail!("DATABASE_URL must be set");
        }
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration from the Shuttle secret store.
    #[cfg(feature = "shuttle")]
    pub fn from_shuttle_secrets(secrets: &shuttle_runtime::SecretStore) -> anyhow::Result<Self> {
        let pairs: Vec<(String, String)> = SHUTTLE_KEYS
            .iter()
            .filter_map(|key| secrets.get(key).map(|value| ((*key).to_string(), value)))
            .collect();

        let config: Self =
            envy::from_iter(pairs).context("Failed to read configuration from Shuttle secrets")?;
        config.validate()?;
        Ok(config)
    }

    /// Check constraints `envy` cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cookie_secret.len() < MIN_COOKIE_SECRET_LEN {
            bail!("COOKIE_SECRET must be at least {MIN_COOKIE_SECRET_LEN} bytes long");
        }
        if self.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            bail!("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes long");
        }
        if self.jwt_expiry_hours <= 0 || self.refresh_token_expiry_days <= 0 {
            bail!("Token expiries must be positive");
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            bail!("BCRYPT_COST must be between 4 and 31");
        }
        Ok(())
    }

    pub fn parsed_allowed_origins(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(extra: &[(&str, &str)]) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("DATABASE_URL".to_string(), "postgres://localhost/recall".to_string()),
            ("JWT_SECRET".to_string(), "j".repeat(32)),
            ("COOKIE_SECRET".to_string(), "c".repeat(64)),
        ];
        pairs.extend(extra.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())));
        pairs
    }

    #[test]
    fn test_defaults() {
        let config: ApiConfig = envy::from_iter(vars(&[])).unwrap();

        assert_eq!(config.env, Environment::Development);
        assert_eq!(config.port, 3000);
        assert_eq!(config.jwt_expiry_hours, 24);
        assert_eq!(config.refresh_token_expiry_days, 30);
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert!(config.cookie_domain.is_none());
        assert!(config.llm_api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config: ApiConfig = envy::from_iter(vars(&[
            ("ENV", "production"),
            ("PORT", "8080"),
            ("LLM_API_KEY", "sk-test"),
            ("LLM_MODEL", "local-model"),
        ]))
        .unwrap();

        assert!(config.env.is_production());
        assert_eq!(config.port, 8080);
        assert!(config.llm_api_key.is_some());
        assert_eq!(config.llm_model, "local-model");
    }

    #[test]
    fn test_short_secrets_rejected() {
        let mut config: ApiConfig = envy::from_iter(vars(&[])).unwrap();
        config.cookie_secret = "short".to_string();
        assert!(config.validate().is_err());

        let mut config: ApiConfig = envy::from_iter(vars(&[])).unwrap();
        config.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bcrypt_cost_range() {
        let config: ApiConfig = envy::from_iter(vars(&[("BCRYPT_COST", "3")])).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parsed_allowed_origins() {
        let config: ApiConfig = envy::from_iter(vars(&[(
            "ALLOWED_ORIGINS",
            "https://recall.app, http://localhost:5173,,",
        )]))
        .unwrap();

        assert_eq!(
            config.parsed_allowed_origins(),
            vec!["https://recall.app", "http://localhost:5173"]
        );
    }
}
