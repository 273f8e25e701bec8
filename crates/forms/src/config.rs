use anyhow::{Context, Result};

/// Transport configuration loaded from environment variables.
/// Fails loudly at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub auth_token: Option<String>,
}

impl TransportConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(TransportConfig {
            base_url: require_env("API_BASE_URL")?,
            timeout_secs: std::env::var("API_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse::<u64>()
                .context("API_TIMEOUT_SECS must be a number of seconds")?,
            max_retries: std::env::var("API_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse::<u32>()
                .context("API_MAX_RETRIES must be a number")?,
            auth_token: std::env::var("API_AUTH_TOKEN").ok(),
        })
    }

    /// Programmatic constructor with the same defaults as the env path.
    pub fn new(base_url: impl Into<String>) -> Self {
        TransportConfig {
            base_url: base_url.into(),
            timeout_secs: 30,
            max_retries: 3,
            auth_token: None,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
