//! Test configuration helpers for mock and live services

use lightcurve_dl::config::RetryConfig;
use lightcurve_dl::{Config, Retriever};
use std::time::Duration;

/// Error type for test configuration
#[derive(Debug)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Config error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Configuration pointed at a mock server, with fast polling and no fetch retries
pub fn mock_config(base_url: &str) -> Config {
    let mut config = Config::with_credentials("user@example.com", "secret");
    config.service.base_url = base_url.to_string();
    config.service.request_timeout = Duration::from_secs(5);
    config.polling.interval = Duration::from_millis(5);
    config.fetch.retry = RetryConfig {
        max_attempts: 0,
        ..Default::default()
    };
    config
}

/// Create an HTTP-backed retriever against a mock server
pub fn mock_retriever(config: Config) -> Retriever {
    Retriever::new(config).expect("mock configuration should validate")
}

/// Load service credentials from environment variables
///
/// Required environment variables:
/// - `ZTF_EMAIL` - Account email registered with the service
/// - `ZTF_PASSWORD` - Account password
pub fn load_live_config() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();

    let email = std::env::var("ZTF_EMAIL")
        .map_err(|_| ConfigError("ZTF_EMAIL not set in environment".to_string()))?;
    let password = std::env::var("ZTF_PASSWORD")
        .map_err(|_| ConfigError("ZTF_PASSWORD not set in environment".to_string()))?;

    let mut config = Config::with_credentials(email, password);
    config.polling.max_attempts = std::env::var("ZTF_POLL_ATTEMPTS")
        .ok()
        .and_then(|a| a.parse().ok())
        .unwrap_or(3);
    config.polling.interval = Duration::from_secs(10);
    Ok(config)
}

/// Check if live test credentials are available
pub fn has_live_credentials() -> bool {
    dotenvy::dotenv().ok();
    std::env::var("ZTF_EMAIL").is_ok() && std::env::var("ZTF_PASSWORD").is_ok()
}
