use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

pub const DEFAULT_API_URL: &str = "https://surveys-backend-1mxy.onrender.com/api/v2";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

pub const ENV_API_URL: &str = "SURVEY_API_URL";
pub const ENV_API_KEY: &str = "SURVEY_API_KEY";
pub const ENV_API_TOKEN: &str = "SURVEY_API_TOKEN";
pub const ENV_TIMEOUT_MS: &str = "SURVEY_TIMEOUT_MS";
pub const ENV_RETRY_COUNT: &str = "SURVEY_RETRY_COUNT";
pub const ENV_RETRY_DELAY_MS: &str = "SURVEY_RETRY_DELAY_MS";

/// Connection and retry settings shared by the fetch and submission services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_base_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_retry_count() -> u32 {
    DEFAULT_RETRY_COUNT
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            token: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl ClientConfig {
    /// Parses a JSON config; blank input yields the defaults.
    pub fn from_json_str(config_json: &str) -> Result<Self, ConfigError> {
        if config_json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(config_json).map_err(ConfigError::Parse)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from `SURVEY_*` keys resolved through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();
        if let Some(base_url) = value(ENV_API_URL) {
            config.base_url = base_url;
        }
        config.api_key = value(ENV_API_KEY);
        config.token = value(ENV_API_TOKEN);
        if let Some(raw) = value(ENV_TIMEOUT_MS) {
            config.timeout_ms = parse_number(ENV_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = value(ENV_RETRY_COUNT) {
            config.retry_count = parse_number(ENV_RETRY_COUNT, &raw)?;
        }
        if let Some(raw) = value(ENV_RETRY_DELAY_MS) {
            config.retry_delay_ms = parse_number(ENV_RETRY_DELAY_MS, &raw)?;
        }
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_count, Duration::from_millis(self.retry_delay_ms))
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}
