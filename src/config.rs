//! Startup configuration from environment variables

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
    #[error("No API key configured. Set GEMINI_API_KEY (or API_KEY), or LLM_GATEWAY")]
    MissingApiKey,
}

/// Configuration for the model provider
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    /// Gateway base URL replacing the public Gemini endpoint
    pub gateway: Option<String>,
    pub request_timeout: Duration,
}

impl LlmConfig {
    /// Key to send with requests. `None` in gateway mode without a key,
    /// where the gateway authenticates on its own.
    pub fn effective_api_key(&self) -> Result<Option<String>, ConfigError> {
        match (&self.api_key, &self.gateway) {
            (Some(key), _) => Ok(Some(key.clone())),
            (None, Some(_)) => Ok(None),
            (None, None) => Err(ConfigError::MissingApiKey),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub llm: LlmConfig,
    pub system_prompt_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = parse_number(&get, "GITA_PORT")?.unwrap_or(DEFAULT_PORT);
        let timeout_secs = parse_number(&get, "GITA_REQUEST_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        Ok(Self {
            port,
            llm: LlmConfig {
                api_key: get("GEMINI_API_KEY").or_else(|| get("API_KEY")),
                model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                gateway: get("LLM_GATEWAY"),
                request_timeout: Duration::from_secs(timeout_secs),
            },
            system_prompt_file: get("GITA_SYSTEM_PROMPT_FILE").map(PathBuf::from),
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    get(name)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber { name, value })
        })
        .transpose()
}
