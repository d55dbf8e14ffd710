use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::gateway::backoff::BackoffConfig;
use crate::gateway::{intents, GatewayConfig, DEFAULT_GATEWAY_URL, DEFAULT_HELLO_TIMEOUT};

pub const DEFAULT_API_URL: &str = "https://discord.com/api/v10";
pub const DEFAULT_PREFIX: &str = "p!";
const PASTAS_FILE_NAME: &str = ".pastas.json";

pub struct Config {
    pub token: String,
    pub prefix: String,
    pub gateway_url: String,
    pub api_url: String,
    pub pastas_file: PathBuf,
    pub intents: u64,
    pub hello_timeout: Duration,
    pub backoff: BackoffConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = std::env::var("TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let pastas_file = match std::env::var("PASTABOT_PASTAS_FILE") {
            Ok(path) => PathBuf::from(path),
            Err(_) => directories::BaseDirs::new()
                .map(|dirs| dirs.home_dir().join(PASTAS_FILE_NAME))
                .ok_or(ConfigError::NoHomeDir)?,
        };

        let intents = match std::env::var("PASTABOT_INTENTS") {
            Ok(value) => intents::parse(&value)?,
            Err(_) => intents::DEFAULT_INTENTS,
        };

        let defaults = BackoffConfig::default();
        let backoff = BackoffConfig {
            base: env_u64("PASTABOT_BACKOFF_BASE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.base),
            max: env_u64("PASTABOT_BACKOFF_MAX_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.max),
        };

        Ok(Self {
            token,
            prefix: std::env::var("PASTABOT_PREFIX").unwrap_or_else(|_| DEFAULT_PREFIX.to_string()),
            gateway_url: std::env::var("PASTABOT_GATEWAY_URL")
                .unwrap_or_else(|_| DEFAULT_GATEWAY_URL.to_string()),
            api_url: std::env::var("PASTABOT_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            pastas_file,
            intents,
            hello_timeout: env_u64("PASTABOT_HELLO_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_HELLO_TIMEOUT),
            backoff,
        })
    }

    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            url: self.gateway_url.clone(),
            token: self.token.clone(),
            intents: self.intents,
            hello_timeout: self.hello_timeout,
            backoff: self.backoff.clone(),
        }
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
