use std::path::Path;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use reqwest::Url;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Environment variable prefix; nested keys use `__`
/// (`NUDGEBET_NUDGES__POLL_INTERVAL_SECS=30`).
pub const ENV_PREFIX: &str = "NUDGEBET_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("API base_url cannot be empty")]
    EmptyBaseUrl,

    #[error("Invalid base_url: {url}. {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Invalid timeout_secs: {0}. Must be at least 1")]
    InvalidTimeout(u64),

    #[error("Invalid {field}: must be greater than zero")]
    ZeroInterval { field: &'static str },

    #[error("Invalid event_buffer: {0}. Must be at least 1")]
    InvalidEventBuffer(usize),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .nudgebet/config.yaml (project config)
    /// 3. .nudgebet/local.yaml (local overrides, optional)
    /// 4. Environment variables (NUDGEBET_* prefix)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".nudgebet")
    }

    /// Same precedence as [`ConfigLoader::load`], rooted at `dir`
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Config> {
        let dir = dir.as_ref();
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file (no environment overrides)
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.api.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        match Url::parse(&config.api.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ConfigError::InvalidBaseUrl {
                    url: config.api.base_url.clone(),
                    reason: format!("Unsupported scheme '{}', expected http or https", url.scheme()),
                });
            }
            Err(e) => {
                return Err(ConfigError::InvalidBaseUrl {
                    url: config.api.base_url.clone(),
                    reason: e.to_string(),
                });
            }
        }
        if config.api.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(config.api.timeout_secs));
        }

        if config.nudges.poll_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval {
                field: "nudges.poll_interval_secs",
            });
        }
        if config.nudges.event_buffer == 0 {
            return Err(ConfigError::InvalidEventBuffer(config.nudges.event_buffer));
        }
        if config.wagers.expiry_sweep_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval {
                field: "wagers.expiry_sweep_interval_secs",
            });
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        Ok(())
    }
}
