use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main configuration structure for the nudge/wager core
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Backend API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Nudge delivery configuration
    #[serde(default)]
    pub nudges: NudgeConfig,

    /// Bet resolution configuration
    #[serde(default)]
    pub wagers: WagerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ApiConfig {
    /// Base URL all action endpoints hang off (`{base_url}/MicroBet/...`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds (does not apply to the push stream)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Path of the server-sent events subscription endpoint
    #[serde(default = "default_stream_path")]
    pub stream_path: String,
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

fn default_stream_path() -> String {
    "/NudgeEngine/subscribe".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            stream_path: default_stream_path(),
        }
    }
}

/// Nudge delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NudgeConfig {
    /// Interval between ready-nudge queries once in pull mode
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Pause between dismissing a nudge and showing the next one
    #[serde(default = "default_dismiss_delay_ms")]
    pub dismiss_delay_ms: u64,

    /// Capacity of the source → queue event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

const fn default_poll_interval_secs() -> u64 {
    60
}

const fn default_dismiss_delay_ms() -> u64 {
    500
}

const fn default_event_buffer() -> usize {
    64
}

impl Default for NudgeConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            dismiss_delay_ms: default_dismiss_delay_ms(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl NudgeConfig {
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub const fn dismiss_delay(&self) -> Duration {
        Duration::from_millis(self.dismiss_delay_ms)
    }
}

/// Bet resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WagerConfig {
    /// Interval of the expired-bet sweep
    #[serde(default = "default_expiry_sweep_interval_secs")]
    pub expiry_sweep_interval_secs: u64,
}

const fn default_expiry_sweep_interval_secs() -> u64 {
    120
}

impl Default for WagerConfig {
    fn default() -> Self {
        Self {
            expiry_sweep_interval_secs: default_expiry_sweep_interval_secs(),
        }
    }
}

impl WagerConfig {
    pub const fn expiry_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_sweep_interval_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Rotation for file output: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
