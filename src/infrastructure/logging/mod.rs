//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - JSON or pretty console output
//! - Rolling JSON log files
//! - Credential scrubbing for logged URLs and bodies

pub mod config;
pub mod logger;
pub mod secret_scrubbing;

pub use config::{LogFormat, RotationPolicy};
pub use logger::LoggerImpl;
pub use secret_scrubbing::SecretScrubber;
