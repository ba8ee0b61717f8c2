//! Infrastructure layer module
//!
//! Adapters behind the domain ports:
//! - Backend HTTP client and push-stream parsing
//! - Session credential store
//! - In-memory task directory
//! - Configuration management
//! - Logging infrastructure

pub mod api;
pub mod config;
pub mod credentials;
pub mod directory;
pub mod logging;

pub use credentials::SessionCredentials;
pub use directory::InMemoryTaskDirectory;
