//! nudgebet - nudge delivery and bet resolution core
//!
//! Delivers backend-triggered reminders ("nudges") one at a time and keeps
//! wagered commitments ("bets") resolved as their tasks start, complete or
//! expire.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, collaborator ports and error types
//! - **Infrastructure Layer** (`infrastructure`): HTTP backend client, SSE
//!   parsing, configuration, logging and in-memory collaborators
//! - **Service Layer** (`services`): reminder source, nudge queue, wager
//!   coordinator and the session that wires them together
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use nudgebet::domain::models::{Config, Credential};
//! use nudgebet::infrastructure::api::ApiClient;
//! use nudgebet::infrastructure::{InMemoryTaskDirectory, SessionCredentials};
//! use nudgebet::services::NudgeSession;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let client = Arc::new(ApiClient::new(config.api.clone().into())?);
//!     let credentials = Arc::new(SessionCredentials::with_credential(Credential::new("token")));
//!     let directory = Arc::new(InMemoryTaskDirectory::new());
//!
//!     let session = NudgeSession::start(&config, client.clone(), client, credentials, directory);
//!     let mut state = session.queue().subscribe();
//!     state.changed().await?;
//!     session.shutdown();
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{ApiError, DomainError, DomainResult};
pub use domain::models::{
    ActiveNudge, Bet, BettorProfile, Config, Credential, Nudge, ResolveOutcome, Task,
    TaskLifecycleEvent,
};
pub use domain::ports::{BetBackend, CredentialSource, NudgeBackend, TaskDirectory};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{NudgeQueue, NudgeSession, ReminderSource, WagerCoordinator};
