//! Command handlers and the shared context they are built from.

pub mod bets;
pub mod nudges;
pub mod task;
pub mod watch;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::domain::models::{Config, Credential};
use crate::infrastructure::api::ApiClient;
use crate::infrastructure::{InMemoryTaskDirectory, SessionCredentials};
use crate::services::WagerCoordinator;

/// Everything a command needs: configuration plus the optional token.
pub struct CliContext {
    pub config: Config,
    pub token: Option<String>,
}

impl CliContext {
    pub fn new(config: Config, token: Option<String>) -> Self {
        Self { config, token }
    }

    pub fn credential(&self) -> Result<Credential> {
        self.token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(Credential::new)
            .context("No access token. Pass --token or set NUDGEBET_TOKEN")
    }

    pub fn client(&self) -> Result<Arc<ApiClient>> {
        let client = ApiClient::new(self.config.api.clone().into())
            .context("Failed to create backend client")?;
        Ok(Arc::new(client))
    }

    /// Build a coordinator with the task directory loaded from the backend.
    ///
    /// A failed task listing is not fatal; bets are then placed without a
    /// due-date hint.
    pub async fn coordinator(&self) -> Result<WagerCoordinator> {
        let credential = self.credential()?;
        let client = self.client()?;

        let directory = Arc::new(InMemoryTaskDirectory::new());
        match client.fetch_tasks(&credential).await {
            Ok(tasks) => directory.load(tasks),
            Err(e) => tracing::warn!("could not load tasks: {}", e),
        }

        Ok(WagerCoordinator::new(
            client,
            Arc::new(SessionCredentials::with_credential(credential)),
            directory,
            &self.config.wagers,
        ))
    }
}
