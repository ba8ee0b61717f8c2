//! Ports to the collaborators the core depends on.
//!
//! The reminder pipeline and the wager coordinator receive implementations
//! of these traits through their constructors; nothing is looked up
//! ambiently.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use tokio::sync::broadcast;

use super::errors::ApiError;
use super::models::{
    Bet, BettorProfile, Credential, CredentialEvent, Nudge, NudgeStatus, PlaceBetRequest,
    PushMessage, ResolveBetResponse, Task,
};

/// Live push connection. Dropping the stream closes the connection.
pub type PushStream = BoxStream<'static, Result<PushMessage, ApiError>>;

/// Supplies the current bearer credential and announces renewal/invalidation.
pub trait CredentialSource: Send + Sync {
    fn current_credential(&self) -> Option<Credential>;

    fn subscribe(&self) -> broadcast::Receiver<CredentialEvent>;
}

/// Signal that the task directory finished a fresh load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryEvent {
    DataLoaded,
}

/// Read-only task lookup shared by the nudge queue and the coordinator.
pub trait TaskDirectory: Send + Sync {
    /// Resolve a task id to its display metadata
    fn resolve(&self, task_id: &str) -> Option<Task>;

    fn subscribe(&self) -> broadcast::Receiver<DirectoryEvent>;
}

/// NudgeEngine backend: push subscription plus the pull queries.
#[async_trait]
pub trait NudgeBackend: Send + Sync {
    /// Open the server-initiated stream
    ///
    /// # Returns
    /// * `Ok(PushStream)` once the server accepted the subscription
    /// * `Err(ApiError)` if the connection or authentication failed
    async fn open_stream(&self, credential: &Credential) -> Result<PushStream, ApiError>;

    /// All nudges that are triggered and ready for delivery
    async fn ready_nudges(&self, credential: &Credential) -> Result<Vec<Nudge>, ApiError>;

    /// Nudges for the user, optionally filtered by status and capped by `limit`
    async fn user_nudges(
        &self,
        credential: &Credential,
        status: Option<NudgeStatus>,
        limit: Option<u32>,
    ) -> Result<Vec<Nudge>, ApiError>;
}

/// MicroBet backend. Every call is keyed by credential (and task id where
/// relevant); resolve calls are idempotent on the server.
#[async_trait]
pub trait BetBackend: Send + Sync {
    async fn resolve_bet(
        &self,
        credential: &Credential,
        task_id: &str,
        completion_time: DateTime<Utc>,
    ) -> Result<ResolveBetResponse, ApiError>;

    async fn resolve_expired_bet(
        &self,
        credential: &Credential,
        task_id: &str,
    ) -> Result<ResolveBetResponse, ApiError>;

    async fn expired_bets(&self, credential: &Credential) -> Result<Vec<Bet>, ApiError>;

    async fn active_bets(&self, credential: &Credential) -> Result<Vec<Bet>, ApiError>;

    /// Fails with a not-found error until the bettor has been initialized
    async fn profile(&self, credential: &Credential) -> Result<BettorProfile, ApiError>;

    /// Create the bettor profile for a user who has never bet
    async fn initialize_bettor(&self, credential: &Credential) -> Result<(), ApiError>;

    /// The bet paired with a task, resolved or not; `None` when the task has no bet
    async fn bet(&self, credential: &Credential, task_id: &str) -> Result<Option<Bet>, ApiError>;

    /// Most recent bets first, at most `limit` of them
    async fn recent_activity(&self, credential: &Credential, limit: u32)
        -> Result<Vec<Bet>, ApiError>;

    /// Returns the id of the newly placed bet
    async fn place_bet(
        &self,
        credential: &Credential,
        request: &PlaceBetRequest,
    ) -> Result<String, ApiError>;

    async fn cancel_bet(&self, credential: &Credential, task_id: &str) -> Result<(), ApiError>;
}
