//! Wager resolution coordinator.
//!
//! Reacts to task lifecycle transitions by resolving the task's paired bet,
//! and sweeps bets whose deadline passed without resolution. Both paths may
//! race on the same bet; the backend's idempotent resolve makes the loser
//! see `already_resolved`, which is a successful no-op here.
//!
//! The coordinator also maintains the observable bet aggregate (profile and
//! active bets). Refreshes after task events are fire-and-forget; their
//! failures are logged and never reported to the caller.
//!
//! A user who has never bet has no profile on the server. `initialize`
//! creates it on first sight so the aggregate is never stuck without one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{ApiError, DomainError, DomainResult};
use crate::domain::models::{
    Bet, BettorProfile, Credential, PlaceBetRequest, ResolveBetResponse, ResolveOutcome,
    TaskLifecycleEvent, WagerConfig,
};
use crate::domain::ports::{BetBackend, CredentialSource, TaskDirectory};

/// `tokio::time::interval` rejects a zero period.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Read-only projection of the bettor's state for rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WagerAggregate {
    pub profile: Option<BettorProfile>,
    pub active_bets: Vec<Bet>,
}

impl WagerAggregate {
    pub fn has_active_bet(&self, task_id: &str) -> bool {
        self.active_bets.iter().any(|b| b.task == task_id)
    }

    pub fn total_wagered(&self) -> i64 {
        self.active_bets.iter().map(|b| b.wager).sum()
    }
}

/// Summary of one expired-bet sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Unresolved expired bets returned by the backend
    pub examined: usize,
    pub resolved: usize,
    pub already_resolved: usize,
    /// Bets that vanished between listing and resolving
    pub missing: usize,
    pub failed: usize,
}

/// How the bettor profile was found at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BettorBootstrap {
    Existing,
    /// The profile was missing and has just been created
    Initialized,
}

impl SweepReport {
    fn record(&mut self, outcome: ResolveOutcome) {
        match outcome {
            ResolveOutcome::Resolved { .. } => self.resolved += 1,
            ResolveOutcome::AlreadyResolved => self.already_resolved += 1,
            ResolveOutcome::NoBet => self.missing += 1,
        }
    }

    /// Whether any bet changed state on the server.
    pub const fn touched_any(&self) -> bool {
        self.resolved + self.already_resolved > 0
    }
}

struct Shared {
    backend: Arc<dyn BetBackend>,
    credentials: Arc<dyn CredentialSource>,
    aggregate: watch::Sender<WagerAggregate>,
    /// Bumped by `clear()`; refreshes started before it are discarded
    epoch: AtomicU64,
}

impl Shared {
    fn credential(&self) -> DomainResult<Credential> {
        self.credentials
            .current_credential()
            .ok_or(DomainError::NotAuthenticated)
    }

    async fn refresh(&self) {
        let Ok(credential) = self.credential() else {
            debug!("skipping bet refresh, no credential");
            return;
        };
        let epoch = self.epoch.load(Ordering::Acquire);
        self.refresh_from(&credential, epoch).await;
    }

    /// Reload active bets and profile. Each half is applied on its own so
    /// one failing does not discard the other. Results are dropped when
    /// `clear()` ran after `epoch` was read.
    async fn refresh_from(&self, credential: &Credential, epoch: u64) {
        let (bets, profile) = futures::join!(
            self.backend.active_bets(credential),
            self.backend.profile(credential)
        );

        self.aggregate.send_if_modified(|aggregate| {
            if self.epoch.load(Ordering::Acquire) != epoch {
                return false;
            }
            let mut changed = false;
            match bets {
                Ok(bets) => {
                    changed |= aggregate.active_bets != bets;
                    aggregate.active_bets = bets;
                }
                Err(ref e) => warn!("failed to refresh active bets: {}", e),
            }
            match profile {
                Ok(profile) => {
                    changed |= aggregate.profile.as_ref() != Some(&profile);
                    aggregate.profile = Some(profile);
                }
                Err(ref e) if e.is_not_found() => debug!("no bettor profile yet"),
                Err(ref e) => warn!("failed to refresh bettor profile: {}", e),
            }
            changed
        });
    }

    async fn initialize(&self) -> DomainResult<BettorBootstrap> {
        let credential = self.credential()?;
        let epoch = self.epoch.load(Ordering::Acquire);

        let bootstrap = match self.backend.profile(&credential).await {
            Ok(_) => BettorBootstrap::Existing,
            Err(e) if e.is_not_found() => {
                info!("no bettor profile, initializing");
                self.backend.initialize_bettor(&credential).await?;
                BettorBootstrap::Initialized
            }
            Err(e) => return Err(e.into()),
        };

        self.refresh_from(&credential, epoch).await;
        Ok(bootstrap)
    }

    async fn sweep_expired(&self) -> DomainResult<SweepReport> {
        let credential = self.credential()?;
        let expired = self.backend.expired_bets(&credential).await?;

        // The backend decides expiry; only skip bets it already reports resolved
        let mut report = SweepReport::default();
        for bet in expired.iter().filter(|b| !b.is_resolved()) {
            report.examined += 1;
            match resolution(self.backend.resolve_expired_bet(&credential, &bet.task).await) {
                Ok(outcome) => {
                    debug!(task_id = %bet.task, ?outcome, "expired bet processed");
                    report.record(outcome);
                }
                Err(e) => {
                    warn!(task_id = %bet.task, "failed to resolve expired bet: {}", e);
                    report.failed += 1;
                }
            }
        }

        if report.touched_any() {
            self.refresh().await;
        }
        if report.examined > 0 {
            info!(?report, "expired bet sweep finished");
        }
        Ok(report)
    }
}

/// Map a resolve response onto a terminal outcome; a missing bet is a
/// normal value, not an error.
fn resolution(result: Result<ResolveBetResponse, ApiError>) -> Result<ResolveOutcome, ApiError> {
    match result {
        Ok(response) => Ok(response.into()),
        Err(e) if e.is_not_found() => Ok(ResolveOutcome::NoBet),
        Err(e) => Err(e),
    }
}

/// Drives bet resolution from task lifecycle events and deadlines.
pub struct WagerCoordinator {
    shared: Arc<Shared>,
    directory: Arc<dyn TaskDirectory>,
    sweep_interval: Duration,
    sweep_task: Mutex<Option<JoinHandle<()>>>,
}

impl WagerCoordinator {
    pub fn new(
        backend: Arc<dyn BetBackend>,
        credentials: Arc<dyn CredentialSource>,
        directory: Arc<dyn TaskDirectory>,
        config: &WagerConfig,
    ) -> Self {
        let (aggregate, _) = watch::channel(WagerAggregate::default());
        Self {
            shared: Arc::new(Shared {
                backend,
                credentials,
                aggregate,
                epoch: AtomicU64::new(0),
            }),
            directory,
            sweep_interval: config.expiry_sweep_interval(),
            sweep_task: Mutex::new(None),
        }
    }

    /// Resolve the bet of a task that was just started.
    pub async fn on_task_started(
        &self,
        task_id: &str,
        started_at: DateTime<Utc>,
    ) -> DomainResult<ResolveOutcome> {
        self.resolve_for_task(task_id, started_at).await
    }

    /// Resolve the bet of a task that was just completed. Harmless when the
    /// start already resolved it.
    pub async fn on_task_completed(
        &self,
        task_id: &str,
        completed_at: DateTime<Utc>,
    ) -> DomainResult<ResolveOutcome> {
        self.resolve_for_task(task_id, completed_at).await
    }

    /// The backend cascades bet cancellation on delete; only the local
    /// aggregate needs reloading. Never fails.
    pub async fn on_task_deleted(&self, task_id: &str) {
        debug!(task_id, "task deleted, refreshing bets");
        self.shared.refresh().await;
    }

    /// Dispatch a lifecycle event. Deletions yield `None`.
    pub async fn on_lifecycle_event(
        &self,
        event: &TaskLifecycleEvent,
    ) -> DomainResult<Option<ResolveOutcome>> {
        match event {
            TaskLifecycleEvent::Started { task_id, at } => {
                self.on_task_started(task_id, *at).await.map(Some)
            }
            TaskLifecycleEvent::Completed { task_id, at } => {
                self.on_task_completed(task_id, *at).await.map(Some)
            }
            TaskLifecycleEvent::Deleted { task_id } => {
                self.on_task_deleted(task_id).await;
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, at))]
    async fn resolve_for_task(
        &self,
        task_id: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<ResolveOutcome> {
        let credential = self.shared.credential()?;
        let outcome = resolution(self.shared.backend.resolve_bet(&credential, task_id, at).await)?;

        match outcome {
            ResolveOutcome::Resolved { reward } => info!(?reward, "bet resolved"),
            ResolveOutcome::AlreadyResolved => debug!("bet already resolved"),
            ResolveOutcome::NoBet => debug!("task has no bet"),
        }

        if outcome != ResolveOutcome::NoBet {
            self.refresh_in_background();
        }
        Ok(outcome)
    }

    /// Run one expired-bet sweep now.
    pub async fn sweep_expired(&self) -> DomainResult<SweepReport> {
        self.shared.sweep_expired().await
    }

    /// Start the periodic sweep; the first run happens immediately.
    /// A no-op while already running.
    pub fn start_expiry_sweep(&self) {
        let mut slot = self.lock_sweep();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let shared = Arc::clone(&self.shared);
        let period = self.sweep_interval.max(MIN_SWEEP_INTERVAL);
        info!(interval_ms = period.as_millis() as u64, "starting expired bet sweep");

        *slot = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match shared.sweep_expired().await {
                    Ok(_) => {}
                    Err(DomainError::NotAuthenticated) => debug!("sweep skipped, no credential"),
                    Err(e) => warn!("expired bet sweep failed: {}", e),
                }
            }
        }));
    }

    pub fn stop_expiry_sweep(&self) {
        if let Some(handle) = self.lock_sweep().take() {
            handle.abort();
            info!("expired bet sweep stopped");
        }
    }

    pub fn is_sweeping(&self) -> bool {
        self.lock_sweep()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Reload profile and active bets, logging failures.
    pub async fn refresh(&self) {
        self.shared.refresh().await;
    }

    fn refresh_in_background(&self) {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move { shared.refresh().await });
    }

    /// Make sure the bettor has a profile, creating it when the server has
    /// none, then load the aggregate.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> DomainResult<BettorBootstrap> {
        self.shared.initialize().await
    }

    /// Run `initialize` on its own task; failures are logged.
    pub fn initialize_in_background(&self) {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            match shared.initialize().await {
                Ok(bootstrap) => debug!(?bootstrap, "bettor ready"),
                Err(DomainError::NotAuthenticated) => {
                    debug!("bettor bootstrap skipped, no credential")
                }
                Err(e) => warn!("failed to initialize bettor: {}", e),
            }
        });
    }

    /// The bet on a task, resolved or not. `None` when the task never had one.
    pub async fn bet(&self, task_id: &str) -> DomainResult<Option<Bet>> {
        let credential = self.shared.credential()?;
        Ok(self.shared.backend.bet(&credential, task_id).await?)
    }

    /// Latest bets, newest first.
    pub async fn recent_activity(&self, limit: u32) -> DomainResult<Vec<Bet>> {
        let credential = self.shared.credential()?;
        Ok(self.shared.backend.recent_activity(&credential, limit).await?)
    }

    /// Place a bet on a task. Errors are returned to the caller.
    #[instrument(skip(self, deadline))]
    pub async fn place_bet(
        &self,
        task_id: &str,
        wager: i64,
        deadline: DateTime<Utc>,
    ) -> DomainResult<String> {
        let credential = self.shared.credential()?;
        if wager <= 0 {
            return Err(DomainError::Validation(format!(
                "wager must be positive, got {wager}"
            )));
        }

        let request = PlaceBetRequest {
            task: task_id.to_string(),
            wager,
            deadline,
            task_due_date: self.directory.resolve(task_id).and_then(|t| t.due_date),
        };
        let bet_id = self.shared.backend.place_bet(&credential, &request).await?;
        info!(bet_id = %bet_id, "bet placed");

        self.shared.refresh().await;
        Ok(bet_id)
    }

    /// Cancel the bet on a task. Errors are returned to the caller.
    #[instrument(skip(self))]
    pub async fn cancel_bet(&self, task_id: &str) -> DomainResult<()> {
        let credential = self.shared.credential()?;
        self.shared.backend.cancel_bet(&credential, task_id).await?;

        self.shared.aggregate.send_if_modified(|aggregate| {
            let before = aggregate.active_bets.len();
            aggregate.active_bets.retain(|b| b.task != task_id);
            aggregate.active_bets.len() != before
        });
        info!("bet canceled");

        self.shared.refresh().await;
        Ok(())
    }

    pub fn aggregate(&self) -> WagerAggregate {
        self.shared.aggregate.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WagerAggregate> {
        self.shared.aggregate.subscribe()
    }

    /// Forget the aggregate (session end). In-flight refreshes are dropped.
    pub fn clear(&self) {
        self.shared.aggregate.send_modify(|aggregate| {
            self.shared.epoch.fetch_add(1, Ordering::AcqRel);
            *aggregate = WagerAggregate::default();
        });
    }

    fn lock_sweep(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.sweep_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for WagerCoordinator {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_sweep().take() {
            handle.abort();
        }
    }
}
