//! Common test utilities for integration tests
//!
//! In-memory stand-ins for the backends the core talks to:
//! - `FakeNudgeBackend`: a push stream driven by the test, counted polls
//! - `LedgerBetBackend`: an idempotent bet ledger with a points balance

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::channel::mpsc;
use futures::StreamExt;
use tokio::sync::watch;

use nudgebet::domain::models::{
    Bet, BettorProfile, Credential, Nudge, NudgeStatus, PlaceBetRequest, PushMessage,
    ResolutionStatus, ResolveBetResponse,
};
use nudgebet::domain::ports::{BetBackend, NudgeBackend, PushStream};
use nudgebet::ApiError;

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Wait for a condition to be true with timeout
///
/// Polls the predicate every 10ms until it returns true or `timeout_ms`
/// elapses.
pub async fn wait_for<F>(mut predicate: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    while start.elapsed() < timeout {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    predicate()
}

pub fn credential() -> Credential {
    Credential::new("test-token")
}

/// A triggered nudge with a message, ready for presentation
pub fn triggered_nudge(id: &str, task: &str) -> Nudge {
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
    Nudge {
        id: id.to_string(),
        task: task.to_string(),
        delivery_time: at,
        triggered_at: Some(at),
        message: Some("Don't forget!".to_string()),
        canceled: false,
    }
}

pub fn push(nudge: Nudge) -> Result<PushMessage, ApiError> {
    Ok(PushMessage::Nudge { nudge })
}

pub type PushSender = mpsc::UnboundedSender<Result<PushMessage, ApiError>>;

/// Nudge backend whose push stream is fed by the test.
///
/// Every `open_stream` call hands out the next queued receiver; when none
/// is queued the subscription fails with a network error. While requests
/// are held, both calls park until `release_requests`.
pub struct FakeNudgeBackend {
    streams: Mutex<Vec<mpsc::UnboundedReceiver<Result<PushMessage, ApiError>>>>,
    ready: Mutex<Vec<Nudge>>,
    fail_polls: AtomicBool,
    held: watch::Sender<bool>,
    pub parked: AtomicUsize,
    pub stream_opens: AtomicUsize,
    pub polls: AtomicUsize,
}

impl FakeNudgeBackend {
    /// Backend that refuses push subscriptions
    pub fn without_push() -> Arc<Self> {
        Arc::new(Self {
            streams: Mutex::new(Vec::new()),
            ready: Mutex::new(Vec::new()),
            fail_polls: AtomicBool::new(false),
            held: watch::channel(false).0,
            parked: AtomicUsize::new(0),
            stream_opens: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
        })
    }

    /// Backend with one push stream available; the sender drives it
    pub fn with_push() -> (Arc<Self>, PushSender) {
        let backend = Self::without_push();
        let sender = backend.queue_stream();
        (backend, sender)
    }

    /// Make one more push subscription available
    pub fn queue_stream(&self) -> PushSender {
        let (tx, rx) = mpsc::unbounded();
        self.streams.lock().unwrap().insert(0, rx);
        tx
    }

    pub fn set_ready(&self, nudges: Vec<Nudge>) {
        *self.ready.lock().unwrap() = nudges;
    }

    pub fn fail_polls(&self, fail: bool) {
        self.fail_polls.store(fail, Ordering::SeqCst);
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn open_count(&self) -> usize {
        self.stream_opens.load(Ordering::SeqCst)
    }

    /// Park every following request until `release_requests`
    pub fn hold_requests(&self) {
        self.held.send_replace(true);
    }

    pub fn release_requests(&self) {
        self.held.send_replace(false);
    }

    /// Requests that have entered the gate while it was held
    pub fn parked_count(&self) -> usize {
        self.parked.load(Ordering::SeqCst)
    }

    async fn gate(&self) {
        let mut held = self.held.subscribe();
        if *held.borrow_and_update() {
            self.parked.fetch_add(1, Ordering::SeqCst);
            let _ = held.wait_for(|held| !*held).await;
        }
    }
}

#[async_trait]
impl NudgeBackend for FakeNudgeBackend {
    async fn open_stream(&self, _credential: &Credential) -> Result<PushStream, ApiError> {
        self.stream_opens.fetch_add(1, Ordering::SeqCst);
        self.gate().await;
        match self.streams.lock().unwrap().pop() {
            Some(rx) => Ok(rx.boxed()),
            None => Err(ApiError::Network("connection refused".to_string())),
        }
    }

    async fn ready_nudges(&self, _credential: &Credential) -> Result<Vec<Nudge>, ApiError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.gate().await;
        if self.fail_polls.load(Ordering::SeqCst) {
            return Err(ApiError::Http {
                status: 503,
                message: "HTTP 503".to_string(),
            });
        }
        Ok(self.ready.lock().unwrap().clone())
    }

    async fn user_nudges(
        &self,
        _credential: &Credential,
        _status: Option<NudgeStatus>,
        _limit: Option<u32>,
    ) -> Result<Vec<Nudge>, ApiError> {
        Ok(self.ready.lock().unwrap().clone())
    }
}

#[derive(Debug, Clone)]
struct LedgerEntry {
    bet: Bet,
}

/// Bet backend that resolves each bet exactly once, like the server.
pub struct LedgerBetBackend {
    bets: Mutex<HashMap<String, LedgerEntry>>,
    profile: Mutex<BettorProfile>,
    initialized: AtomicBool,
    fail_refresh: AtomicBool,
    fail_resolve: AtomicBool,
    seeded: AtomicUsize,
    pub resolve_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
    pub initialize_calls: AtomicUsize,
}

impl LedgerBetBackend {
    pub fn new() -> Arc<Self> {
        let ledger = Self::uninitialized();
        ledger.initialized.store(true, Ordering::SeqCst);
        ledger
    }

    /// Ledger for a user who never bet: no profile until `initialize_bettor`
    pub fn uninitialized() -> Arc<Self> {
        Arc::new(Self {
            bets: Mutex::new(HashMap::new()),
            profile: Mutex::new(BettorProfile {
                points: 100,
                ..Default::default()
            }),
            initialized: AtomicBool::new(false),
            fail_refresh: AtomicBool::new(false),
            fail_resolve: AtomicBool::new(false),
            seeded: AtomicUsize::new(0),
            resolve_calls: AtomicUsize::new(0),
            profile_calls: AtomicUsize::new(0),
            initialize_calls: AtomicUsize::new(0),
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Seed an unresolved bet directly (bypassing placement)
    pub fn seed(&self, task: &str, wager: i64, deadline: DateTime<Utc>) {
        // Strictly increasing creation times keep recent-activity order stable
        let n = self.seeded.fetch_add(1, Ordering::SeqCst) as i64;
        let bet = Bet {
            id: format!("bet-{task}"),
            user: Some("u1".to_string()),
            task: task.to_string(),
            wager,
            deadline,
            task_due_date: None,
            success: None,
            created_at: Some(Utc::now() + chrono::Duration::milliseconds(n)),
        };
        self.bets
            .lock()
            .unwrap()
            .insert(task.to_string(), LedgerEntry { bet });
        let mut profile = self.profile.lock().unwrap();
        profile.total_bets += 1;
        profile.pending_bets += 1;
    }

    pub fn points(&self) -> i64 {
        self.profile.lock().unwrap().points
    }

    pub fn outcome(&self, task: &str) -> Option<bool> {
        self.bets.lock().unwrap().get(task).and_then(|e| e.bet.success)
    }

    pub fn fail_refresh(&self, fail: bool) {
        self.fail_refresh.store(fail, Ordering::SeqCst);
    }

    pub fn fail_resolve(&self, fail: bool) {
        self.fail_resolve.store(fail, Ordering::SeqCst);
    }

    fn settle(&self, task: &str, success: bool) -> Result<ResolveBetResponse, ApiError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_resolve.load(Ordering::SeqCst) {
            return Err(ApiError::Network("connection reset".to_string()));
        }

        let mut bets = self.bets.lock().unwrap();
        let Some(entry) = bets.get_mut(task) else {
            return Err(ApiError::NotFound("No bet found for task".to_string()));
        };
        if entry.bet.success.is_some() {
            return Ok(ResolveBetResponse {
                status: Some(ResolutionStatus::AlreadyResolved),
                reward: None,
            });
        }

        entry.bet.success = Some(success);
        let mut profile = self.profile.lock().unwrap();
        profile.pending_bets = profile.pending_bets.saturating_sub(1);
        if success {
            let reward = entry.bet.wager * 2;
            profile.points += reward;
            profile.successful_bets += 1;
            profile.streak += 1;
            Ok(ResolveBetResponse {
                status: Some(ResolutionStatus::Success),
                reward: Some(reward),
            })
        } else {
            profile.points -= entry.bet.wager;
            profile.failed_bets += 1;
            profile.streak = 0;
            Ok(ResolveBetResponse::default())
        }
    }
}

#[async_trait]
impl BetBackend for LedgerBetBackend {
    async fn resolve_bet(
        &self,
        _credential: &Credential,
        task_id: &str,
        completion_time: DateTime<Utc>,
    ) -> Result<ResolveBetResponse, ApiError> {
        let deadline = self
            .bets
            .lock()
            .unwrap()
            .get(task_id)
            .map(|e| e.bet.deadline);
        let on_time = deadline.is_none_or(|d| completion_time <= d);
        self.settle(task_id, on_time)
    }

    async fn resolve_expired_bet(
        &self,
        _credential: &Credential,
        task_id: &str,
    ) -> Result<ResolveBetResponse, ApiError> {
        // Give a concurrent task-event resolve a chance to interleave
        tokio::task::yield_now().await;
        self.settle(task_id, false)
    }

    async fn expired_bets(&self, _credential: &Credential) -> Result<Vec<Bet>, ApiError> {
        let now = Utc::now();
        Ok(self
            .bets
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.bet.success.is_none() && e.bet.deadline < now)
            .map(|e| e.bet.clone())
            .collect())
    }

    async fn active_bets(&self, _credential: &Credential) -> Result<Vec<Bet>, ApiError> {
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(ApiError::Network("timeout".to_string()));
        }
        let mut bets: Vec<Bet> = self
            .bets
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.bet.success.is_none())
            .map(|e| e.bet.clone())
            .collect();
        bets.sort_by(|a, b| a.task.cmp(&b.task));
        Ok(bets)
    }

    async fn profile(&self, _credential: &Credential) -> Result<BettorProfile, ApiError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(ApiError::Network("timeout".to_string()));
        }
        if !self.is_initialized() {
            return Err(ApiError::NotFound("Bettor profile not found".to_string()));
        }
        Ok(self.profile.lock().unwrap().clone())
    }

    async fn initialize_bettor(&self, _credential: &Credential) -> Result<(), ApiError> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(ApiError::Backend("Bettor already initialized".to_string()));
        }
        Ok(())
    }

    async fn bet(&self, _credential: &Credential, task_id: &str) -> Result<Option<Bet>, ApiError> {
        Ok(self.bets.lock().unwrap().get(task_id).map(|e| e.bet.clone()))
    }

    async fn recent_activity(
        &self,
        _credential: &Credential,
        limit: u32,
    ) -> Result<Vec<Bet>, ApiError> {
        let mut bets: Vec<Bet> = self
            .bets
            .lock()
            .unwrap()
            .values()
            .map(|e| e.bet.clone())
            .collect();
        bets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        bets.truncate(limit as usize);
        Ok(bets)
    }

    async fn place_bet(
        &self,
        _credential: &Credential,
        request: &PlaceBetRequest,
    ) -> Result<String, ApiError> {
        if self.bets.lock().unwrap().contains_key(&request.task) {
            return Err(ApiError::Backend("Task already has a bet".to_string()));
        }
        self.seed(&request.task, request.wager, request.deadline);
        let mut bets = self.bets.lock().unwrap();
        let entry = bets
            .get_mut(&request.task)
            .ok_or_else(|| ApiError::Backend("bet vanished".to_string()))?;
        entry.bet.task_due_date = request.task_due_date;
        Ok(entry.bet.id.clone())
    }

    async fn cancel_bet(&self, _credential: &Credential, task_id: &str) -> Result<(), ApiError> {
        match self.bets.lock().unwrap().remove(task_id) {
            Some(_) => {
                let mut profile = self.profile.lock().unwrap();
                profile.pending_bets = profile.pending_bets.saturating_sub(1);
                profile.total_bets = profile.total_bets.saturating_sub(1);
                Ok(())
            }
            None => Err(ApiError::NotFound("Bet not found".to_string())),
        }
    }
}
