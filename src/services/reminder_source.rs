//! Reminder source.
//!
//! Produces "reminder ready" notifications from the NudgeEngine without the
//! consumer knowing how they arrived:
//! - Push: a long-lived event stream; after `connected` the server replays
//!   the backlog, then forwards live nudges
//! - Pull: one immediate query for ready nudges, then one per interval
//!
//! Push is attempted first on every `start()`. Any stream error or close
//! switches the session to pull mode permanently; push is only retried on
//! the next `start()`. The two modes run sequentially inside a single worker
//! task, so a live connection and a poll timer never coexist.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::domain::models::{Credential, Nudge, NudgeConfig, PushMessage};
use crate::domain::ports::NudgeBackend;

/// `tokio::time::interval` rejects a zero period.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration for the reminder source.
#[derive(Debug, Clone)]
pub struct ReminderSourceConfig {
    /// Interval between ready-nudge queries in pull mode.
    pub poll_interval: Duration,
}

impl Default for ReminderSourceConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
        }
    }
}

impl From<&NudgeConfig> for ReminderSourceConfig {
    fn from(config: &NudgeConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
        }
    }
}

/// Delivery mechanism currently in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    Idle,
    Push,
    Pull,
}

/// Event emitted by the reminder source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// A nudge was reported ready (backlog replay, live push or poll).
    ReminderReady(Nudge),
    /// The push stream failed or closed; polling takes over.
    ConnectionLost,
    /// The push stream acknowledged the subscription.
    ConnectionRestored,
}

/// A source event tagged with the run that produced it.
///
/// Consumers drop messages whose generation is no longer current (see
/// [`ReminderSource::is_current`]); they were produced before a `stop()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMessage {
    pub generation: u64,
    pub event: SourceEvent,
}

/// Push/pull reminder source with automatic failover.
pub struct ReminderSource {
    backend: Arc<dyn NudgeBackend>,
    config: ReminderSourceConfig,
    events: mpsc::Sender<SourceMessage>,
    mode: Arc<watch::Sender<SourceMode>>,
    generation: Arc<AtomicU64>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ReminderSource {
    /// Create a source that publishes into `events`.
    pub fn new(
        backend: Arc<dyn NudgeBackend>,
        config: ReminderSourceConfig,
        events: mpsc::Sender<SourceMessage>,
    ) -> Self {
        let (mode, _) = watch::channel(SourceMode::Idle);
        Self {
            backend,
            config,
            events,
            mode: Arc::new(mode),
            generation: Arc::new(AtomicU64::new(0)),
            worker: Mutex::new(None),
        }
    }

    /// Create a source together with the receiving end of its event channel.
    pub fn channel(
        backend: Arc<dyn NudgeBackend>,
        config: ReminderSourceConfig,
        buffer: usize,
    ) -> (Self, mpsc::Receiver<SourceMessage>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(backend, config, tx), rx)
    }

    /// Begin delivery. A no-op while already started.
    pub fn start(&self, credential: Credential) {
        let mut worker = self.lock_worker();
        if worker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("reminder source already started");
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let run = Worker {
            backend: Arc::clone(&self.backend),
            events: self.events.clone(),
            mode: Arc::clone(&self.mode),
            generation: Arc::clone(&self.generation),
            own_generation: generation,
            poll_interval: self.config.poll_interval,
        };

        info!(generation, "starting reminder source");
        *worker = Some(tokio::spawn(run.run(credential)));
    }

    /// End delivery, closing the stream or cancelling the poll timer.
    ///
    /// Safe to call when not started. Results of requests still in flight
    /// are discarded.
    pub fn stop(&self) {
        let handle = self.lock_worker().take();

        // Bumping the generation under the mode lock orders it against any
        // mode change the worker is about to publish.
        self.mode.send_modify(|mode| {
            self.generation.fetch_add(1, Ordering::AcqRel);
            *mode = SourceMode::Idle;
        });

        if let Some(handle) = handle {
            handle.abort();
            info!("reminder source stopped");
        }
    }

    /// Whether the worker is running.
    pub fn is_started(&self) -> bool {
        self.lock_worker()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn mode(&self) -> SourceMode {
        *self.mode.borrow()
    }

    pub fn subscribe_mode(&self) -> watch::Receiver<SourceMode> {
        self.mode.subscribe()
    }

    /// True if `generation` belongs to the run currently started.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ReminderSource {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_worker().take() {
            handle.abort();
        }
    }
}

/// State owned by one started run.
struct Worker {
    backend: Arc<dyn NudgeBackend>,
    events: mpsc::Sender<SourceMessage>,
    mode: Arc<watch::Sender<SourceMode>>,
    generation: Arc<AtomicU64>,
    own_generation: u64,
    poll_interval: Duration,
}

impl Worker {
    async fn run(self, credential: Credential) {
        if !self.set_mode(SourceMode::Push) {
            return;
        }

        if !self.run_push(&credential).await {
            return;
        }

        info!("push delivery unavailable, switching to polling");
        if !self.emit(SourceEvent::ConnectionLost).await || !self.set_mode(SourceMode::Pull) {
            return;
        }

        self.run_pull(&credential).await;
    }

    /// Consume the push stream until it fails or closes.
    ///
    /// Returns false if the run was stopped or the consumer went away.
    async fn run_push(&self, credential: &Credential) -> bool {
        let mut stream = match self.backend.open_stream(credential).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("failed to open push stream: {}", e);
                return self.is_current();
            }
        };

        loop {
            match stream.next().await {
                Some(Ok(PushMessage::Connected)) => {
                    info!("push stream connected");
                    if !self.emit(SourceEvent::ConnectionRestored).await {
                        return false;
                    }
                }
                Some(Ok(PushMessage::Nudge { nudge })) => {
                    debug!(nudge_id = %nudge.id, task_id = %nudge.task, "nudge pushed");
                    if !self.emit(SourceEvent::ReminderReady(nudge)).await {
                        return false;
                    }
                }
                Some(Ok(PushMessage::Heartbeat)) => trace!("push heartbeat"),
                Some(Ok(PushMessage::Error { message })) => {
                    warn!("push stream reported error: {}", message);
                    break;
                }
                Some(Err(e)) => {
                    warn!("push stream failed: {}", e);
                    break;
                }
                None => {
                    warn!("push stream closed by server");
                    break;
                }
            }
        }

        // Close the connection before polling starts
        drop(stream);
        self.is_current()
    }

    /// Poll immediately, then on every tick. Failed polls are skipped.
    async fn run_pull(&self, credential: &Credential) {
        let mut ticker = interval(self.poll_interval.max(MIN_POLL_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if !self.is_current() {
                return;
            }

            match self.backend.ready_nudges(credential).await {
                Ok(nudges) => {
                    debug!(count = nudges.len(), "polled ready nudges");
                    for nudge in nudges {
                        if !self.emit(SourceEvent::ReminderReady(nudge)).await {
                            return;
                        }
                    }
                }
                Err(e) => warn!("ready-nudge poll failed, retrying next tick: {}", e),
            }
        }
    }

    fn is_current(&self) -> bool {
        self.generation.load(Ordering::Acquire) == self.own_generation
    }

    /// Publish a mode change unless this run was stopped meanwhile.
    fn set_mode(&self, next: SourceMode) -> bool {
        self.mode.send_if_modified(|mode| {
            if self.is_current() && *mode != next {
                *mode = next;
                true
            } else {
                false
            }
        });
        self.is_current()
    }

    async fn emit(&self, event: SourceEvent) -> bool {
        if !self.is_current() {
            return false;
        }
        let message = SourceMessage {
            generation: self.own_generation,
            event,
        };
        self.events.send(message).await.is_ok() && self.is_current()
    }
}
