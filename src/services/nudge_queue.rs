//! Nudge deduplicator and presentation queue.
//!
//! Holds three pieces of client-local state:
//! - `active`: the single nudge currently presented, if any
//! - `queue`: nudges waiting for presentation, in arrival order
//! - `pending`: triggered nudges whose task the directory cannot resolve yet
//!
//! Invariants kept by every operation:
//! - at most one nudge is active
//! - `queue` holds no duplicates and never the active id
//! - `pending` holds no id that is queued or active
//! - an id admitted once in a session is never admitted again, within the
//!   most recent [`ADMITTED_CAPACITY`] admissions
//!
//! State changes are published through a `watch` channel for rendering.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::domain::models::{ActiveNudge, Nudge, NudgeId};
use crate::domain::ports::TaskDirectory;

/// Observable queue state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueState {
    pub active: Option<ActiveNudge>,
    pub queue: VecDeque<ActiveNudge>,
    pub pending: Vec<Nudge>,
}

impl QueueState {
    fn contains_queued_or_active(&self, id: &str) -> bool {
        self.active.as_ref().is_some_and(|a| a.nudge_id == id)
            || self.queue.iter().any(|n| n.nudge_id == id)
    }

    fn is_pending(&self, id: &str) -> bool {
        self.pending.iter().any(|n| n.id == id)
    }
}

/// What happened to a nudge handed to [`NudgeQueue::on_reminder_ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Not triggered, no message, or canceled
    NotPresentable,
    /// Already queued, active, or admitted earlier in this session
    Duplicate,
    /// Task unknown; held in the pending buffer
    Buffered,
    /// Appended behind the active nudge
    Queued,
    /// Appended and immediately promoted to active
    Activated,
}

/// How many admitted ids are remembered for deduplication. The oldest are
/// forgotten first; a nudge that old is no longer reported ready.
pub const ADMITTED_CAPACITY: usize = 4096;

/// Ids that entered `queue`, bounded and evicted in admission order.
struct AdmittedIds {
    ids: HashSet<NudgeId>,
    order: VecDeque<NudgeId>,
    capacity: usize,
}

impl AdmittedIds {
    fn new(capacity: usize) -> Self {
        Self {
            ids: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    fn insert(&mut self, id: NudgeId) {
        if !self.ids.insert(id.clone()) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }

    fn clear(&mut self) {
        self.ids.clear();
        self.order.clear();
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

struct Inner {
    state: QueueState,
    admitted: AdmittedIds,
    /// Bumped by `clear()`; delayed promotions from an older epoch are void
    epoch: u64,
}

/// Single-active FIFO of nudges awaiting presentation.
pub struct NudgeQueue {
    directory: Arc<dyn TaskDirectory>,
    dismiss_delay: Duration,
    inner: Arc<Mutex<Inner>>,
    state_tx: Arc<watch::Sender<QueueState>>,
}

impl NudgeQueue {
    /// Create an empty queue resolving task titles through `directory`.
    pub fn new(directory: Arc<dyn TaskDirectory>, dismiss_delay: Duration) -> Self {
        Self::with_admitted_capacity(directory, dismiss_delay, ADMITTED_CAPACITY)
    }

    /// Like [`NudgeQueue::new`], remembering at most `capacity` admitted ids.
    pub fn with_admitted_capacity(
        directory: Arc<dyn TaskDirectory>,
        dismiss_delay: Duration,
        capacity: usize,
    ) -> Self {
        let (state_tx, _) = watch::channel(QueueState::default());
        Self {
            directory,
            dismiss_delay,
            inner: Arc::new(Mutex::new(Inner {
                state: QueueState::default(),
                admitted: AdmittedIds::new(capacity),
                epoch: 0,
            })),
            state_tx: Arc::new(state_tx),
        }
    }

    /// Accept a nudge reported ready by the source.
    pub fn on_reminder_ready(&self, nudge: Nudge) -> Admission {
        if !nudge.is_presentable() {
            debug!(nudge_id = %nudge.id, "ignoring nudge that is not presentable");
            return Admission::NotPresentable;
        }

        let mut inner = self.lock();
        let admission = self.admit(&mut inner, nudge);
        if admission != Admission::Duplicate {
            self.publish(&inner);
        }
        admission
    }

    /// Dismiss the active nudge. After the dismiss delay the next queued
    /// nudge is promoted. Returns false (and does nothing) when `nudge_id`
    /// is not the active one.
    pub fn dismiss(&self, nudge_id: &str) -> bool {
        let epoch = {
            let mut inner = self.lock();
            let is_active = inner
                .state
                .active
                .as_ref()
                .is_some_and(|a| a.nudge_id == nudge_id);
            if !is_active {
                debug!(nudge_id, "dismiss ignored, nudge is not active");
                return false;
            }

            inner.state.active = None;
            debug!(nudge_id, "nudge dismissed");

            if self.dismiss_delay.is_zero() {
                Self::promote_next(&mut inner);
                self.publish(&inner);
                return true;
            }

            self.publish(&inner);
            inner.epoch
        };

        let inner = Arc::clone(&self.inner);
        let state_tx = Arc::clone(&self.state_tx);
        let delay = self.dismiss_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut inner = inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if inner.epoch != epoch {
                return;
            }
            if Self::promote_next(&mut inner) {
                state_tx.send_replace(inner.state.clone());
            }
        });

        true
    }

    /// Re-resolve every buffered nudge; resolvable ones join the queue.
    ///
    /// Returns how many left the buffer. Calling it again without new
    /// directory data changes nothing.
    pub fn retry_pending(&self) -> usize {
        let mut inner = self.lock();
        if inner.state.pending.is_empty() {
            return 0;
        }

        let buffered = std::mem::take(&mut inner.state.pending);
        let before = buffered.len();
        for nudge in buffered {
            // Buffered nudges were presentable on arrival
            self.admit(&mut inner, nudge);
        }

        let resolved = before - inner.state.pending.len();
        if resolved > 0 {
            info!(resolved, still_pending = inner.state.pending.len(), "retried pending nudges");
            self.publish(&inner);
        }
        resolved
    }

    /// Empty `active`, `queue` and `pending` and forget admitted ids.
    /// Cancels any delayed promotion.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.state = QueueState::default();
        inner.admitted.clear();
        inner.epoch += 1;
        self.publish(&inner);
        debug!("nudge queue cleared");
    }

    pub fn active(&self) -> Option<ActiveNudge> {
        self.lock().state.active.clone()
    }

    pub fn snapshot(&self) -> QueueState {
        self.lock().state.clone()
    }

    /// Number of ids currently remembered for deduplication.
    pub fn admitted_count(&self) -> usize {
        self.lock().admitted.len()
    }

    /// Watch the queue state; the receiver always sees the latest value.
    pub fn subscribe(&self) -> watch::Receiver<QueueState> {
        self.state_tx.subscribe()
    }

    fn admit(&self, inner: &mut Inner, nudge: Nudge) -> Admission {
        if inner.state.contains_queued_or_active(&nudge.id) || inner.admitted.contains(&nudge.id) {
            debug!(nudge_id = %nudge.id, "duplicate nudge dropped");
            return Admission::Duplicate;
        }

        let Some(task) = self.directory.resolve(&nudge.task) else {
            if inner.state.is_pending(&nudge.id) {
                return Admission::Duplicate;
            }
            debug!(nudge_id = %nudge.id, task_id = %nudge.task, "task unknown, buffering nudge");
            inner.state.pending.push(nudge);
            return Admission::Buffered;
        };

        let Some(entry) = ActiveNudge::from_nudge(&nudge, task.title) else {
            return Admission::NotPresentable;
        };

        inner.state.pending.retain(|p| p.id != nudge.id);
        inner.admitted.insert(nudge.id.clone());
        inner.state.queue.push_back(entry);

        if Self::promote_next(inner) {
            Admission::Activated
        } else {
            debug!(nudge_id = %nudge.id, queued = inner.state.queue.len(), "nudge queued");
            Admission::Queued
        }
    }

    /// Move the queue head to `active` if nothing is active.
    fn promote_next(inner: &mut Inner) -> bool {
        if inner.state.active.is_some() {
            return false;
        }
        let Some(next) = inner.state.queue.pop_front() else {
            return false;
        };
        info!(nudge_id = %next.nudge_id, task = %next.task_title, "nudge active");
        inner.state.active = Some(next);
        true
    }

    fn publish(&self, inner: &Inner) {
        self.state_tx.send_replace(inner.state.clone());
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
