//! Session wiring for the nudge and wager core.
//!
//! A `NudgeSession` owns the reminder source, the nudge queue and the wager
//! coordinator, plus one pump task that routes collaborator signals:
//! - source events feed the queue
//! - `DataLoaded` from the task directory retries pending nudges
//! - credential invalidation tears down all three resources
//! - credential renewal restarts delivery (re-entering push mode) and
//!   bootstraps the bettor profile

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::nudge_queue::NudgeQueue;
use super::reminder_source::{ReminderSource, ReminderSourceConfig, SourceEvent, SourceMessage};
use super::wager_coordinator::WagerCoordinator;
use crate::domain::models::{Config, CredentialEvent};
use crate::domain::ports::{BetBackend, CredentialSource, DirectoryEvent, NudgeBackend, TaskDirectory};

/// Running nudge/wager session.
pub struct NudgeSession {
    source: Arc<ReminderSource>,
    queue: Arc<NudgeQueue>,
    coordinator: Arc<WagerCoordinator>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl NudgeSession {
    /// Build the core and start the pump. Delivery, the expiry sweep and
    /// the bettor bootstrap start right away when a credential is present.
    pub fn start(
        config: &Config,
        nudge_backend: Arc<dyn NudgeBackend>,
        bet_backend: Arc<dyn BetBackend>,
        credentials: Arc<dyn CredentialSource>,
        directory: Arc<dyn TaskDirectory>,
    ) -> Self {
        let (source, source_rx) = ReminderSource::channel(
            nudge_backend,
            ReminderSourceConfig::from(&config.nudges),
            config.nudges.event_buffer,
        );
        let source = Arc::new(source);
        let queue = Arc::new(NudgeQueue::new(
            Arc::clone(&directory),
            config.nudges.dismiss_delay(),
        ));
        let coordinator = Arc::new(WagerCoordinator::new(
            bet_backend,
            Arc::clone(&credentials),
            Arc::clone(&directory),
            &config.wagers,
        ));

        // Subscribe before anything can be announced
        let directory_rx = directory.subscribe();
        let credential_rx = credentials.subscribe();

        if let Some(credential) = credentials.current_credential() {
            info!("session starting with existing credential");
            source.start(credential);
            coordinator.start_expiry_sweep();
            coordinator.initialize_in_background();
        } else {
            info!("session starting without credential, waiting for login");
        }

        let pump = Pump {
            source: Arc::clone(&source),
            queue: Arc::clone(&queue),
            coordinator: Arc::clone(&coordinator),
        };
        let handle = tokio::spawn(pump.run(source_rx, directory_rx, credential_rx));

        Self {
            source,
            queue,
            coordinator,
            pump: Mutex::new(Some(handle)),
        }
    }

    pub fn source(&self) -> &ReminderSource {
        &self.source
    }

    pub fn queue(&self) -> &NudgeQueue {
        &self.queue
    }

    pub fn coordinator(&self) -> &WagerCoordinator {
        &self.coordinator
    }

    /// Dismiss the active nudge.
    pub fn dismiss(&self, nudge_id: &str) -> bool {
        self.queue.dismiss(nudge_id)
    }

    /// Stop the pump and release every timer and connection.
    pub fn shutdown(&self) {
        if let Some(handle) = self.lock_pump().take() {
            handle.abort();
        }
        teardown(&self.source, &self.queue, &self.coordinator);
        info!("session shut down");
    }

    fn lock_pump(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pump.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for NudgeSession {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_pump().take() {
            handle.abort();
        }
    }
}

fn teardown(source: &ReminderSource, queue: &NudgeQueue, coordinator: &WagerCoordinator) {
    source.stop();
    queue.clear();
    coordinator.stop_expiry_sweep();
    coordinator.clear();
}

struct Pump {
    source: Arc<ReminderSource>,
    queue: Arc<NudgeQueue>,
    coordinator: Arc<WagerCoordinator>,
}

impl Pump {
    async fn run(
        self,
        mut source_rx: mpsc::Receiver<SourceMessage>,
        mut directory_rx: broadcast::Receiver<DirectoryEvent>,
        mut credential_rx: broadcast::Receiver<CredentialEvent>,
    ) {
        let mut directory_open = true;
        let mut credentials_open = true;

        loop {
            tokio::select! {
                message = source_rx.recv() => {
                    let Some(message) = message else {
                        debug!("reminder source channel closed");
                        break;
                    };
                    self.on_source_message(message);
                }
                event = directory_rx.recv(), if directory_open => match event {
                    Ok(DirectoryEvent::DataLoaded) => {
                        self.queue.retry_pending();
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "directory events lagged, retrying pending nudges");
                        self.queue.retry_pending();
                    }
                    Err(broadcast::error::RecvError::Closed) => directory_open = false,
                },
                event = credential_rx.recv(), if credentials_open => match event {
                    Ok(event) => self.on_credential_event(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "credential events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => credentials_open = false,
                },
            }
        }
    }

    fn on_source_message(&self, message: SourceMessage) {
        if !self.source.is_current(message.generation) {
            debug!(generation = message.generation, "dropping event from stopped source");
            return;
        }
        match message.event {
            SourceEvent::ReminderReady(nudge) => {
                let admission = self.queue.on_reminder_ready(nudge);
                debug!(?admission, "reminder routed");
            }
            SourceEvent::ConnectionLost => info!("push connection lost, polling"),
            SourceEvent::ConnectionRestored => info!("push connection established"),
        }
    }

    fn on_credential_event(&self, event: CredentialEvent) {
        match event {
            CredentialEvent::Renewed(credential) => {
                info!("credential renewed, restarting delivery");
                self.source.stop();
                self.source.start(credential);
                self.coordinator.start_expiry_sweep();
                self.coordinator.initialize_in_background();
            }
            CredentialEvent::Invalidated => {
                info!("credential invalidated, ending session");
                teardown(&self.source, &self.queue, &self.coordinator);
            }
        }
    }
}
