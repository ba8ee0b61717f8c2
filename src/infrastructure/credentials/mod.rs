//! Credentials management infrastructure
//!
//! Holds the bearer token for the current session and announces
//! renewal/invalidation to subscribers (the reminder pipeline restarts on
//! either).

use std::sync::RwLock;

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::domain::models::{Credential, CredentialEvent};
use crate::domain::ports::CredentialSource;

const EVENT_CAPACITY: usize = 16;

/// In-process session credential store
pub struct SessionCredentials {
    current: RwLock<Option<Credential>>,
    events: broadcast::Sender<CredentialEvent>,
}

impl SessionCredentials {
    /// Create an empty (logged-out) session
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            current: RwLock::new(None),
            events,
        }
    }

    /// Create a session that already holds a credential
    pub fn with_credential(credential: Credential) -> Self {
        let session = Self::new();
        *session.write_guard() = Some(credential);
        session
    }

    /// Install a new credential (login or token refresh)
    pub fn renew(&self, credential: Credential) {
        *self.write_guard() = Some(credential.clone());
        info!("session credential renewed");
        // No receivers is fine: nothing is running yet
        let _ = self.events.send(CredentialEvent::Renewed(credential));
    }

    /// Drop the credential (logout or rejected token)
    pub fn invalidate(&self) {
        let had_credential = self.write_guard().take().is_some();
        if !had_credential {
            debug!("invalidate called without an active credential");
        }
        info!("session credential invalidated");
        let _ = self.events.send(CredentialEvent::Invalidated);
    }

    fn write_guard(&self) -> std::sync::RwLockWriteGuard<'_, Option<Credential>> {
        self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SessionCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialSource for SessionCredentials {
    fn current_credential(&self) -> Option<Credential> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<CredentialEvent> {
        self.events.subscribe()
    }
}
