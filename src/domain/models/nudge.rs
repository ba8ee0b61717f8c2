//! Nudge (reminder) domain model.
//!
//! The server owns scheduling and triggering. A nudge only becomes
//! presentable once the backend has stamped `triggered_at` and attached the
//! generated message; everything the client does with it afterwards is
//! local and volatile.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque nudge identifier assigned by the backend.
pub type NudgeId = String;

/// Opaque task identifier assigned by the backend.
pub type TaskId = String;

/// A scheduled, task-scoped reminder as reported by the NudgeEngine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nudge {
    #[serde(rename = "_id")]
    pub id: NudgeId,

    pub task: TaskId,

    /// Time at or after which the nudge becomes eligible
    pub delivery_time: DateTime<Utc>,

    /// Set once by the backend when the nudge has been surfaced
    #[serde(default)]
    pub triggered_at: Option<DateTime<Utc>>,

    /// Backend-generated message, present only once triggered
    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub canceled: bool,
}

impl Nudge {
    /// A nudge may be shown only when it has been triggered, carries a
    /// non-empty message and was not canceled.
    pub fn is_presentable(&self) -> bool {
        !self.canceled
            && self.triggered_at.is_some()
            && self.message.as_deref().is_some_and(|m| !m.is_empty())
    }

    /// Timestamp shown to the user: when it was triggered, falling back to
    /// the scheduled delivery time.
    pub fn display_time(&self) -> DateTime<Utc> {
        self.triggered_at.unwrap_or(self.delivery_time)
    }
}

/// Client-local projection of a triggered nudge, ready for presentation.
///
/// The task title is resolved once at enqueue time and never refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveNudge {
    pub nudge_id: NudgeId,
    pub task_id: TaskId,
    pub task_title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ActiveNudge {
    /// Project a nudge onto its display form. Returns `None` when the nudge
    /// is not presentable.
    pub fn from_nudge(nudge: &Nudge, task_title: impl Into<String>) -> Option<Self> {
        if !nudge.is_presentable() {
            return None;
        }
        Some(Self {
            nudge_id: nudge.id.clone(),
            task_id: nudge.task.clone(),
            task_title: task_title.into(),
            message: nudge.message.clone().unwrap_or_default(),
            timestamp: nudge.display_time(),
        })
    }
}

/// Typed message carried by the NudgeEngine push stream.
///
/// After `Connected` the server replays any backlog of nudges triggered
/// while the client was away; backlog and live nudges look identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    Connected,
    Nudge { nudge: Nudge },
    Heartbeat,
    Error {
        #[serde(default)]
        message: String,
    },
}

impl PushMessage {
    /// Wire names of the message types this client understands.
    pub const KNOWN_TYPES: [&'static str; 4] = ["connected", "nudge", "heartbeat", "error"];
}

/// Status filter accepted by the "list user nudges" endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NudgeStatus {
    Pending,
    Triggered,
}

impl NudgeStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Triggered => "triggered",
        }
    }
}

impl fmt::Display for NudgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NudgeStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "triggered" => Ok(Self::Triggered),
            _ => Err(anyhow::anyhow!("Invalid nudge status: {s}")),
        }
    }
}
