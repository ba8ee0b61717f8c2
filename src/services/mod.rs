//! Service layer: the nudge delivery and bet resolution core.

pub mod nudge_queue;
pub mod reminder_source;
pub mod session;
pub mod wager_coordinator;

pub use nudge_queue::{Admission, NudgeQueue, QueueState};
pub use reminder_source::{
    ReminderSource, ReminderSourceConfig, SourceEvent, SourceMessage, SourceMode,
};
pub use session::NudgeSession;
pub use wager_coordinator::{BettorBootstrap, SweepReport, WagerAggregate, WagerCoordinator};
