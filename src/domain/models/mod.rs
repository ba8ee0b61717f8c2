pub mod bet;
pub mod config;
pub mod credential;
pub mod nudge;
pub mod task;

pub use bet::{
    Bet, BettorProfile, PlaceBetRequest, ResolutionStatus, ResolveBetResponse, ResolveOutcome,
};
pub use config::{ApiConfig, Config, LoggingConfig, NudgeConfig, WagerConfig};
pub use credential::{Credential, CredentialEvent};
pub use nudge::{ActiveNudge, Nudge, NudgeId, NudgeStatus, PushMessage, TaskId};
pub use task::{Task, TaskLifecycleEvent, TaskStatus};
