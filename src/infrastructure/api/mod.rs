//! Backend HTTP integration
//!
//! - Action-style request/response calls for NudgeEngine, MicroBet and TaskManager
//! - Server-Sent Events parsing for the nudge push stream

pub mod client;
pub mod streaming;

pub use client::{ApiClient, ApiClientConfig};
pub use streaming::{parse_sse_event, SseEventStream};
