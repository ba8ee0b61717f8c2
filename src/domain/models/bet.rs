//! Wager (bet) domain model.
//!
//! A bet is placed against a task's deadline and resolves exactly once.
//! Resolution is idempotent on the server: a second attempt answers
//! `already_resolved`, which the client treats as a successful no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::nudge::TaskId;

/// A wagered commitment tied to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(default)]
    pub user: Option<String>,

    pub task: TaskId,

    pub wager: i64,

    pub deadline: DateTime<Utc>,

    #[serde(default)]
    pub task_due_date: Option<DateTime<Utc>>,

    /// Absent while pending; `true`/`false` once resolved
    #[serde(default)]
    pub success: Option<bool>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Bet {
    pub const fn is_resolved(&self) -> bool {
        self.success.is_some()
    }

    /// Unresolved and past its deadline.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !self.is_resolved() && self.deadline < now
    }
}

/// Aggregate points/streak statistics for the current bettor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BettorProfile {
    pub points: i64,
    pub streak: i64,
    #[serde(default)]
    pub total_bets: u32,
    #[serde(default)]
    pub successful_bets: u32,
    #[serde(default)]
    pub failed_bets: u32,
    #[serde(default)]
    pub pending_bets: u32,
}

impl BettorProfile {
    /// Percentage of successful bets, rounded; 0 when no bets were placed.
    pub fn success_rate(&self) -> u32 {
        if self.total_bets == 0 {
            return 0;
        }
        (f64::from(self.successful_bets) * 100.0 / f64::from(self.total_bets)).round() as u32
    }
}

/// Request body for placing a bet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBetRequest {
    pub task: TaskId,
    pub wager: i64,
    pub deadline: DateTime<Utc>,
    pub task_due_date: Option<DateTime<Utc>>,
}

/// Server-side status string of a resolve call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Success,
    AlreadyResolved,
}

/// Raw resolve response. `resolveExpiredBet` may answer with an empty
/// object, which means the bet was resolved as a failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveBetResponse {
    #[serde(default)]
    pub status: Option<ResolutionStatus>,
    #[serde(default)]
    pub reward: Option<i64>,
}

/// Terminal outcome of a resolve attempt as seen by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResolveOutcome {
    /// This call resolved the bet
    Resolved { reward: Option<i64> },
    /// Another path resolved it first
    AlreadyResolved,
    /// The task has no paired bet
    NoBet,
}

impl ResolveOutcome {
    pub const fn is_terminal_noop(&self) -> bool {
        matches!(self, Self::AlreadyResolved | Self::NoBet)
    }
}

impl From<ResolveBetResponse> for ResolveOutcome {
    fn from(response: ResolveBetResponse) -> Self {
        match response.status {
            Some(ResolutionStatus::AlreadyResolved) => Self::AlreadyResolved,
            Some(ResolutionStatus::Success) | None => Self::Resolved {
                reward: response.reward,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn bet(success: Option<bool>, deadline: DateTime<Utc>) -> Bet {
        Bet {
            id: "b1".into(),
            user: None,
            task: "t1".into(),
            wager: 10,
            deadline,
            task_due_date: None,
            success,
            created_at: None,
        }
    }

    #[test]
    fn test_deserialize_bet() {
        let bet: Bet = serde_json::from_str(
            r#"{"_id":"b1","user":"u1","task":"t1","wager":25,
                "deadline":"2024-01-02T00:00:00Z","taskDueDate":null,
                "createdAt":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(bet.wager, 25);
        assert!(!bet.is_resolved());
        assert!(bet.task_due_date.is_none());
    }

    #[test]
    fn test_is_expired() {
        let now = Utc::now();
        assert!(bet(None, now - Duration::minutes(1)).is_expired(now));
        assert!(!bet(None, now + Duration::minutes(1)).is_expired(now));
        assert!(!bet(Some(false), now - Duration::minutes(1)).is_expired(now));
    }

    #[test]
    fn test_success_rate() {
        let mut profile = BettorProfile::default();
        assert_eq!(profile.success_rate(), 0);
        profile.total_bets = 3;
        profile.successful_bets = 2;
        assert_eq!(profile.success_rate(), 67);
    }

    #[test]
    fn test_resolve_outcome_from_response() {
        let resolved: ResolveBetResponse =
            serde_json::from_str(r#"{"status":"success","reward":20}"#).unwrap();
        assert_eq!(
            ResolveOutcome::from(resolved),
            ResolveOutcome::Resolved { reward: Some(20) }
        );

        let already: ResolveBetResponse =
            serde_json::from_str(r#"{"status":"already_resolved"}"#).unwrap();
        assert_eq!(ResolveOutcome::from(already), ResolveOutcome::AlreadyResolved);

        let empty: ResolveBetResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(
            ResolveOutcome::from(empty),
            ResolveOutcome::Resolved { reward: None }
        );
    }
}
