use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::json;

use super::CliContext;
use crate::cli::output::print_json;
use crate::cli::types::TaskCommands;
use crate::domain::models::{ResolveOutcome, TaskLifecycleEvent};

/// Handle task lifecycle commands
pub async fn execute(command: TaskCommands, ctx: &CliContext, json: bool) -> Result<()> {
    let now = Utc::now();
    let event = match command {
        TaskCommands::Start { task_id } => TaskLifecycleEvent::Started { task_id, at: now },
        TaskCommands::Complete { task_id } => TaskLifecycleEvent::Completed { task_id, at: now },
        TaskCommands::Delete { task_id } => TaskLifecycleEvent::Deleted { task_id },
    };

    let coordinator = ctx.coordinator().await?;
    let outcome = coordinator
        .on_lifecycle_event(&event)
        .await
        .with_context(|| format!("Failed to resolve bet for task {}", event.task_id()))?;

    if json {
        return print_json(&json!({
            "task_id": event.task_id(),
            "outcome": outcome,
        }));
    }

    match outcome {
        Some(ResolveOutcome::Resolved { reward: Some(reward) }) => {
            println!("Bet resolved for task {}: reward {}", event.task_id(), reward);
        }
        Some(ResolveOutcome::Resolved { reward: None }) => {
            println!("Bet resolved for task {}", event.task_id());
        }
        Some(ResolveOutcome::AlreadyResolved) => {
            println!("Bet for task {} was already resolved", event.task_id());
        }
        Some(ResolveOutcome::NoBet) => println!("Task {} has no bet", event.task_id()),
        None => println!("Bets refreshed after deleting task {}", event.task_id()),
    }
    Ok(())
}
