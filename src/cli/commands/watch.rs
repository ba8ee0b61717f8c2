use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};

use super::CliContext;
use crate::cli::types::WatchArgs;
use crate::domain::models::ActiveNudge;
use crate::infrastructure::{InMemoryTaskDirectory, SessionCredentials};
use crate::services::NudgeSession;

/// Run a session until Ctrl-C, printing every nudge as it becomes active
pub async fn execute(args: WatchArgs, ctx: &CliContext, json: bool) -> Result<()> {
    let credential = ctx.credential()?;
    let client = ctx.client()?;
    let credentials = Arc::new(SessionCredentials::with_credential(credential.clone()));
    let directory = Arc::new(InMemoryTaskDirectory::new());

    let session = NudgeSession::start(
        &ctx.config,
        client.clone(),
        client.clone(),
        credentials,
        directory.clone(),
    );

    // Nudges arriving before this completes wait in the pending buffer
    match client.fetch_tasks(&credential).await {
        Ok(tasks) => {
            info!(count = tasks.len(), "tasks loaded");
            directory.load(tasks);
        }
        Err(e) => warn!("could not load tasks, nudges stay pending: {}", e),
    }

    let display = Duration::from_secs(args.display_secs);
    let mut state = session.queue().subscribe();
    let mut shown: Option<ActiveNudge> = None;
    let mut dismiss_at: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let active = state.borrow_and_update().active.clone();
                if let Some(active) = active {
                    if shown.as_ref().map(|s| &s.nudge_id) != Some(&active.nudge_id) {
                        print_nudge(&active, json)?;
                        dismiss_at = Some(Instant::now() + display);
                        shown = Some(active);
                    }
                }
            }
            _ = sleep_until(dismiss_at.unwrap_or_else(Instant::now)), if dismiss_at.is_some() => {
                dismiss_at = None;
                if let Some(current) = shown.as_ref() {
                    session.dismiss(&current.nudge_id);
                }
            }
        }
    }

    session.shutdown();
    Ok(())
}

fn print_nudge(nudge: &ActiveNudge, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(nudge)?);
    } else {
        println!(
            "[{}] {}: {}",
            nudge.timestamp.format("%H:%M"),
            nudge.task_title,
            nudge.message
        );
    }
    Ok(())
}
