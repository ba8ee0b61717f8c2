use anyhow::{Context, Result};

use super::CliContext;
use crate::cli::output::print_json;
use crate::cli::output::table::format_nudges_table;
use crate::cli::types::NudgeCommands;
use crate::domain::models::NudgeStatus;
use crate::domain::ports::NudgeBackend;

/// Handle nudge history commands
pub async fn execute(command: NudgeCommands, ctx: &CliContext, json: bool) -> Result<()> {
    match command {
        NudgeCommands::List { status, limit } => handle_list(ctx, status, limit, json).await,
    }
}

async fn handle_list(
    ctx: &CliContext,
    status: Option<NudgeStatus>,
    limit: Option<u32>,
    json: bool,
) -> Result<()> {
    let credential = ctx.credential()?;
    let client = ctx.client()?;

    let nudges = client
        .user_nudges(&credential, status, limit)
        .await
        .context("Failed to list nudges")?;

    if json {
        return print_json(&nudges);
    }

    if nudges.is_empty() {
        match status {
            Some(status) => println!("No {} nudges.", status),
            None => println!("No nudges."),
        }
        return Ok(());
    }

    println!("{}", format_nudges_table(&nudges));
    println!("\n{} nudge(s)", nudges.len());
    Ok(())
}
