use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use serde_json::json;

use super::CliContext;
use crate::cli::output::print_json;
use crate::cli::output::table::{format_bets_table, format_profile_table};
use crate::cli::types::BetCommands;
use crate::services::BettorBootstrap;

/// Handle bet commands
pub async fn execute(command: BetCommands, ctx: &CliContext, json: bool) -> Result<()> {
    match command {
        BetCommands::List => handle_list(ctx, json).await,
        BetCommands::Sweep => handle_sweep(ctx, json).await,
        BetCommands::Place {
            task_id,
            wager,
            minutes,
        } => handle_place(ctx, &task_id, wager, minutes, json).await,
        BetCommands::Cancel { task_id } => handle_cancel(ctx, &task_id, json).await,
        BetCommands::Show { task_id } => handle_show(ctx, &task_id, json).await,
        BetCommands::Recent { limit } => handle_recent(ctx, limit, json).await,
    }
}

async fn handle_list(ctx: &CliContext, json: bool) -> Result<()> {
    let coordinator = ctx.coordinator().await?;
    let bootstrap = coordinator
        .initialize()
        .await
        .context("Failed to load bettor profile")?;

    let aggregate = coordinator.aggregate();
    let Some(profile) = aggregate.profile else {
        bail!("Bettor profile could not be loaded");
    };
    let bets = aggregate.active_bets;

    if json {
        return print_json(&json!({
            "profile": profile,
            "active_bets": bets,
            "bootstrap": bootstrap,
        }));
    }

    if bootstrap == BettorBootstrap::Initialized {
        println!("Created a new betting profile.\n");
    }
    println!("{}", format_profile_table(&profile));
    if bets.is_empty() {
        println!("\nNo active bets.");
    } else {
        println!("\nActive bets:");
        println!("{}", format_bets_table(&bets));
        println!(
            "\n{} bet(s), {} points wagered",
            bets.len(),
            bets.iter().map(|b| b.wager).sum::<i64>()
        );
    }
    Ok(())
}

async fn handle_sweep(ctx: &CliContext, json: bool) -> Result<()> {
    let coordinator = ctx.coordinator().await?;
    let report = coordinator
        .sweep_expired()
        .await
        .context("Expired bet sweep failed")?;

    if json {
        return print_json(&report);
    }

    if report.examined == 0 {
        println!("No expired bets.");
    } else {
        println!("Expired bets examined: {}", report.examined);
        println!("  Resolved: {}", report.resolved);
        println!("  Already resolved: {}", report.already_resolved);
        if report.missing > 0 {
            println!("  Missing: {}", report.missing);
        }
        if report.failed > 0 {
            println!("  Failed: {}", report.failed);
        }
    }
    Ok(())
}

async fn handle_place(
    ctx: &CliContext,
    task_id: &str,
    wager: i64,
    minutes: i64,
    json: bool,
) -> Result<()> {
    let deadline = Utc::now() + Duration::minutes(minutes);
    let coordinator = ctx.coordinator().await?;
    let bet_id = coordinator
        .place_bet(task_id, wager, deadline)
        .await
        .context("Failed to place bet")?;

    if json {
        return print_json(&json!({
            "bet_id": bet_id,
            "task_id": task_id,
            "wager": wager,
            "deadline": deadline,
        }));
    }

    println!("Bet placed!");
    println!("  Bet ID: {}", bet_id);
    println!("  Task: {}", task_id);
    println!("  Wager: {}", wager);
    println!("  Deadline: {}", deadline.format("%Y-%m-%d %H:%M:%S UTC"));
    Ok(())
}

async fn handle_cancel(ctx: &CliContext, task_id: &str, json: bool) -> Result<()> {
    let coordinator = ctx.coordinator().await?;
    coordinator
        .cancel_bet(task_id)
        .await
        .context("Failed to cancel bet")?;

    if json {
        return print_json(&json!({ "task_id": task_id, "canceled": true }));
    }
    println!("Bet on task {} canceled", task_id);
    Ok(())
}

async fn handle_show(ctx: &CliContext, task_id: &str, json: bool) -> Result<()> {
    let coordinator = ctx.coordinator().await?;
    let bet = coordinator
        .bet(task_id)
        .await
        .context("Failed to load bet")?;

    if json {
        return print_json(&json!({ "task_id": task_id, "bet": bet }));
    }

    match bet {
        Some(bet) => println!("{}", format_bets_table(std::slice::from_ref(&bet))),
        None => println!("Task {} has no bet.", task_id),
    }
    Ok(())
}

async fn handle_recent(ctx: &CliContext, limit: u32, json: bool) -> Result<()> {
    let coordinator = ctx.coordinator().await?;
    let bets = coordinator
        .recent_activity(limit)
        .await
        .context("Failed to load recent activity")?;

    if json {
        return print_json(&bets);
    }

    if bets.is_empty() {
        println!("No betting activity yet.");
    } else {
        println!("{}", format_bets_table(&bets));
    }
    Ok(())
}
