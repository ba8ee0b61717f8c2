//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::models::NudgeStatus;

#[derive(Parser)]
#[command(name = "nudgebet")]
#[command(about = "Nudge delivery and bet resolution client", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Access token for the backend
    #[arg(long, global = true, env = "NUDGEBET_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Load configuration from this file instead of .nudgebet/
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Receive nudges and print each one as it becomes active
    Watch(WatchArgs),

    /// Task lifecycle commands (resolve the paired bet)
    #[command(subcommand)]
    Task(TaskCommands),

    /// Bet commands
    #[command(subcommand)]
    Bets(BetCommands),

    /// Nudge history commands
    #[command(subcommand)]
    Nudges(NudgeCommands),
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Seconds each nudge stays active before it is dismissed
    #[arg(long, default_value = "10")]
    pub display_secs: u64,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TaskCommands {
    /// Mark a task started and resolve its bet
    Start {
        /// Task ID
        task_id: String,
    },

    /// Mark a task completed and resolve its bet
    Complete {
        /// Task ID
        task_id: String,
    },

    /// Report a task deletion and refresh bets
    Delete {
        /// Task ID
        task_id: String,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum BetCommands {
    /// Show the bettor profile and active bets
    List,

    /// Resolve every expired bet once
    Sweep,

    /// Place a bet on a task
    Place {
        /// Task ID
        task_id: String,

        /// Points to wager
        #[arg(short, long)]
        wager: i64,

        /// Minutes from now until the deadline
        #[arg(short, long, default_value = "60")]
        minutes: i64,
    },

    /// Cancel the bet on a task
    Cancel {
        /// Task ID
        task_id: String,
    },

    /// Show the bet on a task, resolved or not
    Show {
        /// Task ID
        task_id: String,
    },

    /// Show the most recent bets
    Recent {
        /// Maximum number of bets to show
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum NudgeCommands {
    /// List the user's nudges
    List {
        /// Filter by status (pending, triggered)
        #[arg(short, long)]
        status: Option<NudgeStatus>,

        /// Maximum number of nudges to return
        #[arg(short, long)]
        limit: Option<u32>,
    },
}
