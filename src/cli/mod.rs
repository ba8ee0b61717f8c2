//! Command-line interface.

pub mod commands;
pub mod output;
pub mod types;

pub use commands::CliContext;
pub use types::{BetCommands, Cli, Commands, NudgeCommands, TaskCommands, WatchArgs};

/// Print an error in the selected output mode and exit with status 1
pub fn handle_error(err: anyhow::Error, json: bool) -> ! {
    if json {
        let body = serde_json::json!({
            "error": err.to_string(),
            "causes": err.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>(),
        });
        eprintln!("{body}");
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1)
}
