//! nudgebet CLI entry point.

use anyhow::Result;
use clap::Parser;

use nudgebet::cli::{commands, handle_error, Cli, CliContext, Commands};
use nudgebet::infrastructure::config::ConfigLoader;
use nudgebet::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli).await {
        handle_error(err, json);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match cli.config.as_ref() {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    let _logger = LoggerImpl::init(&config.logging)?;

    let ctx = CliContext::new(config, cli.token);
    match cli.command {
        Commands::Watch(args) => commands::watch::execute(args, &ctx, cli.json).await,
        Commands::Task(command) => commands::task::execute(command, &ctx, cli.json).await,
        Commands::Bets(command) => commands::bets::execute(command, &ctx, cli.json).await,
        Commands::Nudges(command) => commands::nudges::execute(command, &ctx, cli.json).await,
    }
}
