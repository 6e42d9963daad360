//! inkpad CLI - markdown, rich-text and todo notes from the terminal
//!
//! Every note command restores the profile's session, loads notes and groups,
//! applies the change and waits for it to reach the backend.

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::Workspace;
use crate::commands::{
    auth_cmd::run_auth, completions::run_completions, config::run_config, run_store_command,
    watch::run_watch,
};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "inkpad=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::Config { command } => run_config(command, profile),
        Commands::Auth { command } => run_auth(command, profile).await,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
        Commands::Watch { refetch } => run_watch(profile, refetch).await,
        command => {
            let workspace = Workspace::open_once(profile).await?;
            let result = run_store_command(&workspace.store, command).await;
            let finished = workspace.finish().await;
            result.and(finished)
        }
    }
}

#[cfg(test)]
mod tests;
