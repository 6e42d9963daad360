pub mod auth_cmd;
pub mod common;
pub mod completions;
pub mod config;
pub mod dashboard;
pub mod export;
pub mod groups;
pub mod notes;
pub mod tasks;
pub mod watch;

use inkpad_core::gateway::RemoteGateway;
use inkpad_core::NoteStore;

use crate::cli::Commands;
use crate::commands::common::resolve_content_input;
use crate::error::CliError;

/// Run a store-bound command. Other commands are rejected as invalid input.
pub async fn run_store_command<G: RemoteGateway>(
    store: &NoteStore<G>,
    command: Commands,
) -> Result<(), CliError> {
    match command {
        Commands::List { group, limit, json } => {
            notes::run_list(store, group.as_deref(), limit, json).await
        }
        Commands::Show { id, plain, json } => notes::run_show(store, &id, plain, json).await,
        Commands::New {
            kind,
            title,
            group,
            content,
        } => {
            let content = resolve_content_input(&content)?;
            notes::run_new(store, kind.into(), title, group.as_deref(), content).await
        }
        Commands::Edit { id } => notes::run_edit(store, &id).await,
        Commands::Rename { id, title } => notes::run_rename(store, &id, &title).await,
        Commands::Delete { id } => notes::run_delete(store, &id).await,
        Commands::Move { id, target } => notes::run_move(store, &id, &target).await,
        Commands::Upload { id, path } => notes::run_upload(store, &id, &path).await,
        Commands::Tasks { command } => tasks::run_tasks(store, command).await,
        Commands::Group { command } => groups::run_group(store, command).await,
        Commands::Dashboard { json } => dashboard::run_dashboard(store, json).await,
        Commands::Export { format, output } => {
            export::run_export(store, format, output.as_deref()).await
        }
        Commands::Config { .. }
        | Commands::Auth { .. }
        | Commands::Completions { .. }
        | Commands::Watch { .. } => Err(CliError::InvalidInput(
            "command does not operate on notes".to_string(),
        )),
    }
}
