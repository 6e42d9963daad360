use inkpad_core::gateway::RemoteGateway;
use inkpad_core::models::GroupPatch;
use inkpad_core::{Action, ActionOutcome, NoteStore};
use serde::Serialize;

use crate::cli::GroupCommands;
use crate::commands::common::{resolve_group_id, short_id};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct GroupListItem {
    pub id: String,
    pub name: String,
    pub color: String,
    pub note_count: usize,
}

pub async fn run_group<G: RemoteGateway>(
    store: &NoteStore<G>,
    command: GroupCommands,
) -> Result<(), CliError> {
    match command {
        GroupCommands::List { json } => run_group_list(store, json).await,
        GroupCommands::Add { name, color } => {
            let name = name.trim();
            if name.is_empty() {
                return Err(CliError::InvalidInput(
                    "group name cannot be empty".to_string(),
                ));
            }
            let group = store.add_group(name, &color).await;
            println!("{}", group.id);
            Ok(())
        }
        GroupCommands::Rename { group, name, color } => {
            if name.is_none() && color.is_none() {
                return Err(CliError::InvalidInput(
                    "nothing to change; pass --name or --color".to_string(),
                ));
            }
            let id = resolve_group_id(&store.groups().await, &group)?;
            let updated = store
                .update_group(id, GroupPatch { name, color })
                .await
                .ok_or(CliError::GroupNotFound(group))?;
            println!("{}  {}  {}", updated.id, updated.name, updated.color);
            Ok(())
        }
        GroupCommands::Delete { group } => {
            let id = resolve_group_id(&store.groups().await, &group)?;
            if store.dispatch(Action::DeleteGroup(id)).await? == ActionOutcome::NotFound {
                return Err(CliError::GroupNotFound(group));
            }
            println!("{id}");
            Ok(())
        }
    }
}

async fn run_group_list<G: RemoteGateway>(
    store: &NoteStore<G>,
    as_json: bool,
) -> Result<(), CliError> {
    let state = store.snapshot().await;
    let items = state
        .groups
        .iter()
        .map(|group| GroupListItem {
            id: group.id.to_string(),
            name: group.name.clone(),
            color: group.color.clone(),
            note_count: state
                .notes
                .iter()
                .filter(|note| note.group_id == Some(group.id))
                .count(),
        })
        .collect::<Vec<_>>();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for item in &items {
            println!(
                "{:<13}  {:<7}  {}  ({})",
                short_id(&item.id),
                item.color,
                item.name,
                item.note_count
            );
        }
    }
    Ok(())
}
