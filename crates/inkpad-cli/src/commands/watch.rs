use std::collections::HashMap;

use chrono::Utc;
use inkpad_core::{ReconcileMode, StoreOptions, StoreState};

use crate::commands::common::{format_relative_time, short_id, Workspace};
use crate::error::CliError;

/// Stream store changes to stdout until Ctrl-C or session expiry.
pub async fn run_watch(global_profile: Option<&str>, refetch: bool) -> Result<(), CliError> {
    let options = StoreOptions {
        reconcile: if refetch {
            ReconcileMode::Refetch
        } else {
            ReconcileMode::Incremental
        },
        live: true,
    };
    let workspace = Workspace::open(global_profile, options).await?;
    let mut changes = workspace.store.subscribe_changes();
    let mut previous = workspace.store.snapshot().await;

    let feeds = workspace
        .sync
        .as_ref()
        .map_or(0, inkpad_core::SyncHandle::subscription_count);
    println!(
        "Watching {} notes and {} groups on {feeds} change feeds (Ctrl-C to stop)",
        previous.notes.len(),
        previous.groups.len()
    );

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = workspace.store.snapshot().await;
                for line in describe_changes(&previous, &current) {
                    println!("{line}");
                }
                if !current.session.is_signed_in() {
                    break;
                }
                previous = current;
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    workspace.finish().await
}

/// Human-readable lines for what differs between two snapshots.
pub fn describe_changes(before: &StoreState, after: &StoreState) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    let mut lines = Vec::new();

    let old_notes = before
        .notes
        .iter()
        .map(|note| (note.id, note))
        .collect::<HashMap<_, _>>();
    for note in &after.notes {
        let id = short_id(&note.id.as_str());
        match old_notes.get(&note.id) {
            None => lines.push(format!("+ note {id}  {}", note.display_title())),
            Some(old) if *old != note => lines.push(format!(
                "~ note {id}  {}  ({})",
                note.display_title(),
                format_relative_time(note.updated_at, now_ms)
            )),
            Some(_) => {}
        }
    }
    for note in &before.notes {
        if after.note(note.id).is_none() {
            lines.push(format!(
                "- note {}  {}",
                short_id(&note.id.as_str()),
                note.display_title()
            ));
        }
    }

    for group in &after.groups {
        match before.group(group.id) {
            None => lines.push(format!("+ group {}", group.name)),
            Some(old) if old != group => lines.push(format!("~ group {}", group.name)),
            Some(_) => {}
        }
    }
    for group in &before.groups {
        if after.group(group.id).is_none() {
            lines.push(format!("- group {}", group.name));
        }
    }

    if before.session.is_signed_in() && !after.session.is_signed_in() {
        lines.push("! session expired".to_string());
    }
    lines
}
