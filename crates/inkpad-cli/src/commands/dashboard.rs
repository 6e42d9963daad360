use inkpad_core::gateway::RemoteGateway;
use inkpad_core::models::{TodoItem, View};
use inkpad_core::views::Dashboard;
use inkpad_core::NoteStore;
use serde::Serialize;

use crate::commands::common::short_id;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct DashboardItem<'a> {
    note_id: String,
    title: &'a str,
    pending: &'a [TodoItem],
    completed: &'a [TodoItem],
}

pub async fn run_dashboard<G: RemoteGateway>(
    store: &NoteStore<G>,
    as_json: bool,
) -> Result<(), CliError> {
    store.set_view(View::Dashboard).await;
    let dashboard = Dashboard::build(&store.notes().await);

    if as_json {
        let items = dashboard
            .entries
            .iter()
            .map(|entry| DashboardItem {
                note_id: entry.note_id.to_string(),
                title: &entry.title,
                pending: &entry.pending,
                completed: &entry.completed,
            })
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    for line in format_dashboard_lines(&dashboard) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_dashboard_lines(dashboard: &Dashboard) -> Vec<String> {
    let mut lines = vec![format!(
        "{} pending, {} completed",
        dashboard.pending_total(),
        dashboard.completed_total()
    )];

    for entry in &dashboard.entries {
        lines.push(String::new());
        lines.push(format!(
            "{}  {}",
            short_id(&entry.note_id.as_str()),
            entry.title
        ));
        for todo in &entry.pending {
            let due = todo
                .due_date
                .map(|date| format!(" (due {date})"))
                .unwrap_or_default();
            lines.push(format!("  [ ] {}{due} [{}]", todo.text, todo.priority));
        }
        for todo in &entry.completed {
            lines.push(format!("  [x] {}", todo.text));
        }
    }
    lines
}
