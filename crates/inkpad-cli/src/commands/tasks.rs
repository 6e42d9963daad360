use inkpad_core::gateway::RemoteGateway;
use inkpad_core::models::{NotePatch, Priority, TodoItem, TodoPatch};
use inkpad_core::NoteStore;

use crate::cli::TaskCommands;
use crate::commands::common::{parse_due_date, resolve_note, resolve_task, short_id};
use crate::error::CliError;

pub async fn run_tasks<G: RemoteGateway>(
    store: &NoteStore<G>,
    command: TaskCommands,
) -> Result<(), CliError> {
    match command {
        TaskCommands::Add {
            note,
            text,
            due,
            priority,
        } => {
            let todo = build_task(&text, due.as_deref(), priority.map(Priority::from))?;
            add_task(store, &note, todo).await
        }
        TaskCommands::Toggle { note, task } => toggle_task(store, &note, &task).await,
        TaskCommands::Set {
            note,
            task,
            text,
            due,
            priority,
            done,
        } => {
            let patch = TodoPatch {
                text,
                done,
                due_date: due.as_deref().map(parse_due_date).transpose()?,
                priority: priority.map(Priority::from),
            };
            set_task(store, &note, &task, &patch).await
        }
        TaskCommands::Remove { note, task } => remove_task(store, &note, &task).await,
    }
}

/// A task from CLI arguments; no text gives the "New task" placeholder.
pub fn build_task(
    text: &[String],
    due: Option<&str>,
    priority: Option<Priority>,
) -> Result<TodoItem, CliError> {
    let text = text.join(" ");
    let mut todo = if text.trim().is_empty() {
        TodoItem::new_task()
    } else {
        TodoItem::new(text.trim())
    };
    if let Some(due) = due {
        todo.due_date = parse_due_date(due)?;
    }
    if let Some(priority) = priority {
        todo.priority = priority;
    }
    Ok(todo)
}

async fn add_task<G: RemoteGateway>(
    store: &NoteStore<G>,
    note_query: &str,
    todo: TodoItem,
) -> Result<(), CliError> {
    let note = resolve_note(store, note_query).await?;
    let mut todos = note.todos;
    let id = todo.id;
    todos.push(todo);
    store.update_note(note.id, NotePatch::todos(todos)).await;
    println!("{id}");
    Ok(())
}

async fn toggle_task<G: RemoteGateway>(
    store: &NoteStore<G>,
    note_query: &str,
    task_query: &str,
) -> Result<(), CliError> {
    let note = resolve_note(store, note_query).await?;
    let todo = resolve_task(&note, task_query)?;
    let updated = store
        .update_todo(note.id, todo.id, &TodoPatch::done(!todo.done))
        .await
        .ok_or_else(|| CliError::TaskNotFound(task_query.to_string()))?;

    let state = if updated.done { "done" } else { "pending" };
    println!("{}  {state}  {}", short_id(&updated.id.as_str()), updated.text);
    Ok(())
}

async fn set_task<G: RemoteGateway>(
    store: &NoteStore<G>,
    note_query: &str,
    task_query: &str,
    patch: &TodoPatch,
) -> Result<(), CliError> {
    if patch.is_empty() {
        return Err(CliError::InvalidInput(
            "nothing to change; pass --text, --due, --priority or --done".to_string(),
        ));
    }
    let note = resolve_note(store, note_query).await?;
    let todo = resolve_task(&note, task_query)?;
    let updated = store
        .update_todo(note.id, todo.id, patch)
        .await
        .ok_or_else(|| CliError::TaskNotFound(task_query.to_string()))?;
    println!("{}", updated.id);
    Ok(())
}

async fn remove_task<G: RemoteGateway>(
    store: &NoteStore<G>,
    note_query: &str,
    task_query: &str,
) -> Result<(), CliError> {
    let note = resolve_note(store, note_query).await?;
    let todo = resolve_task(&note, task_query)?;
    let todos = note
        .todos
        .into_iter()
        .filter(|item| item.id != todo.id)
        .collect::<Vec<_>>();
    store.update_note(note.id, NotePatch::todos(todos)).await;
    println!("{}", todo.id);
    Ok(())
}
