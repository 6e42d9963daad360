use std::path::Path;

use chrono::Utc;
use inkpad_core::content::{plain_text, splice_image};
use inkpad_core::gateway::{RemoteGateway, UploadFile};
use inkpad_core::models::{NotePatch, NoteType, TodoItem, View};
use inkpad_core::views::{sidebar_sections, DropTarget};
use inkpad_core::{Action, ActionOutcome, NoteStore};
use serde::Serialize;

use crate::commands::common::{
    capture_editor_input_with_initial, format_note_line, format_timestamp, group_name,
    note_to_list_item, resolve_drop_target, resolve_group_id, resolve_note, NoteListItem,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct SectionItem {
    title: String,
    group_id: Option<String>,
    notes: Vec<NoteListItem>,
}

pub async fn run_list<G: RemoteGateway>(
    store: &NoteStore<G>,
    group: Option<&str>,
    limit: usize,
    as_json: bool,
) -> Result<(), CliError> {
    let state = store.snapshot().await;
    let filter = group
        .map(|query| resolve_drop_target(&state.groups, query))
        .transpose()?;

    let sections = sidebar_sections(&state.groups, &state.notes)
        .into_iter()
        .filter(|section| !filter.is_some_and(|target| section.drop_target() != target))
        .collect::<Vec<_>>();

    if as_json {
        let items = sections
            .iter()
            .map(|section| SectionItem {
                title: section.title().to_string(),
                group_id: section.group.as_ref().map(|group| group.id.to_string()),
                notes: section
                    .notes
                    .iter()
                    .take(limit)
                    .map(|note| note_to_list_item(note, &state.groups))
                    .collect(),
            })
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    let now_ms = Utc::now().timestamp_millis();
    for section in &sections {
        if section.group.is_none() && section.notes.is_empty() && filter.is_none() {
            continue;
        }
        println!("{} ({})", section.title(), section.notes.len());
        for note in section.notes.iter().take(limit) {
            println!("  {}", format_note_line(note, now_ms));
        }
    }
    Ok(())
}

pub async fn run_show<G: RemoteGateway>(
    store: &NoteStore<G>,
    id: &str,
    plain: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let note = resolve_note(store, id).await?;
    store.open_note(note.id).await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&note)?);
        return Ok(());
    }

    let groups = store.groups().await;
    println!("{}", note.display_title());
    println!("id:      {}", note.id);
    println!("type:    {}", note.note_type.label());
    println!(
        "group:   {}",
        group_name(&groups, note.group_id).unwrap_or_else(|| "Ungrouped".to_string())
    );
    println!("updated: {}", format_timestamp(note.updated_at));

    let content = if plain {
        plain_text(note.note_type, &note.content)
    } else {
        note.content.clone()
    };
    if !content.trim().is_empty() {
        println!();
        println!("{}", content.trim_end());
    }

    if note.has_todos() {
        println!();
        for (index, todo) in note.todos.iter().enumerate() {
            let mark = if todo.done { "x" } else { " " };
            let due = todo
                .due_date
                .map(|date| format!(" (due {date})"))
                .unwrap_or_default();
            println!(
                "{:>3}. [{mark}] {}{due} [{}]",
                index + 1,
                todo.text,
                todo.priority
            );
        }
    }
    Ok(())
}

/// Todo notes turn each content line into a task; other types keep the text
/// as their body.
pub fn initial_patch(
    note_type: NoteType,
    title: Option<String>,
    content: Option<String>,
) -> Option<NotePatch> {
    let mut patch = NotePatch {
        title: title.and_then(|title| inkpad_core::util::normalize_text_option(Some(title))),
        ..NotePatch::default()
    };
    if let Some(content) = content {
        if note_type == NoteType::Todo {
            let todos = content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(TodoItem::new)
                .collect::<Vec<_>>();
            if !todos.is_empty() {
                patch.todos = Some(todos);
            }
        } else {
            patch.content = Some(content);
        }
    }

    (patch != NotePatch::default()).then_some(patch)
}

pub async fn run_new<G: RemoteGateway>(
    store: &NoteStore<G>,
    note_type: NoteType,
    title: Option<String>,
    group: Option<&str>,
    content: Option<String>,
) -> Result<(), CliError> {
    let group_id = match group {
        Some(query) => Some(resolve_group_id(&store.groups().await, query)?),
        None => None,
    };

    let ActionOutcome::Note(note) = store
        .dispatch(Action::AddNote {
            note_type,
            group_id,
        })
        .await?
    else {
        return Err(CliError::InvalidInput("note was not created".to_string()));
    };
    if let Some(patch) = initial_patch(note_type, title, content) {
        store
            .dispatch(Action::UpdateNote { id: note.id, patch })
            .await?;
    }
    store.dispatch(Action::SetView(View::Notes)).await?;
    println!("{}", note.id);
    Ok(())
}

pub async fn run_edit<G: RemoteGateway>(store: &NoteStore<G>, id: &str) -> Result<(), CliError> {
    let note = resolve_note(store, id).await?;
    if note.note_type == NoteType::Todo {
        return Err(CliError::InvalidInput(
            "todo notes have no body; use `inkpad tasks` instead".to_string(),
        ));
    }

    let extension = match note.note_type {
        NoteType::RichText => "html",
        NoteType::Markdown | NoteType::Todo => "md",
    };
    let Some(edited_content) = capture_editor_input_with_initial(&note.content, extension)? else {
        return Err(CliError::EmptyEditedContent);
    };

    if edited_content != note.content.trim() {
        store
            .update_note(note.id, NotePatch::content(edited_content))
            .await;
    }
    println!("{}", note.id);
    Ok(())
}

pub async fn run_rename<G: RemoteGateway>(
    store: &NoteStore<G>,
    id: &str,
    title: &[String],
) -> Result<(), CliError> {
    let note = resolve_note(store, id).await?;
    let title = title.join(" ");
    let title = title.trim();
    if title.is_empty() {
        return Err(CliError::InvalidInput("title cannot be empty".to_string()));
    }

    store.update_note(note.id, NotePatch::title(title)).await;
    println!("{}", note.id);
    Ok(())
}

pub async fn run_delete<G: RemoteGateway>(store: &NoteStore<G>, id: &str) -> Result<(), CliError> {
    let note = resolve_note(store, id).await?;
    store.dispatch(Action::DeleteNote(note.id)).await?;
    println!("{}", note.id);
    Ok(())
}

pub async fn run_move<G: RemoteGateway>(
    store: &NoteStore<G>,
    id: &str,
    target: &str,
) -> Result<(), CliError> {
    let note = resolve_note(store, id).await?;
    let target = resolve_drop_target(&store.groups().await, target)?;
    store
        .dispatch(Action::MoveNoteToGroup {
            note_id: note.id,
            group_id: target.group_id(),
        })
        .await?;

    match target {
        DropTarget::Group(group_id) => println!("{} -> {group_id}", note.id),
        DropTarget::Ungrouped => println!("{} -> ungrouped", note.id),
    }
    Ok(())
}

/// Upload an image and append a reference to the note body.
pub async fn run_upload<G: RemoteGateway>(
    store: &NoteStore<G>,
    id: &str,
    path: &Path,
) -> Result<(), CliError> {
    let note = resolve_note(store, id).await?;
    let file = UploadFile::from_path(path)?;
    if !file.is_supported_image() {
        return Err(CliError::UnsupportedImage(file.file_name));
    }

    let url = store
        .upload_image(&file)
        .await
        .ok_or(CliError::UploadFailed)?;

    // Read again so edits made while uploading are kept.
    let current = store
        .note(note.id)
        .await
        .ok_or_else(|| CliError::NoteNotFound(id.to_string()))?;
    if let Some(content) = splice_image(
        current.note_type,
        &current.content,
        &file.file_name,
        &url,
    ) {
        store
            .update_note(current.id, NotePatch::content(content))
            .await;
    }
    println!("{url}");
    Ok(())
}
