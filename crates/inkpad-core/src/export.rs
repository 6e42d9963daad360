//! Note export shared by every inkpad interface.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::models::{Group, Note, NoteType, TodoItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

/// Serializable note representation used in JSON and Markdown exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportNote {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub note_type: NoteType,
    pub group: Option<String>,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub todos: Vec<TodoItem>,
}

/// Convert a note into an export record, resolving its group name.
#[must_use]
pub fn note_to_export_item(note: &Note, groups: &[Group]) -> ExportNote {
    let group = note.group_id.and_then(|id| {
        groups
            .iter()
            .find(|group| group.id == id)
            .map(|group| group.name.clone())
    });

    ExportNote {
        id: note.id.to_string(),
        title: note.display_title().to_string(),
        note_type: note.note_type,
        group,
        content: note.content.clone(),
        created_at: note.created_at,
        updated_at: note.updated_at,
        todos: note.todos.clone(),
    }
}

pub fn render_json_export(notes: &[Note], groups: &[Group]) -> serde_json::Result<String> {
    let items = notes
        .iter()
        .map(|note| note_to_export_item(note, groups))
        .collect::<Vec<ExportNote>>();
    serde_json::to_string_pretty(&items)
}

/// Render notes as Markdown documents with frontmatter and a task list.
#[must_use]
pub fn render_markdown_export(notes: &[Note], groups: &[Group]) -> String {
    let mut output = String::new();

    for (index, note) in notes.iter().enumerate() {
        if index > 0 {
            output.push('\n');
        }

        let export_note = note_to_export_item(note, groups);
        let _ = writeln!(output, "---");
        let _ = writeln!(output, "id: {}", export_note.id);
        let _ = writeln!(output, "title: {}", export_note.title);
        let _ = writeln!(output, "type: {}", export_note.note_type);
        if let Some(group) = &export_note.group {
            let _ = writeln!(output, "group: {group}");
        }
        let _ = writeln!(output, "created_at: {}", export_note.created_at);
        let _ = writeln!(output, "updated_at: {}", export_note.updated_at);
        let _ = writeln!(output, "---");
        let _ = writeln!(output);
        if !export_note.content.is_empty() {
            output.push_str(&export_note.content);
            output.push('\n');
        }
        if !export_note.todos.is_empty() {
            if !export_note.content.is_empty() {
                output.push('\n');
            }
            for todo in &export_note.todos {
                let mark = if todo.done { 'x' } else { ' ' };
                let _ = write!(output, "- [{mark}] {}", todo.text);
                if let Some(due) = todo.due_date {
                    let _ = write!(output, " (due {due})");
                }
                let _ = writeln!(output, " [{}]", todo.priority);
            }
        }
    }

    output
}

pub fn render_notes_export(
    notes: &[Note],
    groups: &[Group],
    format: ExportFormat,
) -> serde_json::Result<String> {
    match format {
        ExportFormat::Json => render_json_export(notes, groups),
        ExportFormat::Markdown => Ok(render_markdown_export(notes, groups)),
    }
}

/// Build a deterministic default file name for export flows.
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, timestamp_ms: i64) -> String {
    format!("inkpad-export-{timestamp_ms}.{}", format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use chrono::NaiveDate;

    #[test]
    fn export_item_resolves_group_name() {
        let group = Group::new("Work", "#ff0000");
        let mut note = Note::new(NoteType::Markdown, Some(group.id));
        note.title = "  ".to_string();

        let export = note_to_export_item(&note, &[group]);
        assert_eq!(export.group.as_deref(), Some("Work"));
        assert_eq!(export.title, "Untitled");
    }

    #[test]
    fn markdown_export_lists_todos() {
        let mut note = Note::new(NoteType::Todo, None);
        note.title = "Errands".to_string();
        let mut milk = TodoItem::new("Buy milk");
        milk.done = true;
        let mut taxes = TodoItem::new("File taxes");
        taxes.priority = Priority::High;
        taxes.due_date = NaiveDate::from_ymd_opt(2024, 4, 15);
        note.todos = vec![milk, taxes];

        let rendered = render_markdown_export(&[note], &[]);
        assert!(rendered.contains("title: Errands"));
        assert!(rendered.contains("type: todo"));
        assert!(!rendered.contains("group:"));
        assert!(rendered.contains("- [x] Buy milk [medium]"));
        assert!(rendered.contains("- [ ] File taxes (due 2024-04-15) [high]"));
    }

    #[test]
    fn json_export_uses_type_key() {
        let note = Note::new(NoteType::RichText, None);
        let rendered = render_json_export(&[note], &[]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value[0]["type"], "richtext");
        assert_eq!(value[0]["group"], serde_json::Value::Null);
    }

    #[test]
    fn suggested_export_file_name_uses_format_extension() {
        assert_eq!(
            suggested_export_file_name(ExportFormat::Json, 123),
            "inkpad-export-123.json"
        );
        assert_eq!(
            suggested_export_file_name(ExportFormat::Markdown, 456),
            "inkpad-export-456.md"
        );
    }
}
