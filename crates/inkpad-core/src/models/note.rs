//! Note model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::id::{GroupId, NoteId};
use super::todo::TodoItem;
use crate::util::{next_update_stamp, unix_millis_now};

/// Title given to freshly created notes
pub const DEFAULT_NOTE_TITLE: &str = "Untitled";

/// How a note's content is interpreted. Fixed at creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteType {
    #[default]
    Markdown,
    #[serde(rename = "richtext")]
    RichText,
    Todo,
}

impl NoteType {
    pub const ALL: [Self; 3] = [Self::Markdown, Self::RichText, Self::Todo];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::RichText => "richtext",
            Self::Todo => "todo",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Markdown => "Markdown",
            Self::RichText => "Rich Text",
            Self::Todo => "Todo List",
        }
    }
}

impl fmt::Display for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "richtext" | "rich-text" | "html" => Ok(Self::RichText),
            "todo" | "todos" => Ok(Self::Todo),
            other => Err(format!("unknown note type '{other}'")),
        }
    }
}

/// Top-level UI view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Dashboard,
    Notes,
}

/// A note in the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier
    pub id: NoteId,
    pub title: String,
    /// Raw content; markdown source or HTML depending on `note_type`
    pub content: String,
    pub note_type: NoteType,
    pub group_id: Option<GroupId>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
    pub todos: Vec<TodoItem>,
    /// Whether the inline task panel is expanded. Local only.
    #[serde(default)]
    pub show_tasks: bool,
}

impl Note {
    /// Create an empty, untitled note of the given type
    #[must_use]
    pub fn new(note_type: NoteType, group_id: Option<GroupId>) -> Self {
        let now = unix_millis_now();
        Self {
            id: NoteId::new(),
            title: DEFAULT_NOTE_TITLE.to_string(),
            content: String::new(),
            note_type,
            group_id,
            created_at: now,
            updated_at: now,
            todos: Vec::new(),
            show_tasks: false,
        }
    }

    /// Shallow-merge `patch` into this note and stamp a new update time.
    pub fn apply(&mut self, patch: &NotePatch) {
        if let Some(title) = &patch.title {
            self.title.clone_from(title);
        }
        if let Some(content) = &patch.content {
            self.content.clone_from(content);
        }
        if let Some(group_id) = patch.group_id {
            self.group_id = group_id;
        }
        if let Some(todos) = &patch.todos {
            self.todos.clone_from(todos);
        }
        if let Some(show_tasks) = patch.show_tasks {
            self.show_tasks = show_tasks;
        }
        self.touch();
    }

    /// Stamp a new, strictly later update time.
    pub fn touch(&mut self) {
        self.updated_at = next_update_stamp(self.updated_at);
    }

    /// Title for display; blank titles render as the default title.
    #[must_use]
    pub fn display_title(&self) -> &str {
        let title = self.title.trim();
        if title.is_empty() {
            DEFAULT_NOTE_TITLE
        } else {
            title
        }
    }

    /// Number of todos not yet done
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.todos.iter().filter(|todo| !todo.done).count()
    }

    #[must_use]
    pub fn has_todos(&self) -> bool {
        !self.todos.is_empty()
    }
}

/// Partial update for a [`Note`]. The note type is deliberately absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    /// `Some(None)` clears the group reference.
    pub group_id: Option<Option<GroupId>>,
    pub todos: Option<Vec<TodoItem>>,
    pub show_tasks: Option<bool>,
}

impl NotePatch {
    #[must_use]
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn todos(todos: Vec<TodoItem>) -> Self {
        Self {
            todos: Some(todos),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn show_tasks(show_tasks: bool) -> Self {
        Self {
            show_tasks: Some(show_tasks),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_note_defaults() {
        let note = Note::new(NoteType::Todo, None);
        assert_eq!(note.title, "Untitled");
        assert!(note.content.is_empty());
        assert!(note.todos.is_empty());
        assert!(!note.show_tasks);
        assert_eq!(note.note_type, NoteType::Todo);
        assert_eq!(note.created_at, note.updated_at);
    }

    #[test]
    fn apply_merges_and_stamps() {
        let mut note = Note::new(NoteType::Markdown, None);
        let before = note.updated_at;
        note.apply(&NotePatch::content("hello"));
        assert_eq!(note.content, "hello");
        assert_eq!(note.title, "Untitled");
        assert!(note.updated_at > before);
    }

    #[test]
    fn apply_can_clear_group() {
        let mut note = Note::new(NoteType::Markdown, Some(GroupId::new()));
        note.apply(&NotePatch {
            group_id: Some(None),
            ..NotePatch::default()
        });
        assert_eq!(note.group_id, None);
    }

    #[test]
    fn display_title_falls_back_for_blank() {
        let mut note = Note::new(NoteType::RichText, None);
        note.title = "   ".to_string();
        assert_eq!(note.display_title(), "Untitled");
    }

    #[test]
    fn pending_count_ignores_done() {
        let mut note = Note::new(NoteType::Todo, None);
        let mut done = TodoItem::new("done");
        done.done = true;
        note.todos = vec![TodoItem::new("open"), done];
        assert_eq!(note.pending_count(), 1);
    }

    #[test]
    fn note_type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&NoteType::RichText).unwrap(),
            "\"richtext\""
        );
        assert_eq!("md".parse::<NoteType>().unwrap(), NoteType::Markdown);
    }
}
