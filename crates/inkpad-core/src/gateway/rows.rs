//! Backend row shapes for the notes and groups tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{Group, GroupId, Note, NoteId, NoteType, TodoItem, DEFAULT_GROUP_COLOR};
use crate::util::unix_millis_now;

/// A `notes` table row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRow {
    pub id: NoteId,
    pub user_id: String,
    #[serde(default)]
    pub group_id: Option<GroupId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(rename = "type", default)]
    pub note_type: NoteType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub todos: Vec<TodoItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NoteRow {
    #[must_use]
    pub fn from_note(note: &Note, user_id: &str) -> Self {
        Self {
            id: note.id,
            user_id: user_id.to_string(),
            group_id: note.group_id,
            title: note.title.clone(),
            content: note.content.clone(),
            note_type: note.note_type,
            todos: note.todos.clone(),
            created_at: from_millis(note.created_at),
            updated_at: from_millis(note.updated_at),
        }
    }

    /// Convert to a local note. Local-only flags start cleared.
    #[must_use]
    pub fn into_note(self) -> Note {
        Note {
            id: self.id,
            title: self.title,
            content: self.content,
            note_type: self.note_type,
            group_id: self.group_id,
            created_at: self.created_at.timestamp_millis(),
            updated_at: self.updated_at.timestamp_millis(),
            todos: self.todos,
            show_tasks: false,
        }
    }
}

/// A `groups` table row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRow {
    pub id: GroupId,
    pub user_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default = "default_color", deserialize_with = "color_or_default")]
    pub color: String,
    pub created_at: DateTime<Utc>,
}

impl GroupRow {
    #[must_use]
    pub fn from_group(group: &Group, user_id: &str) -> Self {
        Self {
            id: group.id,
            user_id: user_id.to_string(),
            name: group.name.clone(),
            color: group.color.clone(),
            created_at: from_millis(group.created_at),
        }
    }

    #[must_use]
    pub fn into_group(self) -> Group {
        Group {
            id: self.id,
            name: self.name,
            color: self.color,
            created_at: self.created_at.timestamp_millis(),
        }
    }
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis)
        .or_else(|| DateTime::from_timestamp_millis(unix_millis_now()))
        .unwrap_or_default()
}

fn default_color() -> String {
    DEFAULT_GROUP_COLOR.to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn color_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_color))
}
