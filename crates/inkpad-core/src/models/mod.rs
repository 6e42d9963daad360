//! Data models for inkpad

mod group;
mod id;
mod note;
mod todo;

pub use group::{normalize_color, Group, GroupPatch, DEFAULT_GROUP_COLOR};
pub use id::{GroupId, NoteId, TodoId};
pub use note::{Note, NotePatch, NoteType, View, DEFAULT_NOTE_TITLE};
pub use todo::{Priority, TodoItem, TodoPatch};
