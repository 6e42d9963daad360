//! Action dispatch.

use super::NoteStore;
use crate::auth::SessionState;
use crate::error::Result;
use crate::gateway::RemoteGateway;
use crate::models::{
    Group, GroupId, GroupPatch, Note, NoteId, NotePatch, NoteType, TodoId, TodoItem, TodoPatch,
    View,
};

/// When local state changes relative to the backend write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStrategy {
    /// Apply locally, then persist in the background
    Optimistic,
    /// Persist first; apply locally only once the backend confirms
    Confirmed,
}

/// User intent forwarded by a presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    AddNote {
        note_type: NoteType,
        group_id: Option<GroupId>,
    },
    UpdateNote {
        id: NoteId,
        patch: NotePatch,
    },
    DeleteNote(NoteId),
    AddGroup {
        name: String,
        color: String,
    },
    UpdateGroup {
        id: GroupId,
        patch: GroupPatch,
    },
    DeleteGroup(GroupId),
    MoveNoteToGroup {
        note_id: NoteId,
        group_id: Option<GroupId>,
    },
    UpdateTodo {
        note_id: NoteId,
        todo_id: TodoId,
        patch: TodoPatch,
    },
    SetActiveNote(Option<NoteId>),
    SetView(View),
    SetUser(SessionState),
}

impl Action {
    /// Persistence strategy, or `None` for purely local setters.
    #[must_use]
    pub const fn strategy(&self) -> Option<MutationStrategy> {
        match self {
            Self::DeleteGroup(_) => Some(MutationStrategy::Confirmed),
            Self::SetActiveNote(_) | Self::SetView(_) | Self::SetUser(_) => None,
            _ => Some(MutationStrategy::Optimistic),
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AddNote { .. } => "add_note",
            Self::UpdateNote { .. } => "update_note",
            Self::DeleteNote(_) => "delete_note",
            Self::AddGroup { .. } => "add_group",
            Self::UpdateGroup { .. } => "update_group",
            Self::DeleteGroup(_) => "delete_group",
            Self::MoveNoteToGroup { .. } => "move_note_to_group",
            Self::UpdateTodo { .. } => "update_todo",
            Self::SetActiveNote(_) => "set_active_note",
            Self::SetView(_) => "set_view",
            Self::SetUser(_) => "set_user",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Note(Note),
    Group(Group),
    Todo(TodoItem),
    /// Applied with nothing to return
    Done,
    /// Target id did not match anything; state unchanged
    NotFound,
}

impl ActionOutcome {
    fn from_note(note: Option<Note>) -> Self {
        note.map_or(Self::NotFound, Self::Note)
    }

    fn from_flag(applied: bool) -> Self {
        if applied {
            Self::Done
        } else {
            Self::NotFound
        }
    }
}

impl<G: RemoteGateway> NoteStore<G> {
    /// Run `action` with its mutation strategy.
    pub async fn dispatch(&self, action: Action) -> Result<ActionOutcome> {
        tracing::debug!(strategy = ?action.strategy(), "Dispatching {}", action.name());
        let outcome = match action {
            Action::AddNote {
                note_type,
                group_id,
            } => ActionOutcome::Note(self.add_note(note_type, group_id).await),
            Action::UpdateNote { id, patch } => {
                ActionOutcome::from_note(self.update_note(id, patch).await)
            }
            Action::DeleteNote(id) => ActionOutcome::from_flag(self.delete_note(id).await),
            Action::AddGroup { name, color } => {
                ActionOutcome::Group(self.add_group(&name, &color).await)
            }
            Action::UpdateGroup { id, patch } => self
                .update_group(id, patch)
                .await
                .map_or(ActionOutcome::NotFound, ActionOutcome::Group),
            Action::DeleteGroup(id) => ActionOutcome::from_flag(self.delete_group(id).await?),
            Action::MoveNoteToGroup { note_id, group_id } => {
                ActionOutcome::from_note(self.move_note_to_group(note_id, group_id).await)
            }
            Action::UpdateTodo {
                note_id,
                todo_id,
                patch,
            } => self
                .update_todo(note_id, todo_id, &patch)
                .await
                .map_or(ActionOutcome::NotFound, ActionOutcome::Todo),
            Action::SetActiveNote(id) => ActionOutcome::from_flag(self.set_active_note(id).await),
            Action::SetView(view) => {
                self.set_view(view).await;
                ActionOutcome::Done
            }
            Action::SetUser(session) => {
                self.set_user(session).await;
                ActionOutcome::Done
            }
        };
        Ok(outcome)
    }
}
