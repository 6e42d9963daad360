//! Derived views over store state: dashboard, sidebar sections and drop
//! targets.

use std::fmt;
use std::str::FromStr;

use crate::gateway::RemoteGateway;
use crate::models::{Group, GroupId, Note, NoteId, NoteType, TodoItem, View};
use crate::store::NoteStore;

/// Drop-zone id of the ungrouped section
pub const UNGROUPED_ZONE: &str = "ungrouped";

/// One note's tasks on the dashboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardEntry {
    pub note_id: NoteId,
    pub title: String,
    pub pending: Vec<TodoItem>,
    pub completed: Vec<TodoItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dashboard {
    pub entries: Vec<DashboardEntry>,
}

impl Dashboard {
    /// Every note with at least one todo, in collection order.
    #[must_use]
    pub fn build(notes: &[Note]) -> Self {
        let entries = notes
            .iter()
            .filter(|note| note.has_todos())
            .map(|note| {
                let (completed, pending): (Vec<TodoItem>, Vec<TodoItem>) =
                    note.todos.iter().cloned().partition(|todo| todo.done);
                DashboardEntry {
                    note_id: note.id,
                    title: note.display_title().to_string(),
                    pending,
                    completed,
                }
            })
            .collect();
        Self { entries }
    }

    #[must_use]
    pub fn pending_total(&self) -> usize {
        self.entries.iter().map(|entry| entry.pending.len()).sum()
    }

    #[must_use]
    pub fn completed_total(&self) -> usize {
        self.entries.iter().map(|entry| entry.completed.len()).sum()
    }
}

/// A sidebar section: one group, or the trailing ungrouped section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarSection {
    pub group: Option<Group>,
    pub notes: Vec<Note>,
}

impl SidebarSection {
    #[must_use]
    pub fn title(&self) -> &str {
        self.group.as_ref().map_or("Ungrouped", |group| group.name.as_str())
    }

    #[must_use]
    pub fn drop_target(&self) -> DropTarget {
        self.group
            .as_ref()
            .map_or(DropTarget::Ungrouped, |group| DropTarget::Group(group.id))
    }
}

/// Group sections in group order, then the ungrouped section. Notes pointing
/// at a group that no longer exists land in the ungrouped section.
#[must_use]
pub fn sidebar_sections(groups: &[Group], notes: &[Note]) -> Vec<SidebarSection> {
    let mut sections: Vec<SidebarSection> = groups
        .iter()
        .map(|group| SidebarSection {
            group: Some(group.clone()),
            notes: notes
                .iter()
                .filter(|note| note.group_id == Some(group.id))
                .cloned()
                .collect(),
        })
        .collect();

    let ungrouped = notes
        .iter()
        .filter(|note| {
            !note
                .group_id
                .is_some_and(|id| groups.iter().any(|group| group.id == id))
        })
        .cloned()
        .collect();
    sections.push(SidebarSection {
        group: None,
        notes: ungrouped,
    });
    sections
}

/// Short status shown next to a note in lists.
#[must_use]
pub fn note_badge(note: &Note) -> Option<String> {
    match note.note_type {
        NoteType::Todo => Some(format!("{} pending tasks", note.pending_count())),
        NoteType::Markdown | NoteType::RichText if note.has_todos() => {
            Some(format!("{} tasks", note.todos.len()))
        }
        NoteType::Markdown | NoteType::RichText => None,
    }
}

/// Where a dragged note was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropTarget {
    Group(GroupId),
    Ungrouped,
}

impl DropTarget {
    #[must_use]
    pub const fn group_id(self) -> Option<GroupId> {
        match self {
            Self::Group(id) => Some(id),
            Self::Ungrouped => None,
        }
    }
}

impl fmt::Display for DropTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group(id) => write!(f, "{id}"),
            Self::Ungrouped => f.write_str(UNGROUPED_ZONE),
        }
    }
}

impl FromStr for DropTarget {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let zone = s.trim();
        if zone.eq_ignore_ascii_case(UNGROUPED_ZONE) {
            return Ok(Self::Ungrouped);
        }
        zone.parse().map(Self::Group)
    }
}

impl<G: RemoteGateway> NoteStore<G> {
    /// Move a dropped note into the target section.
    pub async fn drop_note(&self, note_id: NoteId, target: DropTarget) -> Option<Note> {
        self.move_note_to_group(note_id, target.group_id()).await
    }

    /// Select a note from a list and switch to the editor view.
    pub async fn open_note(&self, note_id: NoteId) -> bool {
        if !self.set_active_note(Some(note_id)).await {
            return false;
        }
        self.set_view(View::Notes).await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionState;
    use crate::gateway::MemoryGateway;
    use pretty_assertions::assert_eq;

    fn todo(text: &str, done: bool) -> TodoItem {
        let mut item = TodoItem::new(text);
        item.done = done;
        item
    }

    #[test]
    fn dashboard_splits_pending_and_completed() {
        let mut errands = Note::new(NoteType::Todo, None);
        errands.title = "Errands".to_string();
        errands.todos = vec![todo("Milk", false), todo("Bank", true), todo("Post", false)];
        let plain = Note::new(NoteType::Markdown, None);

        let dashboard = Dashboard::build(&[plain, errands.clone()]);

        assert_eq!(dashboard.entries.len(), 1);
        let entry = &dashboard.entries[0];
        assert_eq!(entry.note_id, errands.id);
        let pending: Vec<_> = entry.pending.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(pending, vec!["Milk", "Post"]);
        assert_eq!(dashboard.pending_total(), 2);
        assert_eq!(dashboard.completed_total(), 1);
    }

    #[test]
    fn sidebar_orders_groups_then_ungrouped() {
        let work = Group::new("Work", "#ff0000");
        let home = Group::new("Home", "#00ff00");
        let in_work = Note::new(NoteType::Markdown, Some(work.id));
        let loose = Note::new(NoteType::Markdown, None);
        let orphan = Note::new(NoteType::Markdown, Some(GroupId::new()));

        let sections = sidebar_sections(
            &[work.clone(), home],
            &[in_work.clone(), loose.clone(), orphan.clone()],
        );

        let titles: Vec<_> = sections.iter().map(SidebarSection::title).collect();
        assert_eq!(titles, vec!["Work", "Home", "Ungrouped"]);
        assert_eq!(sections[0].notes, vec![in_work]);
        assert!(sections[1].notes.is_empty());
        assert_eq!(sections[2].notes, vec![loose, orphan]);
        assert_eq!(sections[0].drop_target(), DropTarget::Group(work.id));
        assert_eq!(sections[2].drop_target(), DropTarget::Ungrouped);
    }

    #[test]
    fn drop_target_parses_zone_ids() {
        let id = GroupId::new();
        assert_eq!("ungrouped".parse::<DropTarget>().unwrap(), DropTarget::Ungrouped);
        assert_eq!(
            id.to_string().parse::<DropTarget>().unwrap(),
            DropTarget::Group(id)
        );
        assert!("not-a-zone".parse::<DropTarget>().is_err());
        assert_eq!(DropTarget::Ungrouped.to_string(), UNGROUPED_ZONE);
    }

    #[test]
    fn badge_counts_pending_tasks() {
        let mut note = Note::new(NoteType::Todo, None);
        note.todos = vec![todo("a", false), todo("b", true)];
        assert_eq!(note_badge(&note).as_deref(), Some("1 pending tasks"));
        assert_eq!(note_badge(&Note::new(NoteType::Markdown, None)), None);
    }

    #[tokio::test]
    async fn dropping_on_ungrouped_clears_group() {
        let store = NoteStore::new(MemoryGateway::new(), SessionState::SignedOut);
        let group = store.add_group("Work", "#ff0000").await;
        let note = store.add_note(NoteType::Markdown, Some(group.id)).await;

        let moved = store.drop_note(note.id, DropTarget::Ungrouped).await.unwrap();
        assert_eq!(moved.group_id, None);
        let moved = store
            .drop_note(note.id, DropTarget::Group(group.id))
            .await
            .unwrap();
        assert_eq!(moved.group_id, Some(group.id));
    }

    #[tokio::test]
    async fn opening_a_note_switches_view() {
        let store = NoteStore::new(MemoryGateway::new(), SessionState::SignedOut);
        let first = store.add_note(NoteType::Markdown, None).await;
        store.add_note(NoteType::Markdown, None).await;

        assert!(store.open_note(first.id).await);
        assert_eq!(store.view().await, View::Notes);
        assert_eq!(store.active_note().await.map(|n| n.id), Some(first.id));
        assert!(!store.open_note(NoteId::new()).await);
    }
}
