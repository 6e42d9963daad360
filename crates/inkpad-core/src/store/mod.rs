//! Client state store.
//!
//! Single source of truth for notes, groups, the active note, the current view
//! and the session. All backend mutations go through here. Most actions apply
//! locally first and persist in the background; deleting a group waits for the
//! backend before touching local state.

mod action;
mod sync;

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::auth::SessionState;
use crate::error::Result;
use crate::gateway::{GatewayError, RemoteGateway, UploadFile};
use crate::models::{
    Group, GroupId, GroupPatch, Note, NoteId, NotePatch, NoteType, TodoId, TodoItem, TodoPatch,
    View,
};

pub use action::{Action, ActionOutcome, MutationStrategy};
pub use sync::SyncHandle;

/// How remote change notifications are folded into local state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Reload the whole collection on every notification
    Refetch,
    /// Apply the notification's row by id, refetching when it carries none
    #[default]
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub reconcile: ReconcileMode,
    /// Open change feeds on `initialize`. One-shot callers turn this off.
    pub live: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            reconcile: ReconcileMode::default(),
            live: true,
        }
    }
}

/// Everything the store owns. Cloned out for readers via `snapshot`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreState {
    /// Most recently updated first
    pub notes: Vec<Note>,
    pub groups: Vec<Group>,
    pub active_note_id: Option<NoteId>,
    pub view: View,
    pub session: SessionState,
    pub initialized: bool,
}

impl StoreState {
    /// The active note, always the same value as its collection entry.
    #[must_use]
    pub fn active_note(&self) -> Option<&Note> {
        self.active_note_id.and_then(|id| self.note(id))
    }

    #[must_use]
    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == id)
    }

    #[must_use]
    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.iter().find(|group| group.id == id)
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.session.user().map(|user| user.id.as_str())
    }

    fn note_mut(&mut self, id: NoteId) -> Option<&mut Note> {
        self.notes.iter_mut().find(|note| note.id == id)
    }

    fn group_mut(&mut self, id: GroupId) -> Option<&mut Group> {
        self.groups.iter_mut().find(|group| group.id == id)
    }

    fn forget_missing_active(&mut self) {
        if let Some(id) = self.active_note_id {
            if self.note(id).is_none() {
                self.active_note_id = None;
            }
        }
    }

    /// Replace the note collection wholesale, keeping local-only flags.
    fn replace_notes(&mut self, mut incoming: Vec<Note>) {
        for note in &mut incoming {
            if let Some(existing) = self.note(note.id) {
                note.show_tasks = existing.show_tasks;
            }
        }
        incoming.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        self.notes = incoming;
        self.forget_missing_active();
    }

    fn replace_groups(&mut self, mut incoming: Vec<Group>) {
        incoming.sort_by_key(|group| group.created_at);
        self.groups = incoming;
    }

    /// Fold one remote note in by id. The remote row replaces the local copy
    /// as is; only local-only flags carry over.
    fn merge_remote_note(&mut self, mut note: Note) {
        if let Some(existing) = self.note_mut(note.id) {
            note.show_tasks = existing.show_tasks;
            *existing = note;
            return;
        }
        let position = self
            .notes
            .iter()
            .position(|existing| existing.updated_at <= note.updated_at)
            .unwrap_or(self.notes.len());
        self.notes.insert(position, note);
    }

    fn merge_remote_group(&mut self, group: Group) {
        if let Some(existing) = self.group_mut(group.id) {
            *existing = group;
            return;
        }
        self.groups.push(group);
        self.groups.sort_by_key(|group| group.created_at);
    }

    fn remove_note(&mut self, id: NoteId) -> bool {
        let before = self.notes.len();
        self.notes.retain(|note| note.id != id);
        self.forget_missing_active();
        self.notes.len() != before
    }

    /// Drop a group and clear every note reference to it.
    fn remove_group(&mut self, id: GroupId) {
        self.groups.retain(|group| group.id != id);
        for note in &mut self.notes {
            if note.group_id == Some(id) {
                note.group_id = None;
            }
        }
    }
}

/// Background write issued after an optimistic change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PersistJob {
    Notes,
    Groups,
    DeleteNote(NoteId),
}

impl PersistJob {
    const fn describe(self) -> &'static str {
        match self {
            Self::Notes => "sync notes",
            Self::Groups => "sync groups",
            Self::DeleteNote(_) => "delete note",
        }
    }
}

/// Process-wide state container. Cheap to clone; clones share state.
pub struct NoteStore<G: RemoteGateway> {
    gateway: Arc<G>,
    state: Arc<Mutex<StoreState>>,
    options: StoreOptions,
    revision: Arc<watch::Sender<u64>>,
    in_flight: Arc<StdMutex<Vec<JoinHandle<()>>>>,
    persist_lock: Arc<Mutex<()>>,
    init_lock: Arc<Mutex<()>>,
}

impl<G: RemoteGateway> Clone for NoteStore<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            state: Arc::clone(&self.state),
            options: self.options,
            revision: Arc::clone(&self.revision),
            in_flight: Arc::clone(&self.in_flight),
            persist_lock: Arc::clone(&self.persist_lock),
            init_lock: Arc::clone(&self.init_lock),
        }
    }
}

impl<G: RemoteGateway> NoteStore<G> {
    pub fn new(gateway: G, session: SessionState) -> Self {
        Self::with_options(gateway, session, StoreOptions::default())
    }

    pub fn with_options(gateway: G, session: SessionState, options: StoreOptions) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            gateway: Arc::new(gateway),
            state: Arc::new(Mutex::new(StoreState {
                session,
                ..StoreState::default()
            })),
            options,
            revision: Arc::new(revision),
            in_flight: Arc::new(StdMutex::new(Vec::new())),
            persist_lock: Arc::new(Mutex::new(())),
            init_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub const fn options(&self) -> StoreOptions {
        self.options
    }

    /// Receiver that ticks after every state change.
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn notify(&self) {
        self.revision.send_modify(|revision| *revision = revision.wrapping_add(1));
    }

    pub async fn snapshot(&self) -> StoreState {
        self.state.lock().await.clone()
    }

    pub async fn notes(&self) -> Vec<Note> {
        self.state.lock().await.notes.clone()
    }

    pub async fn groups(&self) -> Vec<Group> {
        self.state.lock().await.groups.clone()
    }

    pub async fn note(&self, id: NoteId) -> Option<Note> {
        self.state.lock().await.note(id).cloned()
    }

    pub async fn active_note(&self) -> Option<Note> {
        self.state.lock().await.active_note().cloned()
    }

    pub async fn view(&self) -> View {
        self.state.lock().await.view
    }

    pub async fn session(&self) -> SessionState {
        self.state.lock().await.session.clone()
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.lock().await.initialized
    }

    /// Create an untitled note, make it active and persist in the background.
    pub async fn add_note(&self, note_type: NoteType, group_id: Option<GroupId>) -> Note {
        let note = Note::new(note_type, group_id);
        {
            let mut state = self.state.lock().await;
            state.notes.insert(0, note.clone());
            state.active_note_id = Some(note.id);
        }
        self.notify();
        tracing::debug!("Added {} note {}", note_type, note.id);
        self.schedule(PersistJob::Notes);
        note
    }

    /// Merge `patch` into a note. Unknown ids are a silent no-op.
    pub async fn update_note(&self, id: NoteId, patch: NotePatch) -> Option<Note> {
        let updated = {
            let mut state = self.state.lock().await;
            let note = state.note_mut(id)?;
            note.apply(&patch);
            note.clone()
        };
        self.notify();
        self.schedule(PersistJob::Notes);
        Some(updated)
    }

    pub async fn delete_note(&self, id: NoteId) -> bool {
        let removed = self.state.lock().await.remove_note(id);
        if removed {
            self.notify();
            self.schedule(PersistJob::DeleteNote(id));
        }
        removed
    }

    pub async fn add_group(&self, name: &str, color: &str) -> Group {
        let group = Group::new(name, color);
        self.state.lock().await.groups.push(group.clone());
        self.notify();
        self.schedule(PersistJob::Groups);
        group
    }

    pub async fn update_group(&self, id: GroupId, patch: GroupPatch) -> Option<Group> {
        let updated = {
            let mut state = self.state.lock().await;
            let group = state.group_mut(id)?;
            group.apply(&patch);
            group.clone()
        };
        self.notify();
        self.schedule(PersistJob::Groups);
        Some(updated)
    }

    /// Delete a group on the backend, then locally.
    ///
    /// Local state is untouched until the backend confirms. Returns
    /// `Ok(false)` when the group is unknown.
    pub async fn delete_group(&self, id: GroupId) -> Result<bool> {
        let session = {
            let state = self.state.lock().await;
            if state.group(id).is_none() {
                return Ok(false);
            }
            state.session.session().cloned()
        };

        match session {
            Some(session) => {
                if let Err(error) = self.gateway.delete_group_and_detach(&session, id).await {
                    self.handle_gateway_error("delete group", &error).await;
                    return Err(error.into());
                }
            }
            None => tracing::debug!("Signed out; deleting group {} locally only", id),
        }

        self.state.lock().await.remove_group(id);
        self.notify();
        Ok(true)
    }

    /// Reassign a note's group; `None` makes it ungrouped.
    pub async fn move_note_to_group(
        &self,
        note_id: NoteId,
        group_id: Option<GroupId>,
    ) -> Option<Note> {
        let patch = NotePatch {
            group_id: Some(group_id),
            ..NotePatch::default()
        };
        self.update_note(note_id, patch).await
    }

    /// Merge `patch` into one embedded todo. Unknown note or todo ids leave
    /// the collection unchanged.
    pub async fn update_todo(
        &self,
        note_id: NoteId,
        todo_id: TodoId,
        patch: &TodoPatch,
    ) -> Option<TodoItem> {
        let updated = {
            let mut state = self.state.lock().await;
            let note = state.note_mut(note_id)?;
            let todo = note.todos.iter_mut().find(|todo| todo.id == todo_id)?;
            todo.apply(patch);
            let todo = todo.clone();
            note.touch();
            todo
        };
        self.notify();
        self.schedule(PersistJob::Notes);
        Some(updated)
    }

    /// Select the active note. Ids not in the collection are rejected.
    pub async fn set_active_note(&self, id: Option<NoteId>) -> bool {
        {
            let mut state = self.state.lock().await;
            if id.is_some_and(|id| state.note(id).is_none()) {
                return false;
            }
            state.active_note_id = id;
        }
        self.notify();
        true
    }

    pub async fn set_view(&self, view: View) {
        self.state.lock().await.view = view;
        self.notify();
    }

    /// Replace the session. Any change of identity marks the store
    /// uninitialized so the next `initialize` loads; switching away from a
    /// signed-in identity also drops that identity's collections.
    pub async fn set_user(&self, session: SessionState) {
        {
            let mut state = self.state.lock().await;
            let previous = state.user_id().map(str::to_string);
            let next = session.user().map(|user| user.id.clone());
            if previous != next {
                state.initialized = false;
            }
            if previous.is_some() && previous != next {
                state.notes.clear();
                state.groups.clear();
                state.active_note_id = None;
            }
            state.session = session;
        }
        self.notify();
    }

    /// Upload a file for the current user and return its public URL.
    ///
    /// Does not touch note content; see `content::splice_image`.
    pub async fn upload_image(&self, file: &UploadFile) -> Option<String> {
        let Some(session) = self.state.lock().await.session.session().cloned() else {
            tracing::warn!("Cannot upload {} while signed out", file.file_name);
            return None;
        };
        match self.gateway.upload_file(&session, file).await {
            Ok(url) => Some(url),
            Err(error) => {
                self.handle_gateway_error("upload image", &error).await;
                None
            }
        }
    }

    /// Wait for every background write issued so far.
    pub async fn flush(&self) {
        loop {
            let pending = {
                let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
                std::mem::take(&mut *in_flight)
            };
            if pending.is_empty() {
                break;
            }
            for task in pending {
                if let Err(error) = task.await {
                    tracing::warn!("Persistence task did not finish: {}", error);
                }
            }
        }
    }

    fn schedule(&self, job: PersistJob) {
        let store = self.clone();
        let task = tokio::spawn(async move { store.persist(job).await });
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.retain(|task| !task.is_finished());
        in_flight.push(task);
    }

    /// Send the current collection to the backend. Writes are serialized and
    /// read state when they run, so the last one always carries the latest
    /// local edits.
    async fn persist(&self, job: PersistJob) {
        let _serial = self.persist_lock.lock().await;
        let (session, notes, groups) = {
            let state = self.state.lock().await;
            let Some(session) = state.session.session().cloned() else {
                tracing::debug!("Signed out; skipping {}", job.describe());
                return;
            };
            match job {
                PersistJob::Groups => (session, Vec::new(), state.groups.clone()),
                PersistJob::Notes | PersistJob::DeleteNote(_) => {
                    (session, state.notes.clone(), Vec::new())
                }
            }
        };

        let result = match job {
            PersistJob::Notes => self.gateway.upsert_notes(&session, &notes).await,
            PersistJob::Groups => self.gateway.upsert_groups(&session, &groups).await,
            PersistJob::DeleteNote(id) => match self.gateway.delete_note(&session, id).await {
                Ok(()) => self.gateway.upsert_notes(&session, &notes).await,
                Err(error) => Err(error),
            },
        };
        if let Err(error) = result {
            self.handle_gateway_error(job.describe(), &error).await;
        }
    }

    /// Log a failed backend call; an unauthorized session signs the store out.
    async fn handle_gateway_error(&self, context: &str, error: &GatewayError) {
        tracing::error!("Failed to {}: {}", context, error);
        if error.is_unauthorized() {
            self.expire_session().await;
        }
    }

    async fn expire_session(&self) {
        let expired = {
            let mut state = self.state.lock().await;
            let was_signed_in = state.session.is_signed_in();
            state.session = SessionState::SignedOut;
            state.initialized = false;
            was_signed_in
        };
        if expired {
            tracing::warn!("Session expired; signed out");
            self.notify();
        }
    }
}
