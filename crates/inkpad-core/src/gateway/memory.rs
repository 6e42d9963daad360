//! In-process gateway backed by maps.
//!
//! Behaves like the hosted backend closely enough to drive the store in tests
//! and offline demos: rows are scoped by owner, writes broadcast change events
//! to subscribers, and individual operations can be made to fail.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};

use super::rows::{GroupRow, NoteRow};
use super::{
    ChangeEvent, ChangeKind, Collection, GatewayError, GatewayResult, RemoteGateway, Subscription,
    UploadFile,
};
use crate::auth::{AuthSession, AuthUser};
use crate::config::DEFAULT_IMAGE_BUCKET;
use crate::models::{Group, GroupId, Note, NoteId};

/// Gateway operations that can be observed or made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    ResolveUser,
    FetchNotes,
    UpsertNotes,
    DeleteNote,
    FetchGroups,
    UpsertGroups,
    DeleteGroup,
    Upload,
    Subscribe,
}

#[derive(Default)]
struct Backend {
    notes: BTreeMap<NoteId, NoteRow>,
    groups: BTreeMap<GroupId, GroupRow>,
    objects: BTreeMap<String, Vec<u8>>,
    failing: HashSet<GatewayOp>,
    revoked: bool,
    calls: HashMap<GatewayOp, usize>,
    subscribers: Vec<(Collection, mpsc::UnboundedSender<ChangeEvent>)>,
}

impl Backend {
    fn publish(&mut self, event: &ChangeEvent) {
        self.subscribers.retain(|(collection, sender)| {
            *collection != event.collection || sender.send(event.clone()).is_ok()
        });
    }

    fn write_note(&mut self, row: NoteRow) -> GatewayResult<()> {
        let previous = self.notes.get(&row.id).cloned();
        if previous
            .as_ref()
            .is_some_and(|existing| existing.user_id != row.user_id)
        {
            return Err(GatewayError::Api(format!(
                "note {} belongs to another user",
                row.id
            )));
        }
        let event = ChangeEvent {
            collection: Collection::Notes,
            kind: if previous.is_some() {
                ChangeKind::Update
            } else {
                ChangeKind::Insert
            },
            record: serde_json::to_value(&row).ok(),
            old_record: previous.and_then(|row| serde_json::to_value(row).ok()),
        };
        self.notes.insert(row.id, row);
        self.publish(&event);
        Ok(())
    }

    fn remove_note(&mut self, user_id: &str, id: NoteId) {
        let owned = self
            .notes
            .get(&id)
            .is_some_and(|row| row.user_id == user_id);
        if !owned {
            return;
        }
        if let Some(row) = self.notes.remove(&id) {
            let event = ChangeEvent {
                collection: Collection::Notes,
                kind: ChangeKind::Delete,
                record: None,
                old_record: serde_json::to_value(row).ok(),
            };
            self.publish(&event);
        }
    }

    fn write_group(&mut self, row: GroupRow) -> GatewayResult<()> {
        let previous = self.groups.get(&row.id).cloned();
        if previous
            .as_ref()
            .is_some_and(|existing| existing.user_id != row.user_id)
        {
            return Err(GatewayError::Api(format!(
                "group {} belongs to another user",
                row.id
            )));
        }
        let event = ChangeEvent {
            collection: Collection::Groups,
            kind: if previous.is_some() {
                ChangeKind::Update
            } else {
                ChangeKind::Insert
            },
            record: serde_json::to_value(&row).ok(),
            old_record: previous.and_then(|row| serde_json::to_value(row).ok()),
        };
        self.groups.insert(row.id, row);
        self.publish(&event);
        Ok(())
    }
}

#[derive(Clone)]
pub struct MemoryGateway {
    backend: Arc<Mutex<Backend>>,
    writes_paused: Arc<watch::Sender<bool>>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    #[must_use]
    pub fn new() -> Self {
        let (writes_paused, _) = watch::channel(false);
        Self {
            backend: Arc::new(Mutex::new(Backend::default())),
            writes_paused: Arc::new(writes_paused),
        }
    }

    fn backend(&self) -> MutexGuard<'_, Backend> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `op` fail until `recover` is called.
    pub fn fail(&self, op: GatewayOp) {
        self.backend().failing.insert(op);
    }

    pub fn recover(&self, op: GatewayOp) {
        self.backend().failing.remove(&op);
    }

    /// Reject every session as expired.
    pub fn revoke_sessions(&self, revoked: bool) {
        self.backend().revoked = revoked;
    }

    /// Hold writes in flight until `resume_writes`.
    pub fn pause_writes(&self) {
        self.writes_paused.send_replace(true);
    }

    pub fn resume_writes(&self) {
        self.writes_paused.send_replace(false);
    }

    #[must_use]
    pub fn call_count(&self, op: GatewayOp) -> usize {
        self.backend().calls.get(&op).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn notes_for(&self, user_id: &str) -> Vec<Note> {
        self.backend()
            .notes
            .values()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .map(NoteRow::into_note)
            .collect()
    }

    #[must_use]
    pub fn groups_for(&self, user_id: &str) -> Vec<Group> {
        self.backend()
            .groups
            .values()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .map(GroupRow::into_group)
            .collect()
    }

    #[must_use]
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.backend().objects.get(key).cloned()
    }

    #[must_use]
    pub fn object_keys(&self) -> Vec<String> {
        self.backend().objects.keys().cloned().collect()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut backend = self.backend();
        backend.subscribers.retain(|(_, sender)| !sender.is_closed());
        backend.subscribers.len()
    }

    /// Write a note as another client of `user_id` would, broadcasting the
    /// change.
    pub fn remote_upsert_note(&self, user_id: &str, note: &Note) -> GatewayResult<()> {
        self.backend().write_note(NoteRow::from_note(note, user_id))
    }

    pub fn remote_delete_note(&self, user_id: &str, id: NoteId) {
        self.backend().remove_note(user_id, id);
    }

    pub fn remote_upsert_group(&self, user_id: &str, group: &Group) -> GatewayResult<()> {
        self.backend().write_group(GroupRow::from_group(group, user_id))
    }

    fn begin(&self, op: GatewayOp) -> GatewayResult<()> {
        let mut backend = self.backend();
        *backend.calls.entry(op).or_default() += 1;
        if backend.revoked {
            return Err(GatewayError::Unauthorized("JWT expired".to_string()));
        }
        if backend.failing.contains(&op) {
            return Err(GatewayError::Api(format!("{op:?} failed")));
        }
        Ok(())
    }

    async fn writable(&self) {
        let mut paused = self.writes_paused.subscribe();
        let _ = paused.wait_for(|paused| !*paused).await;
    }
}

#[async_trait]
impl RemoteGateway for MemoryGateway {
    async fn resolve_user(&self, session: &AuthSession) -> GatewayResult<AuthUser> {
        self.begin(GatewayOp::ResolveUser)?;
        Ok(session.user.clone())
    }

    async fn fetch_notes(&self, session: &AuthSession) -> GatewayResult<Vec<Note>> {
        self.begin(GatewayOp::FetchNotes)?;
        Ok(self.notes_for(session.user_id()))
    }

    async fn upsert_notes(&self, session: &AuthSession, notes: &[Note]) -> GatewayResult<()> {
        self.begin(GatewayOp::UpsertNotes)?;
        self.writable().await;
        let mut backend = self.backend();
        for note in notes {
            backend.write_note(NoteRow::from_note(note, session.user_id()))?;
        }
        Ok(())
    }

    async fn delete_note(&self, session: &AuthSession, id: NoteId) -> GatewayResult<()> {
        self.begin(GatewayOp::DeleteNote)?;
        self.writable().await;
        self.backend().remove_note(session.user_id(), id);
        Ok(())
    }

    async fn fetch_groups(&self, session: &AuthSession) -> GatewayResult<Vec<Group>> {
        self.begin(GatewayOp::FetchGroups)?;
        Ok(self.groups_for(session.user_id()))
    }

    async fn upsert_groups(&self, session: &AuthSession, groups: &[Group]) -> GatewayResult<()> {
        self.begin(GatewayOp::UpsertGroups)?;
        self.writable().await;
        let mut backend = self.backend();
        for group in groups {
            backend.write_group(GroupRow::from_group(group, session.user_id()))?;
        }
        Ok(())
    }

    async fn delete_group_and_detach(
        &self,
        session: &AuthSession,
        id: GroupId,
    ) -> GatewayResult<()> {
        self.begin(GatewayOp::DeleteGroup)?;
        self.writable().await;
        let user_id = session.user_id();
        let mut backend = self.backend();
        let members: Vec<NoteRow> = backend
            .notes
            .values()
            .filter(|row| row.user_id == user_id && row.group_id == Some(id))
            .cloned()
            .collect();
        for mut row in members {
            row.group_id = None;
            backend.write_note(row)?;
        }

        let owned = backend
            .groups
            .get(&id)
            .is_some_and(|row| row.user_id == user_id);
        if owned {
            if let Some(row) = backend.groups.remove(&id) {
                let event = ChangeEvent {
                    collection: Collection::Groups,
                    kind: ChangeKind::Delete,
                    record: None,
                    old_record: serde_json::to_value(row).ok(),
                };
                backend.publish(&event);
            }
        }
        Ok(())
    }

    async fn upload_file(&self, session: &AuthSession, file: &UploadFile) -> GatewayResult<String> {
        self.begin(GatewayOp::Upload)?;
        if file.bytes.is_empty() {
            return Err(GatewayError::InvalidFile(format!(
                "{} is empty",
                file.file_name
            )));
        }
        let key = file.object_key(session.user_id());
        self.backend().objects.insert(key.clone(), file.bytes.clone());
        Ok(format!("memory://{DEFAULT_IMAGE_BUCKET}/{key}"))
    }

    async fn subscribe(
        &self,
        _session: &AuthSession,
        collection: Collection,
        events: mpsc::UnboundedSender<ChangeEvent>,
    ) -> GatewayResult<Subscription> {
        self.begin(GatewayOp::Subscribe)?;
        let (feed_tx, mut feed_rx) = mpsc::unbounded_channel();
        self.backend().subscribers.push((collection, feed_tx));

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    event = feed_rx.recv() => {
                        let Some(event) = event else { break };
                        if events.send(event).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        Ok(Subscription::new(collection, stop_tx, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NoteType;
    use crate::util::unix_timestamp_now;

    fn session(user_id: &str) -> AuthSession {
        AuthSession {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: unix_timestamp_now() + 3600,
            user: AuthUser {
                id: user_id.to_string(),
                email: None,
            },
        }
    }

    #[tokio::test]
    async fn rows_are_scoped_by_owner() {
        let gateway = MemoryGateway::new();
        let alice = session("alice");
        let bob = session("bob");
        let note = Note::new(NoteType::Markdown, None);

        gateway.upsert_notes(&alice, &[note.clone()]).await.unwrap();

        assert_eq!(gateway.fetch_notes(&alice).await.unwrap().len(), 1);
        assert!(gateway.fetch_notes(&bob).await.unwrap().is_empty());

        gateway.delete_note(&bob, note.id).await.unwrap();
        assert_eq!(gateway.notes_for("alice").len(), 1);
        assert!(gateway.upsert_notes(&bob, &[note]).await.is_err());
    }

    #[tokio::test]
    async fn delete_group_detaches_members() {
        let gateway = MemoryGateway::new();
        let alice = session("alice");
        let group = Group::new("Work", "#ff0000");
        let note = Note::new(NoteType::Todo, Some(group.id));
        gateway.upsert_groups(&alice, &[group.clone()]).await.unwrap();
        gateway.upsert_notes(&alice, &[note]).await.unwrap();

        gateway
            .delete_group_and_detach(&alice, group.id)
            .await
            .unwrap();

        assert!(gateway.groups_for("alice").is_empty());
        assert_eq!(gateway.notes_for("alice")[0].group_id, None);
    }

    #[tokio::test]
    async fn failures_and_revocation() {
        let gateway = MemoryGateway::new();
        let alice = session("alice");

        gateway.fail(GatewayOp::FetchGroups);
        assert!(matches!(
            gateway.fetch_groups(&alice).await,
            Err(GatewayError::Api(_))
        ));
        gateway.recover(GatewayOp::FetchGroups);
        assert!(gateway.fetch_groups(&alice).await.is_ok());

        gateway.revoke_sessions(true);
        let error = gateway.fetch_notes(&alice).await.unwrap_err();
        assert!(error.is_unauthorized());
        assert_eq!(gateway.call_count(GatewayOp::FetchNotes), 1);
    }

    #[tokio::test]
    async fn subscribers_receive_changes_until_unsubscribed() {
        let gateway = MemoryGateway::new();
        let alice = session("alice");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = gateway
            .subscribe(&alice, Collection::Notes, tx)
            .await
            .unwrap();

        let note = Note::new(NoteType::Markdown, None);
        gateway.remote_upsert_note("alice", &note).unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert!(event.is_owned_by("alice"));

        gateway.remote_upsert_group("alice", &Group::new("Ignored", "")).unwrap();
        subscription.unsubscribe().await;
        assert!(rx.recv().await.is_none());
        assert_eq!(gateway.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn upload_stores_object_under_user_prefix() {
        let gateway = MemoryGateway::new();
        let alice = session("alice");
        let url = gateway
            .upload_file(&alice, &UploadFile::new("cat.png", vec![1, 2, 3]))
            .await
            .unwrap();

        let keys = gateway.object_keys();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].starts_with("alice/"));
        assert!(url.ends_with(&keys[0]));
        assert_eq!(gateway.object(&keys[0]), Some(vec![1, 2, 3]));
    }
}
