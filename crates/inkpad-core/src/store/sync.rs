//! Initial load and reconciliation of remote change notifications.

use std::fmt;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{NoteStore, ReconcileMode};
use crate::auth::AuthSession;
use crate::error::Result;
use crate::gateway::{
    ChangeEvent, ChangeKind, Collection, GatewayError, GroupRow, NoteRow, RemoteGateway,
    Subscription,
};
use crate::models::{GroupId, NoteId};

/// Live change feeds opened by `NoteStore::initialize`.
///
/// Dropping the handle stops delivery; `shutdown` also leaves the backend
/// channels cleanly.
pub struct SyncHandle {
    subscriptions: Vec<Subscription>,
    consumer: Option<JoinHandle<()>>,
}

impl SyncHandle {
    const fn detached() -> Self {
        Self {
            subscriptions: Vec::new(),
            consumer: None,
        }
    }

    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub async fn shutdown(mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe().await;
        }
        if let Some(consumer) = self.consumer.take() {
            consumer.abort();
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        if let Some(consumer) = self.consumer.take() {
            consumer.abort();
        }
    }
}

impl fmt::Debug for SyncHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncHandle")
            .field("subscriptions", &self.subscriptions)
            .field("running", &self.consumer.is_some())
            .finish()
    }
}

impl<G: RemoteGateway> NoteStore<G> {
    /// Load both collections and open one change feed per collection.
    ///
    /// Returns `Ok(None)` when already initialized for the current identity.
    /// While signed out nothing is loaded and the store stays uninitialized,
    /// so a later call after sign-in does the real load. Fetch failures are
    /// logged and leave the collection as it was; an expired session signs
    /// the store out and is returned as an error.
    pub async fn initialize(&self) -> Result<Option<SyncHandle>> {
        let _init = self.init_lock.lock().await;
        let session = {
            let state = self.state.lock().await;
            if state.initialized {
                return Ok(None);
            }
            state.session.session().cloned()
        };

        let Some(session) = session else {
            tracing::debug!("Signed out; nothing to load until a user signs in");
            return Ok(Some(SyncHandle::detached()));
        };

        let (notes, groups) = tokio::join!(
            self.gateway.fetch_notes(&session),
            self.gateway.fetch_groups(&session)
        );
        let mut unauthorized: Option<GatewayError> = None;
        {
            let mut state = self.state.lock().await;
            match notes {
                Ok(notes) => state.replace_notes(notes),
                Err(error) => {
                    tracing::error!("Failed to fetch notes: {}", error);
                    if error.is_unauthorized() {
                        unauthorized = Some(error);
                    }
                }
            }
            match groups {
                Ok(groups) => state.replace_groups(groups),
                Err(error) => {
                    tracing::error!("Failed to fetch groups: {}", error);
                    if error.is_unauthorized() {
                        unauthorized.get_or_insert(error);
                    }
                }
            }
            state.initialized = true;
        }
        self.notify();

        if let Some(error) = unauthorized {
            self.expire_session().await;
            return Err(error.into());
        }

        if !self.options.live {
            tracing::debug!("Change feeds disabled; loaded {}", session.user_id());
            return Ok(Some(SyncHandle::detached()));
        }

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut subscriptions = Vec::with_capacity(2);
        for collection in [Collection::Notes, Collection::Groups] {
            match self
                .gateway
                .subscribe(&session, collection, events_tx.clone())
                .await
            {
                Ok(subscription) => subscriptions.push(subscription),
                Err(error) => {
                    tracing::error!("Failed to subscribe to {} changes: {}", collection, error);
                }
            }
        }
        drop(events_tx);

        let store = self.clone();
        let consumer = tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                store.reconcile(event).await;
            }
        });

        tracing::info!(
            "Store initialized for {} with {} change feeds",
            session.user_id(),
            subscriptions.len()
        );
        Ok(Some(SyncHandle {
            subscriptions,
            consumer: Some(consumer),
        }))
    }

    /// Fold one change notification into local state if it belongs to the
    /// current identity.
    pub(crate) async fn reconcile(&self, event: ChangeEvent) {
        let Some(session) = self.state.lock().await.session.session().cloned() else {
            return;
        };
        let user = match self.gateway.resolve_user(&session).await {
            Ok(user) => user,
            Err(error) => {
                self.handle_gateway_error("resolve identity", &error).await;
                return;
            }
        };
        if !event.is_owned_by(&user.id) {
            tracing::debug!("Ignoring {} change owned by {:?}", event.collection, event.owner());
            return;
        }

        let applied = match self.options.reconcile {
            ReconcileMode::Refetch => false,
            ReconcileMode::Incremental => self.apply_change(&event).await,
        };
        if !applied {
            self.refetch(event.collection, &session).await;
        }
    }

    /// Apply a change payload by id. Returns false when the payload does not
    /// carry enough to do so.
    async fn apply_change(&self, event: &ChangeEvent) -> bool {
        let mut state = self.state.lock().await;
        let applied = match (event.collection, event.kind) {
            (Collection::Notes, ChangeKind::Delete) => event
                .row_id()
                .and_then(|id| id.parse::<NoteId>().ok())
                .map(|id| state.remove_note(id))
                .is_some(),
            (Collection::Notes, ChangeKind::Insert | ChangeKind::Update) => event
                .record
                .clone()
                .and_then(|record| serde_json::from_value::<NoteRow>(record).ok())
                .map(|row| state.merge_remote_note(row.into_note()))
                .is_some(),
            (Collection::Groups, ChangeKind::Delete) => event
                .row_id()
                .and_then(|id| id.parse::<GroupId>().ok())
                .map(|id| state.remove_group(id))
                .is_some(),
            (Collection::Groups, ChangeKind::Insert | ChangeKind::Update) => event
                .record
                .clone()
                .and_then(|record| serde_json::from_value::<GroupRow>(record).ok())
                .map(|row| state.merge_remote_group(row.into_group()))
                .is_some(),
        };
        drop(state);
        if applied {
            self.notify();
        }
        applied
    }

    async fn refetch(&self, collection: Collection, session: &AuthSession) {
        match collection {
            Collection::Notes => match self.gateway.fetch_notes(session).await {
                Ok(notes) => {
                    self.state.lock().await.replace_notes(notes);
                    self.notify();
                }
                Err(error) => self.handle_gateway_error("refetch notes", &error).await,
            },
            Collection::Groups => match self.gateway.fetch_groups(session).await {
                Ok(groups) => {
                    self.state.lock().await.replace_groups(groups);
                    self.notify();
                }
                Err(error) => self.handle_gateway_error("refetch groups", &error).await,
            },
        }
    }
}
