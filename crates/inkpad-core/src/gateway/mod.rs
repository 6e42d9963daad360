//! Remote gateway: the only path from the client to the hosted backend.
//!
//! Implementations translate local entities to and from backend rows and
//! objects. Every call is scoped to the identity carried by the session.

mod memory;
mod realtime;
mod rows;
mod supabase;

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::auth::{AuthSession, AuthUser};
use crate::models::{Group, GroupId, Note, NoteId};

pub use memory::{GatewayOp, MemoryGateway};
pub use rows::{GroupRow, NoteRow};
pub use supabase::SupabaseGateway;

const UNSUBSCRIBE_GRACE: Duration = Duration::from_secs(2);

/// Image extensions accepted for upload
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The backend rejected the session (expired or revoked)
    #[error("Not authorized: {0}")]
    Unauthorized(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Backend API error: {0}")]
    Api(String),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Realtime error: {0}")]
    Realtime(String),
    #[error("Invalid file: {0}")]
    InvalidFile(String),
}

impl GatewayError {
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Entity collection with its own change feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Notes,
    Groups,
}

impl Collection {
    #[must_use]
    pub const fn channel_name(self) -> &'static str {
        match self {
            Self::Notes => "notes_changes",
            Self::Groups => "groups_changes",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Notes => f.write_str("notes"),
            Self::Groups => f.write_str("groups"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row-level change notification from the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub kind: ChangeKind,
    /// Row after the change (absent for deletes)
    pub record: Option<serde_json::Value>,
    /// Row before the change, as much of it as the backend reports
    pub old_record: Option<serde_json::Value>,
}

impl ChangeEvent {
    /// Identity that owns the changed row, from either side of the change.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        fn user_id_of(row: Option<&serde_json::Value>) -> Option<&str> {
            row.and_then(|row| row.get("user_id"))
                .and_then(serde_json::Value::as_str)
        }
        user_id_of(self.record.as_ref()).or_else(|| user_id_of(self.old_record.as_ref()))
    }

    /// Whether this notification belongs to `user_id`.
    #[must_use]
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        [self.record.as_ref(), self.old_record.as_ref()]
            .into_iter()
            .flatten()
            .any(|row| row.get("user_id").and_then(serde_json::Value::as_str) == Some(user_id))
    }

    /// Primary key of the changed row.
    #[must_use]
    pub fn row_id(&self) -> Option<&str> {
        self.record
            .as_ref()
            .or(self.old_record.as_ref())
            .and_then(|row| row.get("id"))
            .and_then(serde_json::Value::as_str)
    }
}

/// A file picked for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |name| name.to_string_lossy().into_owned());
        Ok(Self { file_name, bytes })
    }

    /// Lowercase extension, `bin` when the name has none.
    #[must_use]
    pub fn extension(&self) -> String {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .map_or_else(|| "bin".to_string(), str::to_ascii_lowercase)
    }

    #[must_use]
    pub fn content_type(&self) -> String {
        mime_guess::from_path(&self.file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }

    #[must_use]
    pub fn is_supported_image(&self) -> bool {
        IMAGE_EXTENSIONS.contains(&self.extension().as_str())
    }

    /// Object key under the owner's prefix: `{user_id}/{uuid}.{ext}`
    #[must_use]
    pub fn object_key(&self, user_id: &str) -> String {
        format!("{user_id}/{}.{}", uuid::Uuid::now_v7(), self.extension())
    }
}

/// Live change-feed subscription. Dropping it stops delivery.
pub struct Subscription {
    collection: Collection,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub(crate) const fn new(
        collection: Collection,
        stop: oneshot::Sender<()>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            collection,
            stop: Some(stop),
            task: Some(task),
        }
    }

    #[must_use]
    pub const fn collection(&self) -> Collection {
        self.collection
    }

    /// Ask the feed to leave its channel, aborting it if it does not stop
    /// promptly.
    pub async fn unsubscribe(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(UNSUBSCRIBE_GRACE, &mut task)
                .await
                .is_err()
            {
                task.abort();
            }
        }
        tracing::debug!("Unsubscribed from {} changes", self.collection);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("collection", &self.collection)
            .field("active", &self.task.is_some())
            .finish()
    }
}

/// Backend operations used by the store.
#[async_trait]
pub trait RemoteGateway: Send + Sync + 'static {
    /// Re-resolve the identity behind `session`.
    async fn resolve_user(&self, session: &AuthSession) -> GatewayResult<AuthUser>;

    async fn fetch_notes(&self, session: &AuthSession) -> GatewayResult<Vec<Note>>;

    /// Insert-or-update every note in `notes` for the session's user.
    async fn upsert_notes(&self, session: &AuthSession, notes: &[Note]) -> GatewayResult<()>;

    async fn delete_note(&self, session: &AuthSession, id: NoteId) -> GatewayResult<()>;

    async fn fetch_groups(&self, session: &AuthSession) -> GatewayResult<Vec<Group>>;

    /// Insert-or-update every group in `groups` for the session's user.
    async fn upsert_groups(&self, session: &AuthSession, groups: &[Group]) -> GatewayResult<()>;

    /// Clear the group reference on member notes, then delete the group.
    async fn delete_group_and_detach(
        &self,
        session: &AuthSession,
        id: GroupId,
    ) -> GatewayResult<()>;

    /// Store `file` under the user's prefix and return its public URL.
    async fn upload_file(&self, session: &AuthSession, file: &UploadFile) -> GatewayResult<String>;

    /// Deliver change notifications for `collection` into `events`.
    async fn subscribe(
        &self,
        session: &AuthSession,
        collection: Collection,
        events: mpsc::UnboundedSender<ChangeEvent>,
    ) -> GatewayResult<Subscription>;
}
