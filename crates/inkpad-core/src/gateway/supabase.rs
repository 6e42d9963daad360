//! Supabase implementation of the remote gateway.
//!
//! Tables are reached through PostgREST, images through Storage and change
//! feeds through the Realtime websocket.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tokio::sync::mpsc;

use super::realtime;
use super::rows::{GroupRow, NoteRow};
use super::{
    ChangeEvent, Collection, GatewayError, GatewayResult, RemoteGateway, Subscription, UploadFile,
};
use crate::auth::{describe_api_error, AuthSession, AuthUser, SupabaseUser};
use crate::config::BackendConfig;
use crate::models::{Group, GroupId, Note, NoteId};

const UPSERT_PREFERENCE: &str = "resolution=merge-duplicates,return=minimal";

#[derive(Clone)]
pub struct SupabaseGateway {
    config: BackendConfig,
    client: Client,
}

impl SupabaseGateway {
    pub fn new(config: BackendConfig) -> GatewayResult<Self> {
        Ok(Self {
            config,
            client: Client::builder().build()?,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn authorized(&self, request: RequestBuilder, session: &AuthSession) -> RequestBuilder {
        request
            .header("apikey", &self.config.supabase_anon_key)
            .bearer_auth(&session.access_token)
    }

    async fn send(&self, request: RequestBuilder) -> GatewayResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = describe_api_error(status, &body);
        if status == StatusCode::UNAUTHORIZED || jwt_expired(&body) {
            return Err(GatewayError::Unauthorized(message));
        }
        Err(GatewayError::Api(message))
    }

    fn owner_filter(session: &AuthSession) -> (&'static str, String) {
        ("user_id", format!("eq.{}", session.user_id()))
    }
}

/// PostgREST reports expired JWTs with a 401 and code PGRST301, but some
/// proxies rewrite the status.
fn jwt_expired(body: &str) -> bool {
    body.contains("PGRST301") || body.contains("JWT expired")
}

#[async_trait]
impl RemoteGateway for SupabaseGateway {
    async fn resolve_user(&self, session: &AuthSession) -> GatewayResult<AuthUser> {
        let request = self.authorized(
            self.client.get(format!("{}/user", self.config.auth_url())),
            session,
        );
        let user: SupabaseUser = self.send(request).await?.json().await?;
        Ok(user.into())
    }

    async fn fetch_notes(&self, session: &AuthSession) -> GatewayResult<Vec<Note>> {
        let request = self.authorized(
            self.client
                .get(self.config.rest_url(&self.config.notes_table))
                .query(&[("select", "*".to_string()), Self::owner_filter(session)]),
            session,
        );
        let rows: Vec<NoteRow> = self.send(request).await?.json().await?;
        tracing::debug!("Fetched {} notes", rows.len());
        Ok(rows.into_iter().map(NoteRow::into_note).collect())
    }

    async fn upsert_notes(&self, session: &AuthSession, notes: &[Note]) -> GatewayResult<()> {
        if notes.is_empty() {
            return Ok(());
        }
        let rows: Vec<NoteRow> = notes
            .iter()
            .map(|note| NoteRow::from_note(note, session.user_id()))
            .collect();
        let request = self.authorized(
            self.client
                .post(self.config.rest_url(&self.config.notes_table))
                .header("Prefer", UPSERT_PREFERENCE)
                .json(&rows),
            session,
        );
        self.send(request).await?;
        tracing::debug!("Upserted {} notes", rows.len());
        Ok(())
    }

    async fn delete_note(&self, session: &AuthSession, id: NoteId) -> GatewayResult<()> {
        let request = self.authorized(
            self.client
                .delete(self.config.rest_url(&self.config.notes_table))
                .query(&[("id", format!("eq.{id}")), Self::owner_filter(session)]),
            session,
        );
        self.send(request).await?;
        Ok(())
    }

    async fn fetch_groups(&self, session: &AuthSession) -> GatewayResult<Vec<Group>> {
        let request = self.authorized(
            self.client
                .get(self.config.rest_url(&self.config.groups_table))
                .query(&[("select", "*".to_string()), Self::owner_filter(session)]),
            session,
        );
        let rows: Vec<GroupRow> = self.send(request).await?.json().await?;
        tracing::debug!("Fetched {} groups", rows.len());
        Ok(rows.into_iter().map(GroupRow::into_group).collect())
    }

    async fn upsert_groups(&self, session: &AuthSession, groups: &[Group]) -> GatewayResult<()> {
        if groups.is_empty() {
            return Ok(());
        }
        let rows: Vec<GroupRow> = groups
            .iter()
            .map(|group| GroupRow::from_group(group, session.user_id()))
            .collect();
        let request = self.authorized(
            self.client
                .post(self.config.rest_url(&self.config.groups_table))
                .header("Prefer", UPSERT_PREFERENCE)
                .json(&rows),
            session,
        );
        self.send(request).await?;
        Ok(())
    }

    async fn delete_group_and_detach(
        &self,
        session: &AuthSession,
        id: GroupId,
    ) -> GatewayResult<()> {
        let detach = self.authorized(
            self.client
                .patch(self.config.rest_url(&self.config.notes_table))
                .query(&[("group_id", format!("eq.{id}")), Self::owner_filter(session)])
                .json(&serde_json::json!({ "group_id": null })),
            session,
        );
        self.send(detach).await?;

        let delete = self.authorized(
            self.client
                .delete(self.config.rest_url(&self.config.groups_table))
                .query(&[("id", format!("eq.{id}")), Self::owner_filter(session)]),
            session,
        );
        self.send(delete).await?;
        Ok(())
    }

    async fn upload_file(&self, session: &AuthSession, file: &UploadFile) -> GatewayResult<String> {
        if file.bytes.is_empty() {
            return Err(GatewayError::InvalidFile(format!(
                "{} is empty",
                file.file_name
            )));
        }

        let key = file.object_key(session.user_id());
        let request = self.authorized(
            self.client
                .post(self.config.storage_object_url(&key))
                .header(
                    "cache-control",
                    format!("max-age={}", self.config.cache_control_seconds),
                )
                .header("x-upsert", "false")
                .header("content-type", file.content_type())
                .body(file.bytes.clone()),
            session,
        );
        self.send(request).await?;
        tracing::info!("Uploaded {} ({} bytes)", key, file.bytes.len());
        Ok(self.config.public_object_url(&key))
    }

    async fn subscribe(
        &self,
        session: &AuthSession,
        collection: Collection,
        events: mpsc::UnboundedSender<ChangeEvent>,
    ) -> GatewayResult<Subscription> {
        let table = match collection {
            Collection::Notes => self.config.notes_table.clone(),
            Collection::Groups => self.config.groups_table.clone(),
        };
        realtime::subscribe(
            &self.config.realtime_url(),
            session.access_token.clone(),
            collection,
            table,
            events,
        )
    }
}
