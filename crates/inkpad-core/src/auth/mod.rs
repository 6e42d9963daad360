//! Session manager and Supabase auth client.
//!
//! The session has exactly two states, signed out and signed in. Everything
//! persisted by the backend is scoped to the signed-in user's id.

mod session_store;

use std::fmt;
use std::sync::Arc;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use crate::util::{is_http_url, unix_timestamp_now};

pub use session_store::MemorySessionStore;

const EXPIRY_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Sign-in state exposed to the rest of the application
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    SignedOut,
    SignedIn(AuthSession),
}

impl SessionState {
    #[must_use]
    pub const fn session(&self) -> Option<&AuthSession> {
        match self {
            Self::SignedOut => None,
            Self::SignedIn(session) => Some(session),
        }
    }

    #[must_use]
    pub const fn is_signed_in(&self) -> bool {
        matches!(self, Self::SignedIn(_))
    }

    #[must_use]
    pub fn user(&self) -> Option<&AuthUser> {
        self.session().map(|session| &session.user)
    }
}

impl From<Option<AuthSession>> for SessionState {
    fn from(value: Option<AuthSession>) -> Self {
        value.map_or(Self::SignedOut, Self::SignedIn)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(AuthSession),
    ConfirmationRequired,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Where the signed-in session survives between runs.
pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

/// Email/password client for the Supabase auth endpoints.
#[derive(Clone)]
pub struct SupabaseAuthClient<S: SessionPersistence> {
    auth_url: String,
    anon_key: String,
    client: Client,
    store: S,
}

impl<S: SessionPersistence> SupabaseAuthClient<S> {
    pub fn new(url: impl AsRef<str>, anon_key: impl Into<String>, store: S) -> AuthResult<Self> {
        let auth_url = normalize_auth_url(url.as_ref())?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(AuthError::InvalidConfiguration("anon key is empty"));
        }
        Ok(Self {
            auth_url,
            anon_key,
            client: Client::builder().build()?,
            store,
        })
    }

    /// Load the persisted session, refreshing it once if it has expired.
    /// A refresh failure forgets the stored session.
    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored) = self.store.load_session()? else {
            return Ok(None);
        };
        if !stored.is_expired() {
            return Ok(Some(stored));
        }

        match self.refresh_session(&stored.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) => {
                tracing::warn!("Stored session for {} is stale: {}", stored.user_id(), error);
                self.store.clear_session()?;
                Ok(None)
            }
        }
    }

    /// Create an account. Projects with email confirmation enabled answer
    /// without a session.
    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome> {
        let credentials = Credentials::new(email, password)?;
        let request = self
            .client
            .post(format!("{}/signup", self.auth_url))
            .json(&credentials);
        let outcome = match self.call(request).await?.into_session()? {
            Some(session) => {
                self.store.save_session(&session)?;
                SignUpOutcome::SignedIn(session)
            }
            None => SignUpOutcome::ConfirmationRequired,
        };
        Ok(outcome)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        let credentials = Credentials::new(email, password)?;
        self.grant("password", &credentials).await
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        let refresh_token = refresh_token.trim();
        if refresh_token.is_empty() {
            return Err(AuthError::InvalidConfiguration("refresh token is empty"));
        }
        self.grant(
            "refresh_token",
            &serde_json::json!({ "refresh_token": refresh_token }),
        )
        .await
    }

    /// Revoke the access token and forget the stored session. A token the
    /// backend already rejects counts as signed out.
    pub async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let response = self
            .client
            .post(format!("{}/logout", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() && status != StatusCode::UNAUTHORIZED {
            return Err(AuthError::Api(describe_api_error(
                status,
                &response.text().await.unwrap_or_default(),
            )));
        }
        self.store.clear_session()
    }

    /// Drop the persisted session without contacting the backend.
    pub fn forget_session(&self) -> AuthResult<()> {
        self.store.clear_session()
    }

    /// `POST /token?grant_type=..` and persist the session it returns.
    async fn grant(
        &self,
        grant_type: &str,
        body: &(impl Serialize + Sync),
    ) -> AuthResult<AuthSession> {
        let request = self
            .client
            .post(format!("{}/token", self.auth_url))
            .query(&[("grant_type", grant_type)])
            .json(body);
        let session = self.call(request).await?.into_session()?.ok_or_else(|| {
            AuthError::Api(format!("{grant_type} grant returned no session"))
        })?;
        self.store.save_session(&session)?;
        Ok(session)
    }

    async fn call(&self, request: RequestBuilder) -> AuthResult<TokenResponse> {
        let response = request
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AuthError::Api(describe_api_error(status, &body)))
    }
}

/// Tracks the signed-in identity and broadcasts changes to it.
///
/// Cloning shares the same underlying state.
#[derive(Clone)]
pub struct SessionManager<S: SessionPersistence> {
    client: SupabaseAuthClient<S>,
    state: Arc<watch::Sender<SessionState>>,
}

impl<S: SessionPersistence> SessionManager<S> {
    pub fn new(client: SupabaseAuthClient<S>) -> Self {
        let (state, _) = watch::channel(SessionState::SignedOut);
        Self {
            client,
            state: Arc::new(state),
        }
    }

    #[must_use]
    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every sign-in and sign-out.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub async fn restore(&self) -> AuthResult<SessionState> {
        let session = self.client.restore_session().await?;
        Ok(self.publish(session.into()))
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<SessionState> {
        let session = self.client.sign_in(email, password).await?;
        Ok(self.publish(SessionState::SignedIn(session)))
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome> {
        let outcome = self.client.sign_up(email, password).await?;
        if let SignUpOutcome::SignedIn(session) = &outcome {
            self.publish(SessionState::SignedIn(session.clone()));
        }
        Ok(outcome)
    }

    /// Refresh the current session if it is about to expire.
    ///
    /// A failed refresh signs the user out.
    pub async fn ensure_fresh(&self) -> AuthResult<SessionState> {
        let Some(session) = self.current().session().cloned() else {
            return Ok(SessionState::SignedOut);
        };
        if !session.is_expired() {
            return Ok(SessionState::SignedIn(session));
        }

        match self.client.refresh_session(&session.refresh_token).await {
            Ok(refreshed) => Ok(self.publish(SessionState::SignedIn(refreshed))),
            Err(error) => {
                tracing::warn!("Session refresh failed, signing out: {}", error);
                self.client.forget_session()?;
                Ok(self.publish(SessionState::SignedOut))
            }
        }
    }

    pub async fn sign_out(&self) -> AuthResult<()> {
        match self.current().session() {
            Some(session) => self.client.sign_out(&session.access_token).await?,
            None => self.client.forget_session()?,
        }
        self.publish(SessionState::SignedOut);
        Ok(())
    }

    fn publish(&self, state: SessionState) -> SessionState {
        self.state.send_replace(state.clone());
        state
    }
}

/// `https://project.supabase.co[/auth/v1][/]` to `https://project.supabase.co/auth/v1`.
pub fn normalize_auth_url(url: &str) -> AuthResult<String> {
    let base = url.trim().trim_end_matches('/');
    if !is_http_url(base) {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL needs an http(s) scheme",
        ));
    }
    let base = base.strip_suffix("/auth/v1").unwrap_or(base);
    Ok(format!("{base}/auth/v1"))
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

impl<'a> Credentials<'a> {
    fn new(email: &'a str, password: &'a str) -> AuthResult<Self> {
        let email = email.trim();
        if email.is_empty() || password.trim().is_empty() {
            return Err(AuthError::Api("email and password are required".to_string()));
        }
        Ok(Self { email, password })
    }
}

/// Session fields as the auth API reports them, either at the top level or
/// nested under `session` (sign-up).
#[derive(Debug, Default, Deserialize)]
struct SessionFields {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<SupabaseUser>,
}

impl SessionFields {
    fn or(self, fallback: Self) -> Self {
        Self {
            access_token: self.access_token.or(fallback.access_token),
            refresh_token: self.refresh_token.or(fallback.refresh_token),
            expires_at: self.expires_at.or(fallback.expires_at),
            expires_in: self.expires_in.or(fallback.expires_in),
            user: self.user.or(fallback.user),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(flatten)]
    fields: SessionFields,
    session: Option<SessionFields>,
}

impl TokenResponse {
    /// `Ok(None)` when the response names a user but carries no tokens,
    /// which is how a pending email confirmation looks.
    fn into_session(self) -> AuthResult<Option<AuthSession>> {
        let fields = self.fields.or(self.session.unwrap_or_default());
        let expires_at = fields.expires_at.or_else(|| {
            fields
                .expires_in
                .map(|seconds| unix_timestamp_now().saturating_add(seconds))
        });

        match (fields.access_token, fields.refresh_token, expires_at, fields.user) {
            (Some(access_token), Some(refresh_token), Some(expires_at), Some(user)) => {
                Ok(Some(AuthSession {
                    access_token,
                    refresh_token,
                    expires_at,
                    user: user.into(),
                }))
            }
            (None, None, None, Some(_)) => Ok(None),
            _ => Err(AuthError::Api("incomplete session in auth response".to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SupabaseUser {
    id: String,
    email: Option<String>,
}

impl From<SupabaseUser> for AuthUser {
    fn from(user: SupabaseUser) -> Self {
        Self {
            id: user.id,
            email: user.email,
        }
    }
}

/// Error bodies differ between auth, PostgREST and storage.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl ApiErrorBody {
    fn into_message(self) -> Option<String> {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
    }
}

/// Human-readable `message (status)` for a failed backend call.
pub(crate) fn describe_api_error(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(ApiErrorBody::into_message)
        .unwrap_or_else(|| body.to_string());
    let detail = detail.trim();
    if detail.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{detail} ({})", status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_at: i64) -> AuthSession {
        AuthSession {
            access_token: "secret-access-token".to_string(),
            refresh_token: "secret-refresh-token".to_string(),
            expires_at,
            user: AuthUser {
                id: "user".to_string(),
                email: None,
            },
        }
    }

    #[test]
    fn normalize_auth_url_appends_auth_path() {
        let normalized = normalize_auth_url("https://demo.supabase.co").unwrap();
        assert_eq!(normalized, "https://demo.supabase.co/auth/v1");
    }

    #[test]
    fn normalize_auth_url_keeps_existing_auth_path() {
        let normalized = normalize_auth_url("https://demo.supabase.co/auth/v1/").unwrap();
        assert_eq!(normalized, "https://demo.supabase.co/auth/v1");
    }

    #[test]
    fn normalize_auth_url_rejects_missing_scheme() {
        assert!(normalize_auth_url("demo.supabase.co").is_err());
        assert!(normalize_auth_url("  ").is_err());
    }

    #[test]
    fn response_without_session_fields_means_confirmation_required() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"user": {"id": "user", "email": "user@example.com"}}"#)
                .unwrap();
        assert!(response.into_session().unwrap().is_none());
    }

    #[test]
    fn nested_sign_up_session_is_read() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"session": {"access_token": "a", "refresh_token": "r", "expires_in": 3600,
                "user": {"id": "user", "email": null}}}"#,
        )
        .unwrap();
        let session = response.into_session().unwrap().unwrap();
        assert_eq!(session.user_id(), "user");
        assert!(!session.is_expired());
    }

    #[test]
    fn partial_session_is_an_error() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token": "a", "user": {"id": "user"}}"#).unwrap();
        assert!(response.into_session().is_err());
    }

    #[test]
    fn api_error_prefers_message_fields() {
        assert_eq!(
            describe_api_error(
                StatusCode::BAD_REQUEST,
                r#"{"error": "invalid_grant", "error_description": "Invalid login credentials"}"#
            ),
            "Invalid login credentials (400)"
        );
        assert_eq!(
            describe_api_error(StatusCode::BAD_GATEWAY, "  "),
            "HTTP 502"
        );
        assert_eq!(
            describe_api_error(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            "boom (500)"
        );
    }

    #[test]
    fn session_debug_redacts_tokens() {
        let rendered = format!("{:?}", session(1_700_000_000));
        assert!(!rendered.contains("secret-access-token"));
        assert!(!rendered.contains("secret-refresh-token"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn session_state_has_two_states() {
        assert!(!SessionState::from(None).is_signed_in());
        let state = SessionState::from(Some(session(i64::MAX)));
        assert!(state.is_signed_in());
        assert_eq!(state.user().map(|user| user.id.as_str()), Some("user"));
    }

    #[test]
    fn expiry_uses_skew() {
        assert!(session(unix_timestamp_now() + 10).is_expired());
        assert!(!session(unix_timestamp_now() + 3_600).is_expired());
    }

    #[tokio::test]
    async fn restore_returns_unexpired_stored_session() {
        let store = MemorySessionStore::default();
        store.save_session(&session(i64::MAX)).unwrap();
        let client =
            SupabaseAuthClient::new("https://demo.supabase.co", "anon", store.clone()).unwrap();
        let manager = SessionManager::new(client);
        let mut updates = manager.subscribe();

        let state = manager.restore().await.unwrap();
        assert!(state.is_signed_in());
        assert!(updates.has_changed().unwrap());
        assert!(updates.borrow_and_update().is_signed_in());
    }

    #[tokio::test]
    async fn sign_out_without_session_clears_store() {
        let store = MemorySessionStore::default();
        let client =
            SupabaseAuthClient::new("https://demo.supabase.co", "anon", store.clone()).unwrap();
        let manager = SessionManager::new(client);
        manager.sign_out().await.unwrap();
        assert_eq!(manager.current(), SessionState::SignedOut);
        assert!(store.load_session().unwrap().is_none());
    }
}
