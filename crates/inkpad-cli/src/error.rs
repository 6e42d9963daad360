use std::io;

use inkpad_core::auth::AuthError;
use inkpad_core::config::ConfigError;
use inkpad_core::content::UPLOAD_FAILED_MESSAGE;
use inkpad_core::gateway::GatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(inkpad_core::Error),
    #[error(transparent)]
    Gateway(GatewayError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Backend configuration error: {0}")]
    Backend(#[from] ConfigError),
    #[error("Note ID cannot be empty")]
    EmptyNoteId,
    #[error("Edited note content cannot be empty")]
    EmptyEditedContent,
    #[error("Note not found for id/prefix: {0}")]
    NoteNotFound(String),
    #[error("Group not found for id/prefix/name: {0}")]
    GroupNotFound(String),
    #[error("Task not found for id/prefix/index: {0}")]
    TaskNotFound(String),
    #[error("{0}")]
    AmbiguousId(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error(
        "Backend is not configured for profile '{0}'. Run `inkpad config init` or set SUPABASE_URL and SUPABASE_ANON_KEY."
    )]
    NotConfigured(String),
    #[error("Profile '{0}' is not signed in. Run `inkpad auth login` first.")]
    NotSignedIn(String),
    #[error("Session for profile '{0}' expired. Run `inkpad auth login` to sign in again.")]
    SessionExpired(String),
    #[error("Unsupported image file '{0}'. Use jpg, jpeg, png, gif or webp.")]
    UnsupportedImage(String),
    #[error("{}", UPLOAD_FAILED_MESSAGE)]
    UploadFailed,
}

impl CliError {
    /// Whether the backend rejected the session token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Gateway(error) if error.is_unauthorized())
    }
}

impl From<inkpad_core::Error> for CliError {
    fn from(error: inkpad_core::Error) -> Self {
        match error {
            inkpad_core::Error::Gateway(error) => Self::Gateway(error),
            inkpad_core::Error::Auth(error) => Self::Auth(error.to_string()),
            inkpad_core::Error::Config(error) => Self::Backend(error),
            other => Self::Core(other),
        }
    }
}

impl From<GatewayError> for CliError {
    fn from(error: GatewayError) -> Self {
        Self::Gateway(error)
    }
}

impl From<AuthError> for CliError {
    fn from(error: AuthError) -> Self {
        Self::Auth(error.to_string())
    }
}
