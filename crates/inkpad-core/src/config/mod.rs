//! Backend configuration.
//!
//! Describes where the hosted backend lives and how its tables and storage
//! bucket are named. Only public values belong here: the anon key is safe to
//! ship, user credentials are never stored in this struct.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_NOTES_TABLE: &str = "notes";
pub const DEFAULT_GROUPS_TABLE: &str = "groups";
pub const DEFAULT_IMAGE_BUCKET: &str = "notes-images";
pub const DEFAULT_CACHE_CONTROL_SECONDS: u32 = 3600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration field '{0}' is required")]
    Missing(&'static str),
    #[error("configuration field '{0}' must include http:// or https://")]
    InvalidUrl(&'static str),
    #[error("failed to read configuration at {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Where and how to reach the hosted backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    #[serde(default = "default_notes_table")]
    pub notes_table: String,
    #[serde(default = "default_groups_table")]
    pub groups_table: String,
    #[serde(default = "default_image_bucket")]
    pub image_bucket: String,
    #[serde(default = "default_cache_control_seconds")]
    pub cache_control_seconds: u32,
}

impl BackendConfig {
    /// Build a validated config with default table and bucket names.
    pub fn new(
        supabase_url: impl Into<String>,
        supabase_anon_key: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Self {
            supabase_url: supabase_url.into(),
            supabase_anon_key: supabase_anon_key.into(),
            notes_table: default_notes_table(),
            groups_table: default_groups_table(),
            image_bucket: default_image_bucket(),
            cache_control_seconds: DEFAULT_CACHE_CONTROL_SECONDS,
        }
        .validated()
    }

    /// Read `SUPABASE_URL`, `SUPABASE_ANON_KEY` and `INKPAD_IMAGE_BUCKET`.
    ///
    /// Returns `Ok(None)` when neither URL nor key is set.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_values(
            std::env::var("SUPABASE_URL").ok(),
            std::env::var("SUPABASE_ANON_KEY").ok(),
            std::env::var("INKPAD_IMAGE_BUCKET").ok(),
        )
    }

    /// Build from optional raw values; both-absent means "not configured".
    pub fn from_values(
        supabase_url: Option<String>,
        supabase_anon_key: Option<String>,
        image_bucket: Option<String>,
    ) -> Result<Option<Self>, ConfigError> {
        match (
            normalize_text_option(supabase_url),
            normalize_text_option(supabase_anon_key),
        ) {
            (None, None) => Ok(None),
            (Some(url), Some(key)) => {
                let mut config = Self::new(url, key)?;
                if let Some(bucket) = normalize_text_option(image_bucket) {
                    config.image_bucket = bucket;
                }
                Ok(Some(config))
            }
            (None, Some(_)) => Err(ConfigError::Missing("supabase_url")),
            (Some(_), None) => Err(ConfigError::Missing("supabase_anon_key")),
        }
    }

    /// Load a JSON config file.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw)
    }

    /// Parse and validate a JSON payload.
    pub fn parse(payload: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(payload)?;
        config.validated()
    }

    /// Base URL with no trailing slash, e.g. `https://project.supabase.co`
    pub fn base_url(&self) -> &str {
        &self.supabase_url
    }

    pub fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.supabase_url)
    }

    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.supabase_url)
    }

    pub fn storage_object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{path}",
            self.supabase_url, self.image_bucket
        )
    }

    pub fn public_object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{path}",
            self.supabase_url, self.image_bucket
        )
    }

    /// Realtime websocket endpoint (`ws`/`wss` mirrors `http`/`https`).
    pub fn realtime_url(&self) -> String {
        let ws_base = self
            .supabase_url
            .strip_prefix("https://")
            .map(|rest| format!("wss://{rest}"))
            .or_else(|| {
                self.supabase_url
                    .strip_prefix("http://")
                    .map(|rest| format!("ws://{rest}"))
            })
            .unwrap_or_else(|| self.supabase_url.clone());
        format!(
            "{ws_base}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
            urlencoding::encode(&self.supabase_anon_key)
        )
    }

    fn validated(mut self) -> Result<Self, ConfigError> {
        let url = normalize_text_option(Some(self.supabase_url))
            .ok_or(ConfigError::Missing("supabase_url"))?;
        if !is_http_url(&url) {
            return Err(ConfigError::InvalidUrl("supabase_url"));
        }
        self.supabase_url = url.trim_end_matches('/').to_string();
        self.supabase_anon_key = normalize_text_option(Some(self.supabase_anon_key))
            .ok_or(ConfigError::Missing("supabase_anon_key"))?;
        self.notes_table = normalize_text_option(Some(self.notes_table))
            .ok_or(ConfigError::Missing("notes_table"))?;
        self.groups_table = normalize_text_option(Some(self.groups_table))
            .ok_or(ConfigError::Missing("groups_table"))?;
        self.image_bucket = normalize_text_option(Some(self.image_bucket))
            .ok_or(ConfigError::Missing("image_bucket"))?;
        Ok(self)
    }
}

fn default_notes_table() -> String {
    DEFAULT_NOTES_TABLE.to_string()
}

fn default_groups_table() -> String {
    DEFAULT_GROUPS_TABLE.to_string()
}

fn default_image_bucket() -> String {
    DEFAULT_IMAGE_BUCKET.to_string()
}

const fn default_cache_control_seconds() -> u32 {
    DEFAULT_CACHE_CONTROL_SECONDS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_trailing_slash() {
        let config = BackendConfig::new(" https://project.supabase.co/ ", "anon").unwrap();
        assert_eq!(config.base_url(), "https://project.supabase.co");
        assert_eq!(
            config.rest_url("notes"),
            "https://project.supabase.co/rest/v1/notes"
        );
    }

    #[test]
    fn rejects_non_http_url() {
        assert!(matches!(
            BackendConfig::new("project.supabase.co", "anon"),
            Err(ConfigError::InvalidUrl("supabase_url"))
        ));
    }

    #[test]
    fn from_values_requires_both_or_neither() {
        assert!(BackendConfig::from_values(None, None, None)
            .unwrap()
            .is_none());
        assert!(BackendConfig::from_values(Some("https://x.supabase.co".into()), None, None)
            .is_err());
    }

    #[test]
    fn parse_applies_defaults_and_rejects_unknown_fields() {
        let config = BackendConfig::parse(
            r#"{"supabase_url":"https://x.supabase.co","supabase_anon_key":"anon"}"#,
        )
        .unwrap();
        assert_eq!(config.image_bucket, "notes-images");
        assert_eq!(config.cache_control_seconds, 3600);

        let error = BackendConfig::parse(
            r#"{"supabase_url":"https://x.supabase.co","supabase_anon_key":"anon","extra":1}"#,
        )
        .unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn realtime_url_switches_scheme() {
        let config = BackendConfig::new("https://x.supabase.co", "anon").unwrap();
        assert_eq!(
            config.realtime_url(),
            "wss://x.supabase.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
    }

    #[test]
    fn public_object_url_uses_bucket() {
        let config = BackendConfig::new("https://x.supabase.co", "anon").unwrap();
        assert_eq!(
            config.public_object_url("user/file.png"),
            "https://x.supabase.co/storage/v1/object/public/notes-images/user/file.png"
        );
    }
}
