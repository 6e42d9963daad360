//! CLI session persistence in the OS keychain.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use inkpad_core::auth::{AuthResult, SessionManager, SessionPersistence, SupabaseAuthClient};
pub use inkpad_core::auth::{AuthError, AuthSession};
use inkpad_core::config::BackendConfig;

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "inkpad-cli";

/// One keychain entry per profile.
#[derive(Clone)]
pub struct KeyringSessionStore {
    username: String,
}

impl KeyringSessionStore {
    pub fn new(profile_name: &str) -> Self {
        Self {
            username: format!("supabase_session:{profile_name}"),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }
}

impl SessionPersistence for KeyringSessionStore {
    #[cfg(not(test))]
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        match self.entry()?.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        let guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard
            .get(&self.username)
            .map(|raw| serde_json::from_str(raw))
            .transpose()
            .map_err(AuthError::from)
    }

    #[cfg(not(test))]
    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        self.entry()?
            .set_password(&raw)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }

    #[cfg(test)]
    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.insert(self.username.clone(), raw);
        Ok(())
    }

    #[cfg(not(test))]
    fn clear_session(&self) -> AuthResult<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear_session(&self) -> AuthResult<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.remove(&self.username);
        Ok(())
    }
}

/// Session manager for a profile, backed by its keychain entry.
pub fn session_manager(
    profile_name: &str,
    backend: &BackendConfig,
) -> AuthResult<SessionManager<KeyringSessionStore>> {
    let client = SupabaseAuthClient::new(
        backend.base_url(),
        backend.supabase_anon_key.clone(),
        KeyringSessionStore::new(profile_name),
    )?;
    Ok(SessionManager::new(client))
}

pub fn load_stored_session(profile_name: &str) -> AuthResult<Option<AuthSession>> {
    KeyringSessionStore::new(profile_name).load_session()
}

pub fn clear_stored_session(profile_name: &str) -> AuthResult<()> {
    KeyringSessionStore::new(profile_name).clear_session()
}

#[cfg(test)]
mod tests {
    use inkpad_core::auth::AuthUser;

    use super::*;

    fn session(user_id: &str) -> AuthSession {
        AuthSession {
            access_token: format!("{user_id}-access"),
            refresh_token: format!("{user_id}-refresh"),
            expires_at: 1_700_000_000,
            user: AuthUser {
                id: user_id.to_string(),
                email: None,
            },
        }
    }

    #[test]
    fn sessions_are_scoped_per_profile() {
        let work = KeyringSessionStore::new("auth-test-work");
        let home = KeyringSessionStore::new("auth-test-home");

        work.save_session(&session("work-user")).unwrap();
        assert_eq!(
            load_stored_session("auth-test-work").unwrap(),
            Some(session("work-user"))
        );
        assert_eq!(home.load_session().unwrap(), None);

        clear_stored_session("auth-test-work").unwrap();
        assert_eq!(work.load_session().unwrap(), None);
    }

    #[test]
    fn clearing_missing_session_is_ok() {
        assert!(clear_stored_session("auth-test-never-saved").is_ok());
    }

    #[tokio::test]
    async fn session_manager_restores_stored_session() {
        let backend = BackendConfig::new("https://demo.supabase.co", "anon").unwrap();
        let mut stored = session("restored-user");
        stored.expires_at = i64::MAX;
        KeyringSessionStore::new("auth-test-restore")
            .save_session(&stored)
            .unwrap();

        let sessions = session_manager("auth-test-restore", &backend).unwrap();
        let state = sessions.restore().await.unwrap();
        assert_eq!(state.user().map(|user| user.id.as_str()), Some("restored-user"));

        clear_stored_session("auth-test-restore").unwrap();
    }
}
