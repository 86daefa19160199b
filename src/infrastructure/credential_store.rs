use crate::domain::models::OAuthToken;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::key_value_store::KeyValueStore;
use std::sync::{Arc, Mutex};

pub const AUTH_TOKEN_KEY: &str = "auth_token";

pub trait CredentialStore: Send + Sync {
    fn save_token(&self, token: &OAuthToken) -> Result<(), InfraError>;
    fn load_token(&self) -> Result<Option<OAuthToken>, InfraError>;
    fn delete_token(&self) -> Result<(), InfraError>;

    /// Whether something is stored, readable or not. Decoding problems are
    /// left to whoever needs the token.
    fn has_token(&self) -> bool {
        matches!(self.load_token(), Ok(Some(_)))
    }
}

/// Keeps the token in the workspace key-value store under a fixed slot.
pub struct StorageCredentialStore<S>
where
    S: KeyValueStore,
{
    store: Arc<S>,
    key: String,
}

impl<S> StorageCredentialStore<S>
where
    S: KeyValueStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_key(store, AUTH_TOKEN_KEY)
    }

    pub fn with_key(store: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }
}

impl<S> CredentialStore for StorageCredentialStore<S>
where
    S: KeyValueStore,
{
    fn save_token(&self, token: &OAuthToken) -> Result<(), InfraError> {
        let payload =
            serde_json::to_string(token).map_err(|error| InfraError::Credential(error.to_string()))?;
        self.store.set(&self.key, &payload)
    }

    fn load_token(&self) -> Result<Option<OAuthToken>, InfraError> {
        let Some(payload) = self.store.get(&self.key)? else {
            return Ok(None);
        };
        let token = serde_json::from_str::<OAuthToken>(&payload)
            .map_err(|error| InfraError::Credential(error.to_string()))?;
        Ok(Some(token))
    }

    fn delete_token(&self) -> Result<(), InfraError> {
        self.store.remove(&self.key)
    }

    fn has_token(&self) -> bool {
        self.store.get(&self.key).is_ok_and(|payload| payload.is_some())
    }
}

#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service_name: String,
    account_name: String,
}

impl KeyringCredentialStore {
    pub fn new(service_name: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            account_name: account_name.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, InfraError> {
        keyring::Entry::new(&self.service_name, &self.account_name)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new("nowcal.oauth.google", "default")
    }
}

impl KeyringCredentialStore {
    fn read_payload(&self) -> Result<Option<String>, InfraError> {
        match self.entry()?.get_password() {
            Ok(payload) => Ok(Some(payload)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }
}

impl CredentialStore for KeyringCredentialStore {
    /// Reads the secret back through a fresh entry: a keyring without a
    /// persistent backend accepts the write and then forgets it.
    fn save_token(&self, token: &OAuthToken) -> Result<(), InfraError> {
        let payload =
            serde_json::to_string(token).map_err(|error| InfraError::Credential(error.to_string()))?;
        self.entry()?
            .set_password(&payload)
            .map_err(|error| InfraError::Credential(error.to_string()))?;

        if self.read_payload()?.as_deref() != Some(payload.as_str()) {
            return Err(InfraError::Credential(format!(
                "keyring did not keep the token for {}/{}",
                self.service_name, self.account_name
            )));
        }
        Ok(())
    }

    fn load_token(&self) -> Result<Option<OAuthToken>, InfraError> {
        let Some(payload) = self.read_payload()? else {
            return Ok(None);
        };
        let token = serde_json::from_str::<OAuthToken>(&payload)
            .map_err(|error| InfraError::Credential(error.to_string()))?;
        Ok(Some(token))
    }

    fn delete_token(&self) -> Result<(), InfraError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }

    fn has_token(&self) -> bool {
        self.read_payload().is_ok_and(|payload| payload.is_some())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    token: Mutex<Option<OAuthToken>>,
}

impl CredentialStore for InMemoryCredentialStore {
    fn save_token(&self, token: &OAuthToken) -> Result<(), InfraError> {
        let mut guard = self
            .token
            .lock()
            .map_err(|_| InfraError::Poisoned("credential store"))?;
        *guard = Some(token.clone());
        Ok(())
    }

    fn load_token(&self) -> Result<Option<OAuthToken>, InfraError> {
        let guard = self
            .token
            .lock()
            .map_err(|_| InfraError::Poisoned("credential store"))?;
        Ok(guard.clone())
    }

    fn delete_token(&self) -> Result<(), InfraError> {
        let mut guard = self
            .token
            .lock()
            .map_err(|_| InfraError::Poisoned("credential store"))?;
        *guard = None;
        Ok(())
    }
}

/// Credential backend chosen by `tokenBackend` in `app.json`.
pub enum ConfiguredCredentialStore<S>
where
    S: KeyValueStore,
{
    Storage(StorageCredentialStore<S>),
    Keyring(KeyringCredentialStore),
}

impl<S> CredentialStore for ConfiguredCredentialStore<S>
where
    S: KeyValueStore,
{
    fn save_token(&self, token: &OAuthToken) -> Result<(), InfraError> {
        match self {
            Self::Storage(store) => store.save_token(token),
            Self::Keyring(store) => store.save_token(token),
        }
    }

    fn load_token(&self) -> Result<Option<OAuthToken>, InfraError> {
        match self {
            Self::Storage(store) => store.load_token(),
            Self::Keyring(store) => store.load_token(),
        }
    }

    fn delete_token(&self) -> Result<(), InfraError> {
        match self {
            Self::Storage(store) => store.delete_token(),
            Self::Keyring(store) => store.delete_token(),
        }
    }

    fn has_token(&self) -> bool {
        match self {
            Self::Storage(store) => store.has_token(),
            Self::Keyring(store) => store.has_token(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::key_value_store::InMemoryKeyValueStore;
    use chrono::{Duration, Utc};

    fn sample_token() -> OAuthToken {
        OAuthToken {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: Utc::now() + Duration::seconds(3600),
            token_type: "Bearer".to_string(),
            scope: Some("calendar.readonly".to_string()),
        }
    }

    #[test]
    fn storage_store_uses_auth_token_slot() {
        let kv = Arc::new(InMemoryKeyValueStore::default());
        let store = StorageCredentialStore::new(Arc::clone(&kv));
        assert!(!store.has_token());

        store.save_token(&sample_token()).expect("save token");
        assert!(store.has_token());
        assert!(kv.get(AUTH_TOKEN_KEY).expect("read slot").is_some());
        assert_eq!(
            store.load_token().expect("load").map(|token| token.access_token),
            Some("access".to_string())
        );

        store.delete_token().expect("delete");
        assert!(!store.has_token());
        assert_eq!(kv.get(AUTH_TOKEN_KEY).expect("read slot"), None);
    }

    #[test]
    fn corrupt_token_still_counts_as_signed_in() {
        let kv = Arc::new(InMemoryKeyValueStore::default());
        kv.set(AUTH_TOKEN_KEY, "opaque-legacy-token").expect("seed");
        let store = ConfiguredCredentialStore::Storage(StorageCredentialStore::new(kv));

        assert!(store.has_token());
        assert!(matches!(store.load_token(), Err(InfraError::Credential(_))));
    }

    #[test]
    fn keyring_token_survives_a_fresh_entry() {
        let service = format!("nowcal.tests.{}", std::process::id());
        let store = KeyringCredentialStore::new(service.clone(), "round-trip");
        let token = sample_token();

        // Hosts without a usable keyring refuse the write; that must be loud.
        if let Err(error) = store.save_token(&token) {
            assert!(matches!(error, InfraError::Credential(_)));
            assert!(!store.has_token());
            return;
        }

        let reopened = KeyringCredentialStore::new(service, "round-trip");
        assert!(reopened.has_token());
        assert_eq!(reopened.load_token().expect("load"), Some(token));

        reopened.delete_token().expect("delete");
        assert!(!store.has_token());
        reopened.delete_token().expect("deleting twice is fine");
    }

    #[test]
    fn configured_store_delegates_to_backend() {
        let kv = Arc::new(InMemoryKeyValueStore::default());
        let store = ConfiguredCredentialStore::Storage(StorageCredentialStore::new(kv));
        store.save_token(&sample_token()).expect("save token");
        assert!(store.has_token());
    }
}
