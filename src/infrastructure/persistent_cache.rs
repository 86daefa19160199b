use crate::infrastructure::error::InfraError;
use crate::infrastructure::key_value_store::KeyValueStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Typed JSON slots on top of a [`KeyValueStore`].
///
/// `load` is total: a missing, unreadable or undecodable slot yields the
/// caller's default. There is no expiry and no schema versioning; a change to
/// the stored type simply makes old payloads fall back to the default.
pub struct PersistentCache<S>
where
    S: KeyValueStore,
{
    store: Arc<S>,
}

impl<S> Clone for PersistentCache<S>
where
    S: KeyValueStore,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> PersistentCache<S>
where
    S: KeyValueStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn load<T>(&self, key: &str, default: T) -> T
    where
        T: DeserializeOwned,
    {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return default,
            Err(error) => {
                tracing::warn!(key, %error, "failed to read cached value; using default");
                return default;
            }
        };

        match serde_json::from_str::<T>(&raw) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(key, %error, "discarding undecodable cached value");
                default
            }
        }
    }

    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), InfraError>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_string(value)?;
        self.store.set(key, &payload)
    }

    pub fn remove(&self, key: &str) -> Result<(), InfraError> {
        self.store.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        matches!(self.store.get(key), Ok(Some(_)))
    }
}
