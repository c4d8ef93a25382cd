//! Opaque key-value persistence.
//!
//! The SDK never assumes anything about where its records live. Sessions, tokens, push
//! mechanisms and notifications are all serialized to strings and handed to a [`KeyValueStore`].

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// A failure reported by the backing store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("storage failure: {0}")]
pub struct StorageError(pub String);

/// Use this on a type that can persist string values under string keys.
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Remove the value under `key`. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// All entries whose key starts with `prefix`.
    fn get_all(&self, prefix: &str) -> Result<Vec<(String, String)>, StorageError>;
}

/// In-memory store.
///
/// Useful for tests and for apps that don't need anything to outlive the process.
#[derive(Debug, Default)]
pub struct MemoryStore(Mutex<HashMap<String, String>>);

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.0
            .lock()
            .map_err(|_| StorageError("memory store lock poisoned".into()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries()?.insert(key.to_owned(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries()?.remove(key);
        Ok(())
    }

    fn get_all(&self, prefix: &str) -> Result<Vec<(String, String)>, StorageError> {
        let mut all: Vec<_> = self
            .entries()?
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        all.sort();
        Ok(all)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        (**self).delete(key)
    }

    fn get_all(&self, prefix: &str) -> Result<Vec<(String, String)>, StorageError> {
        (**self).get_all(prefix)
    }
}
