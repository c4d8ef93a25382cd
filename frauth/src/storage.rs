//! Persistence of the current SSO token and OAuth2 token set.
//!
//! Both live in the app's [`KeyValueStore`] as versioned JSON envelopes, under `session_token`
//! and `access_token`.

use std::sync::Arc;

use frauth_types::storage::{KeyValueStore, StorageError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{AccessToken, Token};

const SCHEMA_VERSION: u32 = 1;
const SESSION_TOKEN_KEY: &str = "session_token";
const ACCESS_TOKEN_KEY: &str = "access_token";

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    data: T,
}

/// Typed access to the tokens in a [`KeyValueStore`].
#[derive(Clone)]
pub struct TokenStore {
    kv: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    /// Persist into `kv`.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    fn write<T: Serialize>(&self, key: &str, data: &T) -> Result<(), StorageError> {
        let envelope = Envelope {
            version: SCHEMA_VERSION,
            data,
        };
        let json = serde_json::to_string(&envelope).map_err(|e| StorageError(e.to_string()))?;
        self.kv.set(key, json)
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(json) = self.kv.get(key)? else {
            return Ok(None);
        };
        let envelope: Envelope<T> =
            serde_json::from_str(&json).map_err(|e| StorageError(format!("{key}: {e}")))?;
        if envelope.version != SCHEMA_VERSION {
            return Err(StorageError(format!(
                "{key}: unsupported record version {}",
                envelope.version
            )));
        }
        Ok(Some(envelope.data))
    }

    #[allow(missing_docs)]
    pub fn session_token(&self) -> Result<Option<Token>, StorageError> {
        self.read(SESSION_TOKEN_KEY)
    }

    #[allow(missing_docs)]
    pub fn set_session_token(&self, token: &Token) -> Result<(), StorageError> {
        self.write(SESSION_TOKEN_KEY, token)
    }

    #[allow(missing_docs)]
    pub fn clear_session_token(&self) -> Result<(), StorageError> {
        self.kv.delete(SESSION_TOKEN_KEY)
    }

    #[allow(missing_docs)]
    pub fn access_token(&self) -> Result<Option<AccessToken>, StorageError> {
        self.read(ACCESS_TOKEN_KEY)
    }

    #[allow(missing_docs)]
    pub fn set_access_token(&self, token: &AccessToken) -> Result<(), StorageError> {
        self.write(ACCESS_TOKEN_KEY, token)
    }

    #[allow(missing_docs)]
    pub fn clear_access_token(&self) -> Result<(), StorageError> {
        self.kv.delete(ACCESS_TOKEN_KEY)
    }
}
