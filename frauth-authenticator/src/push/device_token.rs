use chrono::{DateTime, SubsecRound, Utc};
use frauth_transport::Transport;
use frauth_types::storage::StorageError;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use super::DeviceRegistration;
use crate::{AuthenticatorError, AuthenticatorStore};

/// The push service token of this device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushDeviceToken {
    #[allow(missing_docs)]
    pub token_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[allow(missing_docs)]
    pub time_added: DateTime<Utc>,
}

impl PushDeviceToken {
    /// A token received now.
    pub fn new(token_id: impl Into<String>) -> Self {
        Self {
            token_id: token_id.into(),
            time_added: Utc::now().trunc_subsecs(3),
        }
    }
}

/// Keeps the device token known by AM in sync with the one the push service hands out.
pub struct DeviceTokenManager<'a, T: ?Sized> {
    store: &'a AuthenticatorStore,
    transport: &'a T,
}

impl<'a, T: Transport + ?Sized> DeviceTokenManager<'a, T> {
    #[allow(missing_docs)]
    pub fn new(store: &'a AuthenticatorStore, transport: &'a T) -> Self {
        Self { store, transport }
    }

    /// The stored device token.
    pub fn device_token(&self) -> Result<Option<PushDeviceToken>, StorageError> {
        self.store.device_token()
    }

    /// Whether `token` differs from the stored one.
    pub fn should_update(&self, token: &str) -> Result<bool, StorageError> {
        Ok(self
            .store
            .device_token()?
            .map_or(true, |current| current.token_id != token))
    }

    /// Store `token` locally without telling AM. Gives whether the stored token changed.
    pub fn set_device_token(&self, token: &str) -> Result<bool, StorageError> {
        if !self.should_update(token)? {
            log::info!("APNS device token has not changed.");
            return Ok(false);
        }
        self.store.set_device_token(&PushDeviceToken::new(token))?;
        Ok(true)
    }

    /// Send `device.device_token` to AM for every push mechanism.
    ///
    /// Unchanged tokens are not sent. The requests run concurrently, and the new token is only
    /// stored once every mechanism accepted it.
    pub async fn update_device_token(
        &self,
        device: &DeviceRegistration,
    ) -> Result<(), AuthenticatorError> {
        if !self.should_update(&device.device_token)? {
            log::info!("APNS device token has not changed.");
            return Ok(());
        }

        let mechanisms = self.store.mechanisms()?;
        log::debug!("Updating device token on {} mechanism(s)", mechanisms.len());
        let errors: Vec<AuthenticatorError> = join_all(
            mechanisms
                .iter()
                .map(|mechanism| mechanism.update_device_token(device, self.transport)),
        )
        .await
        .into_iter()
        .filter_map(Result::err)
        .collect();
        if !errors.is_empty() {
            log::error!("Device token update failed on {} mechanism(s)", errors.len());
            return Err(AuthenticatorError::DeviceTokenUpdateFailed(errors));
        }

        self.store
            .set_device_token(&PushDeviceToken::new(device.device_token.as_str()))
            .map_err(|e| AuthenticatorError::FailToSaveIntoStorage(e.to_string()))
    }
}
