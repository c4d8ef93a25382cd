//! Typed persistence of accounts, mechanisms, notifications and the device token.
//!
//! Each record is one JSON envelope `{"version":1,"kind":..,"data":{..}}` in the backing
//! [`KeyValueStore`], under `account/<id>`, `mechanism/<uuid>`, `oath/<uuid>`,
//! `notification/<id>` or `device_token`.

use std::sync::Arc;

use frauth_types::storage::{KeyValueStore, StorageError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    oath::OathMechanism,
    push::{PushDeviceToken, PushMechanism, PushNotification},
    Account,
};

const SCHEMA_VERSION: u32 = 1;
const ACCOUNT_PREFIX: &str = "account/";
const MECHANISM_PREFIX: &str = "mechanism/";
const OATH_PREFIX: &str = "oath/";
const NOTIFICATION_PREFIX: &str = "notification/";
const DEVICE_TOKEN_KEY: &str = "device_token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
enum RecordKind {
    Account,
    PushMechanism,
    OathMechanism,
    PushNotification,
    DeviceToken,
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    kind: RecordKind,
    data: T,
}

/// Storage for everything the authenticator persists, on top of any [`KeyValueStore`].
#[derive(Clone)]
pub struct AuthenticatorStore {
    kv: Arc<dyn KeyValueStore>,
}

impl AuthenticatorStore {
    /// Persist into `kv`.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    fn write<T: Serialize>(&self, kind: RecordKind, key: &str, data: &T) -> Result<(), StorageError> {
        let envelope = Envelope {
            version: SCHEMA_VERSION,
            kind,
            data,
        };
        let json = serde_json::to_string(&envelope).map_err(|e| StorageError(e.to_string()))?;
        self.kv.set(key, json)
    }

    fn decode<T: DeserializeOwned>(kind: RecordKind, key: &str, json: &str) -> Result<T, StorageError> {
        let envelope: Envelope<T> =
            serde_json::from_str(json).map_err(|e| StorageError(format!("{key}: {e}")))?;
        if envelope.version != SCHEMA_VERSION {
            return Err(StorageError(format!(
                "{key}: unsupported record version {}",
                envelope.version
            )));
        }
        if envelope.kind != kind {
            return Err(StorageError(format!(
                "{key}: expected {kind} record, found {}",
                envelope.kind
            )));
        }
        Ok(envelope.data)
    }

    fn read<T: DeserializeOwned>(&self, kind: RecordKind, key: &str) -> Result<Option<T>, StorageError> {
        self.kv
            .get(key)?
            .map(|json| Self::decode(kind, key, &json))
            .transpose()
    }

    // Records that fail to decode are skipped so one bad entry doesn't hide the others.
    fn read_all<T: DeserializeOwned>(&self, kind: RecordKind, prefix: &str) -> Result<Vec<T>, StorageError> {
        Ok(self
            .kv
            .get_all(prefix)?
            .into_iter()
            .filter_map(|(key, json)| match Self::decode(kind, &key, &json) {
                Ok(record) => Some(record),
                Err(e) => {
                    log::warn!("Skipping unreadable record: {e}");
                    None
                }
            })
            .collect())
    }

    /// The account with `identifier`, without mechanisms.
    pub fn account(&self, identifier: &str) -> Result<Option<Account>, StorageError> {
        self.read(RecordKind::Account, &format!("{ACCOUNT_PREFIX}{identifier}"))
    }

    /// Every stored account, without mechanisms.
    pub fn accounts(&self) -> Result<Vec<Account>, StorageError> {
        let mut accounts: Vec<Account> = self.read_all(RecordKind::Account, ACCOUNT_PREFIX)?;
        accounts.sort_by_key(|a| a.time_added);
        Ok(accounts)
    }

    #[allow(missing_docs)]
    pub fn set_account(&self, account: &Account) -> Result<(), StorageError> {
        let key = format!("{ACCOUNT_PREFIX}{}", account.identifier());
        self.write(RecordKind::Account, &key, account)
    }

    #[allow(missing_docs)]
    pub fn remove_account(&self, identifier: &str) -> Result<(), StorageError> {
        self.kv.delete(&format!("{ACCOUNT_PREFIX}{identifier}"))
    }

    /// The mechanism with `mechanism_uuid`, without notifications.
    pub fn mechanism(&self, mechanism_uuid: &str) -> Result<Option<PushMechanism>, StorageError> {
        self.read(
            RecordKind::PushMechanism,
            &format!("{MECHANISM_PREFIX}{mechanism_uuid}"),
        )
    }

    /// Every stored mechanism, without notifications.
    pub fn mechanisms(&self) -> Result<Vec<PushMechanism>, StorageError> {
        let mut mechanisms: Vec<PushMechanism> =
            self.read_all(RecordKind::PushMechanism, MECHANISM_PREFIX)?;
        mechanisms.sort_by_key(|m| m.time_added);
        Ok(mechanisms)
    }

    /// The mechanisms belonging to the account with `account_identifier`.
    pub fn mechanisms_for_account(
        &self,
        account_identifier: &str,
    ) -> Result<Vec<PushMechanism>, StorageError> {
        let mut mechanisms = self.mechanisms()?;
        mechanisms.retain(|m| m.account_identifier() == account_identifier);
        Ok(mechanisms)
    }

    #[allow(missing_docs)]
    pub fn set_mechanism(&self, mechanism: &PushMechanism) -> Result<(), StorageError> {
        let key = format!("{MECHANISM_PREFIX}{}", mechanism.mechanism_uuid);
        self.write(RecordKind::PushMechanism, &key, mechanism)
    }

    #[allow(missing_docs)]
    pub fn remove_mechanism(&self, mechanism_uuid: &str) -> Result<(), StorageError> {
        self.kv.delete(&format!("{MECHANISM_PREFIX}{mechanism_uuid}"))
    }

    #[allow(missing_docs)]
    pub fn oath_mechanism(&self, mechanism_uuid: &str) -> Result<Option<OathMechanism>, StorageError> {
        self.read(
            RecordKind::OathMechanism,
            &format!("{OATH_PREFIX}{mechanism_uuid}"),
        )
    }

    /// Every stored HOTP and TOTP mechanism, oldest first.
    pub fn oath_mechanisms(&self) -> Result<Vec<OathMechanism>, StorageError> {
        let mut mechanisms: Vec<OathMechanism> =
            self.read_all(RecordKind::OathMechanism, OATH_PREFIX)?;
        mechanisms.sort_by_key(|m| m.time_added);
        Ok(mechanisms)
    }

    /// The HOTP and TOTP mechanisms belonging to the account with `account_identifier`.
    pub fn oath_mechanisms_for_account(
        &self,
        account_identifier: &str,
    ) -> Result<Vec<OathMechanism>, StorageError> {
        let mut mechanisms = self.oath_mechanisms()?;
        mechanisms.retain(|m| m.account_identifier() == account_identifier);
        Ok(mechanisms)
    }

    #[allow(missing_docs)]
    pub fn set_oath_mechanism(&self, mechanism: &OathMechanism) -> Result<(), StorageError> {
        let key = format!("{OATH_PREFIX}{}", mechanism.mechanism_uuid);
        self.write(RecordKind::OathMechanism, &key, mechanism)
    }

    #[allow(missing_docs)]
    pub fn remove_oath_mechanism(&self, mechanism_uuid: &str) -> Result<(), StorageError> {
        self.kv.delete(&format!("{OATH_PREFIX}{mechanism_uuid}"))
    }

    #[allow(missing_docs)]
    pub fn notification(&self, identifier: &str) -> Result<Option<PushNotification>, StorageError> {
        self.read(
            RecordKind::PushNotification,
            &format!("{NOTIFICATION_PREFIX}{identifier}"),
        )
    }

    /// Every stored notification, oldest first.
    pub fn notifications(&self) -> Result<Vec<PushNotification>, StorageError> {
        let mut notifications: Vec<PushNotification> =
            self.read_all(RecordKind::PushNotification, NOTIFICATION_PREFIX)?;
        notifications.sort_by_key(|n| n.time_added);
        Ok(notifications)
    }

    /// The notifications sent for the mechanism with `mechanism_uuid`, oldest first.
    pub fn notifications_for_mechanism(
        &self,
        mechanism_uuid: &str,
    ) -> Result<Vec<PushNotification>, StorageError> {
        let mut notifications = self.notifications()?;
        notifications.retain(|n| n.mechanism_uuid == mechanism_uuid);
        Ok(notifications)
    }

    #[allow(missing_docs)]
    pub fn set_notification(&self, notification: &PushNotification) -> Result<(), StorageError> {
        let key = format!("{NOTIFICATION_PREFIX}{}", notification.identifier());
        self.write(RecordKind::PushNotification, &key, notification)
    }

    #[allow(missing_docs)]
    pub fn remove_notification(&self, identifier: &str) -> Result<(), StorageError> {
        self.kv.delete(&format!("{NOTIFICATION_PREFIX}{identifier}"))
    }

    /// The device token last accepted by every mechanism.
    pub fn device_token(&self) -> Result<Option<PushDeviceToken>, StorageError> {
        self.read(RecordKind::DeviceToken, DEVICE_TOKEN_KEY)
    }

    #[allow(missing_docs)]
    pub fn set_device_token(&self, token: &PushDeviceToken) -> Result<(), StorageError> {
        self.write(RecordKind::DeviceToken, DEVICE_TOKEN_KEY, token)
    }

    #[allow(missing_docs)]
    pub fn clear_device_token(&self) -> Result<(), StorageError> {
        self.kv.delete(DEVICE_TOKEN_KEY)
    }
}
