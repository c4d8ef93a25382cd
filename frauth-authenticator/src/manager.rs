use std::sync::Arc;

use chrono::Utc;
use frauth_transport::Transport;
use frauth_types::storage::KeyValueStore;
use serde_json::Value;

use crate::{
    oath::{self, OathMechanism, OathRegistrationUri, OathTokenCode},
    push::{
        self, DeviceRegistration, DeviceTokenManager, PushMechanism, PushNotification,
        PushRegistrationUri, DEFAULT_COMMUNICATION_TYPE, DEFAULT_DEVICE_TYPE,
    },
    Account, AccountError, AuthenticatorError, AuthenticatorStore, MechanismError,
    PushNotificationError,
};

/// Entry point of the authenticator: registers mechanisms, answers notifications and manages the
/// accounts they belong to.
pub struct AuthenticatorManager<T> {
    store: AuthenticatorStore,
    transport: T,
    device_type: String,
    communication_type: String,
}

impl<T: Transport> AuthenticatorManager<T> {
    /// A manager persisting into `kv` and talking to AM through `transport`.
    pub fn new(kv: Arc<dyn KeyValueStore>, transport: T) -> Self {
        Self {
            store: AuthenticatorStore::new(kv),
            transport,
            device_type: DEFAULT_DEVICE_TYPE.into(),
            communication_type: DEFAULT_COMMUNICATION_TYPE.into(),
        }
    }

    /// Override the `deviceType` and `communicationType` sent when registering.
    pub fn with_device(
        mut self,
        device_type: impl Into<String>,
        communication_type: impl Into<String>,
    ) -> Self {
        self.device_type = device_type.into();
        self.communication_type = communication_type.into();
        self
    }

    /// The underlying typed storage.
    pub fn store(&self) -> &AuthenticatorStore {
        &self.store
    }

    fn device(&self, device_token: impl Into<String>) -> DeviceRegistration {
        DeviceRegistration {
            device_token: device_token.into(),
            device_type: self.device_type.clone(),
            communication_type: self.communication_type.clone(),
        }
    }

    fn device_tokens(&self) -> DeviceTokenManager<'_, T> {
        DeviceTokenManager::new(&self.store, &self.transport)
    }

    /// Register the push mechanism described by a scanned `pushauth://` URI.
    ///
    /// The mechanism is only stored once AM accepted the registration.
    pub async fn create_mechanism_from_uri(
        &self,
        uri: &str,
    ) -> Result<PushMechanism, AuthenticatorError> {
        let parsed: PushRegistrationUri = uri.parse()?;
        let device_token = self
            .store
            .device_token()?
            .ok_or(PushNotificationError::MissingDeviceToken)?;

        let mechanism = PushMechanism::from(&parsed);
        let account = match self.store.account(&mechanism.account_identifier())? {
            Some(account) => account,
            None => {
                let mut account = Account::new(&parsed.issuer, &parsed.account_name);
                account.image_url = parsed.image_url.clone();
                account.background_color = parsed.background_color.clone();
                account.policies = parsed.policies.clone();
                account
            }
        };
        let identifier = mechanism.identifier();
        if self
            .store
            .mechanisms_for_account(&account.identifier())?
            .iter()
            .any(|existing| existing.identifier() == identifier)
        {
            log::warn!("Mechanism {identifier} already exists");
            return Err(MechanismError::AlreadyExists(identifier).into());
        }

        mechanism
            .register(&self.device(device_token.token_id), &self.transport)
            .await?;

        self.store.set_mechanism(&mechanism).map_err(|e| {
            AuthenticatorError::FailToSaveIntoStorage(format!(
                "Failed to store Mechanism ({identifier}): {e}"
            ))
        })?;
        self.store.set_account(&account).map_err(|e| {
            AuthenticatorError::FailToSaveIntoStorage(format!(
                "Failed to store Account ({}): {e}",
                account.identifier()
            ))
        })?;
        log::debug!("Mechanism {identifier} registered and stored");
        Ok(mechanism)
    }

    fn with_mechanisms(&self, mut account: Account) -> Result<Account, AuthenticatorError> {
        account.mechanisms = self
            .store
            .mechanisms_for_account(&account.identifier())?
            .into_iter()
            .map(|mut mechanism| -> Result<PushMechanism, AuthenticatorError> {
                mechanism.notifications = self
                    .store
                    .notifications_for_mechanism(&mechanism.mechanism_uuid)?;
                Ok(mechanism)
            })
            .collect::<Result<_, _>>()?;
        account.oath_mechanisms = self
            .store
            .oath_mechanisms_for_account(&account.identifier())?;
        Ok(account)
    }

    /// Every account, with its mechanisms and their notifications.
    pub fn get_all_accounts(&self) -> Result<Vec<Account>, AuthenticatorError> {
        self.store
            .accounts()?
            .into_iter()
            .map(|account| self.with_mechanisms(account))
            .collect()
    }

    /// The account with `identifier`, with its mechanisms and their notifications.
    pub fn get_account(&self, identifier: &str) -> Result<Option<Account>, AuthenticatorError> {
        self.store
            .account(identifier)?
            .map(|account| self.with_mechanisms(account))
            .transpose()
    }

    /// Save changes to an existing account.
    pub fn update_account(&self, account: &Account) -> Result<(), AuthenticatorError> {
        if self.store.account(&account.identifier())?.is_none() {
            return Err(AuthenticatorError::FailToSaveIntoStorage(format!(
                "Account ({}) does not exist",
                account.identifier()
            )));
        }
        Ok(self.store.set_account(account)?)
    }

    fn stored_account(&self, identifier: &str) -> Result<Account, AuthenticatorError> {
        self.store.account(identifier)?.ok_or_else(|| {
            AuthenticatorError::FailToSaveIntoStorage(format!("Account ({identifier}) does not exist"))
        })
    }

    /// Lock the account with `identifier` under `policy`.
    pub fn lock_account(&self, identifier: &str, policy: &str) -> Result<Account, AuthenticatorError> {
        let mut account = self.stored_account(identifier)?;
        account.lock(policy)?;
        self.store.set_account(&account)?;
        Ok(account)
    }

    /// Unlock the account with `identifier`.
    pub fn unlock_account(&self, identifier: &str) -> Result<Account, AuthenticatorError> {
        let mut account = self.stored_account(identifier)?;
        account.unlock()?;
        self.store.set_account(&account)?;
        Ok(account)
    }

    /// Remove the account with `identifier` along with its mechanisms and their notifications.
    pub fn remove_account(&self, identifier: &str) -> Result<(), AuthenticatorError> {
        for mechanism in self.store.mechanisms_for_account(identifier)? {
            self.remove_mechanism(&mechanism)?;
        }
        for mechanism in self.store.oath_mechanisms_for_account(identifier)? {
            self.store.remove_oath_mechanism(&mechanism.mechanism_uuid)?;
        }
        self.store.remove_account(identifier)?;
        log::debug!("Account {identifier} removed");
        Ok(())
    }

    /// Remove a mechanism along with its notifications.
    pub fn remove_mechanism(&self, mechanism: &PushMechanism) -> Result<(), AuthenticatorError> {
        for notification in self
            .store
            .notifications_for_mechanism(&mechanism.mechanism_uuid)?
        {
            self.store.remove_notification(&notification.identifier())?;
        }
        self.store.remove_mechanism(&mechanism.mechanism_uuid)?;
        Ok(())
    }

    /// Store the HOTP or TOTP mechanism described by a scanned `otpauth://` URI.
    pub fn create_oath_mechanism_from_uri(
        &self,
        uri: &str,
    ) -> Result<OathMechanism, AuthenticatorError> {
        let parsed: OathRegistrationUri = uri.parse()?;
        let mechanism = OathMechanism::from(&parsed);
        let mut account = Account::new(&parsed.issuer, &parsed.account_name);
        account.image_url = parsed.image_url.clone();
        account.background_color = parsed.background_color.clone();
        self.store_oath_mechanism(account, &mechanism)?;
        Ok(mechanism)
    }

    // `account` is only stored when no account with its identifier exists yet.
    fn store_oath_mechanism(
        &self,
        account: Account,
        mechanism: &OathMechanism,
    ) -> Result<(), AuthenticatorError> {
        let identifier = mechanism.identifier();
        if self
            .store
            .oath_mechanisms_for_account(&account.identifier())?
            .iter()
            .any(|existing| existing.identifier() == identifier)
        {
            log::warn!("Mechanism {identifier} already exists");
            return Err(MechanismError::AlreadyExists(identifier).into());
        }
        self.store.set_oath_mechanism(mechanism).map_err(|e| {
            AuthenticatorError::FailToSaveIntoStorage(format!(
                "Failed to store Mechanism ({identifier}): {e}"
            ))
        })?;
        if self.store.account(&account.identifier())?.is_none() {
            self.store.set_account(&account).map_err(|e| {
                AuthenticatorError::FailToSaveIntoStorage(format!(
                    "Failed to store Account ({}): {e}",
                    account.identifier()
                ))
            })?;
        }
        log::debug!("Mechanism {identifier} stored");
        Ok(())
    }

    /// Store every account and mechanism of an `otpauth-migration://` URI.
    ///
    /// Mechanisms that already exist are skipped. Returns the imported accounts as stored.
    pub fn import_migration_uri(&self, uri: &str) -> Result<Vec<Account>, AuthenticatorError> {
        let mut imported = Vec::new();
        for mut account in oath::migration::decode_to_accounts(uri)? {
            let mechanisms = std::mem::take(&mut account.oath_mechanisms);
            let identifier = account.identifier();
            for mechanism in &mechanisms {
                match self.store_oath_mechanism(account.clone(), mechanism) {
                    Err(AuthenticatorError::Mechanism(MechanismError::AlreadyExists(existing))) => {
                        log::debug!("Skipping {existing} during migration");
                    }
                    other => other?,
                }
            }
            if !imported.iter().any(|a: &Account| a.identifier() == identifier) {
                if let Some(stored) = self.get_account(&identifier)? {
                    imported.push(stored);
                }
            }
        }
        Ok(imported)
    }

    /// The next code of `mechanism`.
    ///
    /// An HOTP counter is persisted before the code is handed out; when that fails the
    /// mechanism is left as it was.
    pub fn generate_code(
        &self,
        mechanism: &mut OathMechanism,
    ) -> Result<OathTokenCode, AuthenticatorError> {
        if let Some(account) = self.store.account(&mechanism.account_identifier())? {
            if account.is_locked() {
                log::error!("Not generating a code for locked account {}", account.identifier());
                return Err(AccountError::AccountLocked(
                    account.lock_policy.unwrap_or_default(),
                )
                .into());
            }
        }

        let previous = mechanism.clone();
        let code = mechanism.generate_code_at(Utc::now())?;
        if code.until.is_none() {
            if let Err(e) = self.store.set_oath_mechanism(mechanism) {
                log::error!("Failed to persist HOTP counter of {}: {e}", mechanism.identifier());
                *mechanism = previous;
                return Err(MechanismError::FailedToUpdateInformation(mechanism.identifier()).into());
            }
        }
        Ok(code)
    }

    /// Remove an HOTP or TOTP mechanism.
    pub fn remove_oath_mechanism(&self, mechanism: &OathMechanism) -> Result<(), AuthenticatorError> {
        Ok(self.store.remove_oath_mechanism(&mechanism.mechanism_uuid)?)
    }

    /// The mechanism a notification was sent for.
    pub fn get_mechanism(
        &self,
        notification: &PushNotification,
    ) -> Result<Option<PushMechanism>, AuthenticatorError> {
        Ok(self.store.mechanism(&notification.mechanism_uuid)?)
    }

    /// Every stored notification.
    pub fn get_all_notifications(&self) -> Result<Vec<PushNotification>, AuthenticatorError> {
        Ok(self.store.notifications()?)
    }

    /// The notifications sent for `mechanism`.
    pub fn get_all_notifications_for_mechanism(
        &self,
        mechanism: &PushMechanism,
    ) -> Result<Vec<PushNotification>, AuthenticatorError> {
        Ok(self
            .store
            .notifications_for_mechanism(&mechanism.mechanism_uuid)?)
    }

    #[allow(missing_docs)]
    pub fn remove_notification(
        &self,
        notification: &PushNotification,
    ) -> Result<(), AuthenticatorError> {
        Ok(self.store.remove_notification(&notification.identifier())?)
    }

    /// Parse and store an incoming remote notification, see [`push::handle_notification`].
    pub fn handle_notification(
        &self,
        user_info: &Value,
    ) -> Result<Option<PushNotification>, AuthenticatorError> {
        push::handle_notification(&self.store, user_info)
    }

    /// Approve a default notification.
    pub async fn accept(&self, notification: &mut PushNotification) -> Result<(), AuthenticatorError> {
        notification.accept(&self.store, &self.transport).await
    }

    /// Approve a numbers challenge notification with the number the user picked.
    pub async fn accept_with_challenge(
        &self,
        notification: &mut PushNotification,
        challenge_response: &str,
    ) -> Result<(), AuthenticatorError> {
        notification
            .accept_with_challenge(challenge_response, &self.store, &self.transport)
            .await
    }

    /// Approve a biometric notification after local verification.
    pub async fn accept_with_biometric(
        &self,
        notification: &mut PushNotification,
    ) -> Result<(), AuthenticatorError> {
        notification
            .accept_with_biometric(&self.store, &self.transport)
            .await
    }

    #[allow(missing_docs)]
    pub async fn deny(&self, notification: &mut PushNotification) -> Result<(), AuthenticatorError> {
        notification.deny(&self.store, &self.transport).await
    }

    /// Store the device token received from the push service, without telling AM.
    pub fn set_device_token(&self, device_token: &str) -> Result<bool, AuthenticatorError> {
        Ok(self.device_tokens().set_device_token(device_token)?)
    }

    /// Send a changed device token to AM for every push mechanism, then store it.
    pub async fn update_device_token(&self, device_token: &str) -> Result<(), AuthenticatorError> {
        self.device_tokens()
            .update_device_token(&self.device(device_token))
            .await
    }
}
