use frauth_transport::TransportError;
use frauth_types::storage::StorageError;

/// Failures while building or registering a mechanism.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MechanismError {
    /// The scanned URI is not a push registration URI.
    #[error("Invalid QR code format: {0}")]
    InvalidQrCode(String),
    /// The URI names a mechanism type this SDK doesn't handle.
    #[error("Invalid or missing auth type: {0}")]
    InvalidType(String),
    /// A required parameter is absent.
    #[error("Missing information: {0}")]
    MissingInformation(String),
    /// A parameter is present but unusable.
    #[error("Invalid information: {0}")]
    InvalidInformation(String),
    /// The account already holds a mechanism of the same type.
    #[error("Given Mechanism already exists: {0}")]
    AlreadyExists(String),
    /// The server refused to update the mechanism.
    #[error("Failed to update Mechanism information: {0}")]
    FailedToUpdateInformation(String),
}

impl MechanismError {
    /// The SDK error code.
    pub fn code(&self) -> u32 {
        match self {
            MechanismError::InvalidQrCode(_) => 6000000,
            MechanismError::InvalidType(_) => 6000001,
            MechanismError::MissingInformation(_) => 6000002,
            MechanismError::InvalidInformation(_) => 6000003,
            MechanismError::AlreadyExists(_) => 6000004,
            MechanismError::FailedToUpdateInformation(_) => 6000005,
        }
    }
}

/// Failures tied to the state of an account.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    /// The account is locked by the named policy.
    #[error("This account is locked. It violates the following policy: ({0})")]
    AccountLocked(String),
    #[error("The policy name is required")]
    #[allow(missing_docs)]
    FailToLockMissingPolicyName,
    /// The policy was not attached to the account at registration.
    #[error("The policy was not attached during Account registration")]
    FailToLockInvalidPolicy,
    #[error("Account is already locked")]
    #[allow(missing_docs)]
    FailToLockAccountAlreadyLocked,
    #[error("Account is not locked")]
    #[allow(missing_docs)]
    FailToUnlockAccountNotLocked,
}

impl AccountError {
    /// The SDK error code.
    pub fn code(&self) -> u32 {
        match self {
            AccountError::AccountLocked(_) => 6100000,
            AccountError::FailToLockMissingPolicyName => 6100001,
            AccountError::FailToLockInvalidPolicy => 6100002,
            AccountError::FailToLockAccountAlreadyLocked => 6100003,
            AccountError::FailToUnlockAccountNotLocked => 6100004,
        }
    }
}

/// Failures while handling a push notification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PushNotificationError {
    /// No device token has been set yet.
    #[error("Missing device token")]
    MissingDeviceToken,
    /// The notification was already answered or has expired.
    #[error("PushNotification is not in a valid status to authenticate; either PushNotification has already been authenticated or expired")]
    NotificationInvalidStatus,
    /// The notification or its mechanism could not be read or written.
    #[error("Storage failure: {0}")]
    StorageError(String),
    /// The accept variant doesn't match the notification's push type.
    #[error("Invalid push type for this operation: {0}")]
    InvalidPushType(String),
    /// The notification payload lacks a field or carries an unusable one.
    #[error("Invalid notification payload: {0}")]
    InvalidPayload(String),
}

impl PushNotificationError {
    /// The SDK error code.
    pub fn code(&self) -> u32 {
        match self {
            PushNotificationError::MissingDeviceToken => 1100000,
            PushNotificationError::NotificationInvalidStatus => 1100001,
            PushNotificationError::StorageError(_) => 1100002,
            PushNotificationError::InvalidPushType(_) => 1100003,
            PushNotificationError::InvalidPayload(_) => 1100004,
        }
    }
}

/// Failures in the JWT and challenge response helpers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    /// An input couldn't be decoded.
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),
    /// Data couldn't be converted between representations.
    #[error("Failed to convert data")]
    FailToConvertData,
    /// The JWT is malformed or its signature doesn't verify.
    #[error("Invalid JWT: {0}")]
    InvalidJwt(String),
    /// Only HS256 compact JWTs are used by AM push.
    #[error("Unsupported JWT type")]
    UnsupportedJwtType,
}

impl CryptoError {
    /// The SDK error code.
    pub fn code(&self) -> u32 {
        match self {
            CryptoError::InvalidParam(_) => 1200000,
            CryptoError::FailToConvertData => 1200001,
            CryptoError::InvalidJwt(_) => 1200002,
            CryptoError::UnsupportedJwtType => 1200003,
        }
    }
}

/// Failures while reading an `otpauth-migration` URI.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountMigrationError {
    #[error("Invalid scheme, expected otpauth-migration")]
    #[allow(missing_docs)]
    InvalidScheme,
    #[error("Invalid host, expected offline")]
    #[allow(missing_docs)]
    InvalidHost,
    #[error("Missing data parameter")]
    #[allow(missing_docs)]
    MissingData,
    /// `data` is not base64, or not a migration payload.
    #[error("Failed to decode migration data")]
    FailToDecodeData,
}

impl AccountMigrationError {
    /// The SDK error code.
    pub fn code(&self) -> u32 {
        match self {
            AccountMigrationError::InvalidScheme => 1500000,
            AccountMigrationError::InvalidHost => 1500001,
            AccountMigrationError::MissingData => 1500002,
            AccountMigrationError::FailToDecodeData => 1500003,
        }
    }
}

/// Every failure the authenticator side of the SDK reports.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthenticatorError {
    #[error(transparent)]
    #[allow(missing_docs)]
    Mechanism(#[from] MechanismError),
    #[error(transparent)]
    #[allow(missing_docs)]
    Account(#[from] AccountError),
    #[error(transparent)]
    #[allow(missing_docs)]
    PushNotification(#[from] PushNotificationError),
    #[error(transparent)]
    #[allow(missing_docs)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    #[allow(missing_docs)]
    Migration(#[from] AccountMigrationError),
    #[error(transparent)]
    #[allow(missing_docs)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    #[allow(missing_docs)]
    Storage(#[from] StorageError),
    /// A record could not be written to storage.
    #[error("Failed to save data into storage: {0}")]
    FailToSaveIntoStorage(String),
    /// At least one mechanism refused the new device token.
    #[error("Failed to update the device token on {} mechanism(s)", .0.len())]
    DeviceTokenUpdateFailed(Vec<AuthenticatorError>),
}

impl AuthenticatorError {
    /// The SDK error code, when the failure has one.
    pub fn code(&self) -> Option<u32> {
        match self {
            AuthenticatorError::Mechanism(e) => Some(e.code()),
            AuthenticatorError::Account(e) => Some(e.code()),
            AuthenticatorError::PushNotification(e) => Some(e.code()),
            AuthenticatorError::Crypto(e) => Some(e.code()),
            AuthenticatorError::Migration(e) => Some(e.code()),
            AuthenticatorError::FailToSaveIntoStorage(_) => Some(8000000),
            AuthenticatorError::DeviceTokenUpdateFailed(_) => Some(8000001),
            AuthenticatorError::Transport(_) | AuthenticatorError::Storage(_) => None,
        }
    }
}
