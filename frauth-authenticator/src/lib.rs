//! # frauth Authenticator
//!
//! The authenticator app side of AM's push second factor. A `pushauth://` QR code becomes a
//! [`PushMechanism`] registered with AM under an [`Account`]; notifications delivered to the
//! device become [`PushNotification`]s that are approved or denied with a JWT signed by the
//! mechanism's shared secret.
//!
//! `otpauth://` codes become HOTP or TOTP [`OathMechanism`]s generating one time passwords
//! locally, and `otpauth-migration://` codes exported by other apps import many of them at once.
//!
//! Everything goes through an [`AuthenticatorManager`], which persists records with an
//! [`AuthenticatorStore`] and talks to AM through a [`Transport`](frauth_transport::Transport).

mod account;
mod error;
pub mod jwt;
mod manager;
pub mod oath;
pub mod push;
mod storage;
mod uri;

#[cfg(test)]
mod tests;

pub use self::{
    account::Account,
    error::{
        AccountError, AccountMigrationError, AuthenticatorError, CryptoError, MechanismError,
        PushNotificationError,
    },
    manager::AuthenticatorManager,
    oath::{OathMechanism, OathRegistrationUri, OathTokenCode},
    push::{
        DeviceRegistration, PushDeviceToken, PushMechanism, PushNotification,
        PushRegistrationUri, PushType,
    },
    storage::AuthenticatorStore,
};
