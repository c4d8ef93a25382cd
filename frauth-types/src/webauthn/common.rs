//! Common types used in both Attestation (registration) and Assertion (authentication).

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::Bytes;

/// The only credential type WebAuthn defines.
#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[typeshare(serialized_as = "String")]
pub enum PublicKeyCredentialType {
    /// Serializes to `public-key`
    #[default]
    PublicKey,
}

/// Identifies a specific public key credential, used both to exclude credentials at creation and
/// to allow credentials at assertion.
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialdescriptor>
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[typeshare]
pub struct PublicKeyCredentialDescriptor {
    /// The type of the credential.
    #[serde(rename = "type", default)]
    pub ty: PublicKeyCredentialType,

    /// The credential id.
    pub id: Bytes,

    /// Hints about how the client may reach the authenticator holding this credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transports: Option<Vec<AuthenticatorTransport>>,
}

impl PublicKeyCredentialDescriptor {
    /// Describe a credential reachable over the given transports.
    pub fn new(id: Bytes, transports: Option<Vec<AuthenticatorTransport>>) -> Self {
        Self {
            ty: PublicKeyCredentialType::PublicKey,
            id,
            transports,
        }
    }

    /// Whether the credential may live on an authenticator reached over `transport`.
    ///
    /// Transports are hints (WebAuthn §5.8.3): a descriptor that lists none, whether the member is
    /// absent or empty, places no constraint on the authenticator and is reachable over every
    /// transport. Only a non-empty list that leaves out `transport` rules the credential out.
    pub fn is_reachable_over(&self, transport: AuthenticatorTransport) -> bool {
        match self.transports.as_deref() {
            None | Some([]) => true,
            Some(transports) => transports.contains(&transport),
        }
    }
}

/// A WebAuthn Relying Party may require user verification for some of its operations but not for
/// others, and may use this type to express its needs.
///
/// <https://w3c.github.io/webauthn/#enum-userVerificationRequirement>
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[typeshare(serialized_as = "String")]
pub enum UserVerificationRequirement {
    /// The operation fails if user verification cannot be performed.
    Required,

    /// User verification is performed when possible, without failing the operation otherwise.
    #[default]
    Preferred,

    /// User verification is not wanted.
    Discouraged,
}

/// How the client communicates with an authenticator.
///
/// <https://w3c.github.io/webauthn/#enum-transport>
#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[typeshare(serialized_as = "String")]
pub enum AuthenticatorTransport {
    /// Removable USB.
    Usb,

    /// Near Field Communication.
    Nfc,

    /// Bluetooth Smart.
    Ble,

    /// Hybrid (formerly caBLE).
    #[serde(alias = "cable")]
    Hybrid,

    /// A client device-specific transport, the authenticator is part of this device.
    Internal,
}

/// Describes an authenticator's attachment modality.
///
/// <https://w3c.github.io/webauthn/#enum-attachment>
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
#[typeshare(serialized_as = "String")]
pub enum AuthenticatorAttachment {
    /// Attached to the client device.
    Platform,

    /// Roaming authenticator such as a security key.
    CrossPlatform,
}
