//! The subset of the [WebAuthn Level 3] data model used by the frauth FIDO2 client.
//!
//! [WebAuthn Level 3]: https://w3c.github.io/webauthn

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::Bytes;

mod assertion;
mod attestation;
mod attestation_object;
mod common;

// re-export types
pub use self::{assertion::*, attestation::*, attestation_object::*, common::*};

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::AuthenticatorAssertionResponse {}
    impl Sealed for super::AuthenticatorAttestationResponse {}
}

/// Marker trait for response types
pub trait AuthenticatorResponse: sealed::Sealed {}

impl AuthenticatorResponse for AuthenticatorAssertionResponse {}
impl AuthenticatorResponse for AuthenticatorAttestationResponse {}

/// The public credential returned by a successful create or get ceremony.
///
/// * Credential Creation: [CreatedPublicKeyCredential]
/// * Credential assertion: [AuthenticatedPublicKeyCredential]
///
/// <https://w3c.github.io/webauthn/#iface-pkcredential>
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct PublicKeyCredential<R: AuthenticatorResponse> {
    /// The base64url encoding of [Self::raw_id].
    pub id: String,

    /// The credential id chosen by the authenticator.
    pub raw_id: Bytes,

    /// Always [PublicKeyCredentialType::PublicKey]
    #[serde(rename = "type")]
    pub ty: PublicKeyCredentialType,

    /// Either an [AuthenticatorAttestationResponse] or an [AuthenticatorAssertionResponse].
    pub response: R,
}

impl<R: AuthenticatorResponse> PublicKeyCredential<R> {
    /// Package a ceremony response with its credential id.
    pub fn new(raw_id: Bytes, response: R) -> Self {
        Self {
            id: crate::encoding::base64url(&raw_id),
            raw_id,
            ty: PublicKeyCredentialType::PublicKey,
            response,
        }
    }
}

/// The result of a credential creation ceremony.
pub type CreatedPublicKeyCredential = PublicKeyCredential<AuthenticatorAttestationResponse>;

/// The result of a credential assertion ceremony.
pub type AuthenticatedPublicKeyCredential = PublicKeyCredential<AuthenticatorAssertionResponse>;

/// The client data represents the contextual bindings of both the Relying Party and the client.
///
/// Its JSON serialization is what gets hashed into the `clientDataHash` handed to the
/// authenticator, so the field order here is the wire order.
///
/// <https://w3c.github.io/webauthn/#dictdef-collectedclientdata>
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[typeshare]
pub struct CollectedClientData {
    /// The ceremony this client data was collected for.
    #[serde(rename = "type")]
    pub ty: ClientDataType,

    /// The base64url encoded challenge provided by the Relying Party.
    pub challenge: String,

    /// The fully qualified origin of the requester.
    pub origin: String,
}

/// Used to limit the values of [`CollectedClientData::ty`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[typeshare]
pub enum ClientDataType {
    /// Serializes to the string `"webauthn.create"`
    #[serde(rename = "webauthn.create")]
    Create,

    /// Serializes to the string `"webauthn.get"`
    #[serde(rename = "webauthn.get")]
    Get,
}
