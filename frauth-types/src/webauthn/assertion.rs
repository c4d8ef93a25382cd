//! Types used for public key credential assertion (authentication).

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::{
    webauthn::{PublicKeyCredentialDescriptor, UserVerificationRequirement},
    Bytes,
};

/// Options for an assertion request.
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialrequestoptions>
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct PublicKeyCredentialRequestOptions {
    /// The challenge the selected authenticator signs.
    pub challenge: Bytes,

    /// Time, in seconds, the caller is willing to wait for the call to complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// The RP ID, defaults to the caller origin's effective domain when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rp_id: Option<String>,

    /// Credentials acceptable to the Relying Party, most preferred first. Empty means any
    /// discoverable credential.
    #[serde(default)]
    pub allow_credentials: Vec<PublicKeyCredentialDescriptor>,

    /// The Relying Party's user verification requirement.
    #[serde(default)]
    pub user_verification: UserVerificationRequirement,
}

/// The authenticator's response to an assertion request.
///
/// <https://w3c.github.io/webauthn/#authenticatorassertionresponse>
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct AuthenticatorAssertionResponse {
    /// The JSON serialization of the [`CollectedClientData`](super::CollectedClientData).
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,

    /// The authenticator data returned by the authenticator.
    pub authenticator_data: Bytes,

    /// The raw signature returned from the authenticator.
    pub signature: Bytes,

    /// The user handle of the credential, if the authenticator returned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<Bytes>,
}
