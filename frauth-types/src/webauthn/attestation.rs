//! Types used for public key credential creation (registration).

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::{
    webauthn::{
        AuthenticatorAttachment, PublicKeyCredentialDescriptor, PublicKeyCredentialType,
        UserVerificationRequirement,
    },
    Bytes,
};

/// Options for credential creation.
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialcreationoptions>
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct PublicKeyCredentialCreationOptions {
    /// The Relying Party responsible for the request.
    pub rp: PublicKeyCredentialRpEntity,

    /// The user account for which the Relying Party is requesting attestation.
    pub user: PublicKeyCredentialUserEntity,

    /// The challenge the authenticator signs along with other data.
    pub challenge: Bytes,

    /// Key types and signature algorithms the Relying Party supports, most preferred first.
    pub pub_key_cred_params: Vec<PublicKeyCredentialParameters>,

    /// Time, in seconds, the caller is willing to wait for the call to complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Credentials that must not already exist on the authenticator.
    #[serde(default)]
    pub exclude_credentials: Vec<PublicKeyCredentialDescriptor>,

    /// Requirements the chosen authenticator must satisfy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_selection: Option<AuthenticatorSelectionCriteria>,

    /// The Relying Party's preference regarding attestation conveyance.
    #[serde(default)]
    pub attestation: AttestationConveyancePreference,
}

/// Attributes of the Relying Party for credential creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[typeshare]
pub struct PublicKeyCredentialRpEntity {
    /// The RP ID, defaults to the caller origin's effective domain when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Human-palatable identifier for the Relying Party.
    pub name: String,
}

/// Attributes of the user account for credential creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct PublicKeyCredentialUserEntity {
    /// The user handle of the account.
    pub id: Bytes,

    /// Human-palatable account identifier, for display only.
    pub name: String,

    /// Human-palatable name of the account, for display only.
    pub display_name: String,
}

/// A credential type paired with a COSE algorithm identifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[typeshare]
pub struct PublicKeyCredentialParameters {
    /// The type of credential to be created.
    #[serde(rename = "type", default)]
    pub ty: PublicKeyCredentialType,

    /// A COSE algorithm identifier, for example `-7` for ES256.
    #[typeshare(serialized_as = "I54")]
    pub alg: i64,
}

/// Relying Party requirements regarding authenticator attributes.
///
/// <https://w3c.github.io/webauthn/#dictdef-authenticatorselectioncriteria>
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct AuthenticatorSelectionCriteria {
    /// Restricts eligible authenticators to the given attachment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,

    /// Whether a client-side discoverable credential must be created.
    #[serde(default)]
    pub require_resident_key: bool,

    /// The Relying Party's user verification requirement.
    #[serde(default)]
    pub user_verification: UserVerificationRequirement,
}

/// How much attestation the Relying Party wants to receive.
///
/// <https://w3c.github.io/webauthn/#enum-attestation-convey>
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[typeshare(serialized_as = "String")]
pub enum AttestationConveyancePreference {
    /// No attestation; identifying authenticator information is stripped.
    #[default]
    None,

    /// Attestation may be replaced by an anonymized one.
    Indirect,

    /// The attestation as generated by the authenticator.
    Direct,
}

/// The authenticator's response to a credential creation request.
///
/// <https://w3c.github.io/webauthn/#authenticatorattestationresponse>
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct AuthenticatorAttestationResponse {
    /// The JSON serialization of the [`CollectedClientData`](super::CollectedClientData).
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,

    /// The CBOR encoded [`AttestationObject`](super::AttestationObject).
    pub attestation_object: Bytes,
}
