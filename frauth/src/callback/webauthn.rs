//! WebAuthn registration and authentication nodes.
//!
//! AM delivers both as a `MetadataCallback` whose `data` object has `_type: "WebAuthn"`. AM 7.1
//! and later describe the ceremony as plain JSON and mark it with `_action`; older servers send
//! JavaScript snippets (`id: "example.com"`, `new Int8Array([..])`) inside strings. Both shapes
//! decode into the same callback, which turns into ceremony options for a [`WebAuthnClient`] and
//! renders its result as the outcome string AM expects in the `webAuthnOutcome` hidden value.

use frauth_types::{
    webauthn::{
        AttestationConveyancePreference, AuthenticatorAttachment, AuthenticatorSelectionCriteria,
        AuthenticatorTransport, PublicKeyCredentialCreationOptions,
        PublicKeyCredentialDescriptor, PublicKeyCredentialParameters,
        PublicKeyCredentialRequestOptions, PublicKeyCredentialRpEntity,
        PublicKeyCredentialType, PublicKeyCredentialUserEntity, UserVerificationRequirement,
    },
    Bytes,
};
use frauth_webauthn::{Authenticator, WebAuthnClient, WebAuthnError};
use serde_json::{json, Map, Value};

use super::output;
use crate::AuthError;

const REGISTRATION_ACTION: &str = "webauthn_registration";
const AUTHENTICATION_ACTION: &str = "webauthn_authentication";

/// Which WebAuthn ceremony a metadata callback describes, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WebAuthnKind {
    Registration,
    Authentication,
}

impl WebAuthnKind {
    pub(crate) fn of(json: &Value) -> Option<Self> {
        let data = output(json, "data")?.as_object()?;
        if data.get("_type").and_then(Value::as_str) != Some("WebAuthn") {
            return None;
        }
        match data.get("_action").map(Value::as_str) {
            Some(Some(REGISTRATION_ACTION)) => Some(WebAuthnKind::Registration),
            Some(Some(AUTHENTICATION_ACTION)) => Some(WebAuthnKind::Authentication),
            Some(_) => None,
            None if data.contains_key("pubKeyCredParams") => Some(WebAuthnKind::Registration),
            None => Some(WebAuthnKind::Authentication),
        }
    }
}

fn error(message: &str) -> AuthError {
    AuthError::InvalidCallbackResponse(message.to_owned())
}

/// The `data` object of a WebAuthn metadata callback and whether it uses the JSON format.
fn data<'a>(json: &'a Value, action: &str) -> Result<(&'a Map<String, Value>, bool), AuthError> {
    let data = output(json, "data")
        .and_then(Value::as_object)
        .ok_or_else(|| error("Failed to parse output"))?;
    let json_format = data.get("_action").and_then(Value::as_str) == Some(action);
    Ok((data, json_format))
}

fn string<'a>(data: &'a Map<String, Value>, key: &str) -> Result<&'a str, AuthError> {
    data.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| AuthError::InvalidCallbackResponse(format!("Missing {key}")))
}

/// Timeout in milliseconds, sent as a string.
fn timeout(data: &Map<String, Value>) -> Result<u64, AuthError> {
    string(data, "timeout")?
        .parse()
        .map_err(|_| error("Missing timeout"))
}

fn challenge(data: &Map<String, Value>) -> Result<Bytes, AuthError> {
    Bytes::try_from(string(data, "challenge")?).map_err(|_| error("Invalid challenge"))
}

/// Relying party id in the legacy `<prefix>: "example.com"` form. An empty string means none.
fn legacy_rp_id(value: &str, prefix: &str) -> Result<String, AuthError> {
    if value.is_empty() {
        return Ok(String::new());
    }
    value
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix(": \""))
        .and_then(|rest| rest.split('"').next())
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| error("Invalid relying party identifier"))
}

/// Credential ids sent as arrays of signed bytes: `[{"id": [1, -2, ..]}, ..]`.
fn json_credential_ids(list: &[Value], message: &str) -> Result<Vec<Bytes>, AuthError> {
    list.iter()
        .map(|credential| {
            let signed = credential
                .get("id")
                .and_then(Value::as_array)
                .ok_or_else(|| error(message))?
                .iter()
                .map(|b| b.as_i64().and_then(|b| i8::try_from(b).ok()))
                .collect::<Option<Vec<i8>>>()
                .ok_or_else(|| error(message))?;
            Ok(Bytes::from_signed(&signed))
        })
        .collect()
}

/// Credential ids embedded as `new Int8Array([1, -2, ..])` in a JavaScript snippet.
fn int8_arrays(snippet: &str, message: &str) -> Result<Vec<Bytes>, AuthError> {
    const OPEN: &str = "Int8Array([";
    let mut ids = Vec::new();
    let mut rest = snippet;
    while let Some(start) = rest.find(OPEN) {
        rest = &rest[start + OPEN.len()..];
        let end = rest.find("])").ok_or_else(|| error(message))?;
        let signed = rest[..end]
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::parse::<i8>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| error(message))?;
        ids.push(Bytes::from_signed(&signed));
        rest = &rest[end + 2..];
    }
    Ok(ids)
}

fn cred_params(list: &[Value]) -> Result<Vec<PublicKeyCredentialParameters>, AuthError> {
    list.iter()
        .map(|param| {
            let public_key = param.get("type").and_then(Value::as_str) == Some("public-key");
            match param.get("alg").and_then(Value::as_i64) {
                Some(alg) if public_key => Ok(PublicKeyCredentialParameters {
                    ty: PublicKeyCredentialType::PublicKey,
                    alg,
                }),
                _ => Err(error("Invalid pubKeyCredParams format")),
            }
        })
        .collect()
}

fn user_verification(value: Option<&Value>) -> Option<UserVerificationRequirement> {
    value.and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// Registration of a new credential.
#[derive(Debug, Clone, PartialEq)]
pub struct WebAuthnRegistrationCallback {
    raw: Value,
    json_format: bool,
    relying_party_name: String,
    relying_party_id: String,
    attestation_preference: AttestationConveyancePreference,
    display_name: String,
    user_name: String,
    user_id: String,
    timeout: u64,
    challenge: Bytes,
    exclude_credentials: Vec<Bytes>,
    pub_key_cred_params: Vec<PublicKeyCredentialParameters>,
    require_resident_key: bool,
    user_verification: UserVerificationRequirement,
    authenticator_attachment: Option<AuthenticatorAttachment>,
    supports_json_response: bool,
}

impl WebAuthnRegistrationCallback {
    pub(crate) fn from_json(json: &Value) -> Result<Self, AuthError> {
        let (data, json_format) = data(json, REGISTRATION_ACTION)?;

        let attestation_preference = string(data, "attestationPreference")?
            .parse()
            .map_err(|_| error("Missing attestationPreference"))?;
        string(data, "_type")?;

        let (relying_party_id, selection, exclude_credentials, pub_key_cred_params) =
            if json_format {
                let selection = data
                    .get("_authenticatorSelection")
                    .and_then(Value::as_object)
                    .cloned()
                    .ok_or_else(|| error("Missing authenticatorSelection"))?;
                let exclude = match data.get("_excludeCredentials").and_then(Value::as_array) {
                    Some(list) => json_credential_ids(list, "Invalid excludeCredentials byte")?,
                    None => Vec::new(),
                };
                let params = data
                    .get("_pubKeyCredParams")
                    .and_then(Value::as_array)
                    .ok_or_else(|| error("Invalid pubKeyCredParams format"))?;
                (
                    string(data, "_relyingPartyId")?.to_owned(),
                    selection,
                    exclude,
                    cred_params(params)?,
                )
            } else {
                let selection = serde_json::from_str::<Value>(string(data, "authenticatorSelection")?)
                    .ok()
                    .and_then(|v| v.as_object().cloned())
                    .unwrap_or_default();
                let exclude = match data.get("excludeCredentials").and_then(Value::as_str) {
                    Some(snippet) => int8_arrays(snippet, "Invalid excludeCredentials byte")?,
                    None => Vec::new(),
                };
                let params = data
                    .get("pubKeyCredParams")
                    .and_then(Value::as_str)
                    .and_then(|s| serde_json::from_str::<Vec<Value>>(s).ok())
                    .filter(|params| !params.is_empty())
                    .ok_or_else(|| error("Missing pubKeyCredParams"))?;
                (
                    legacy_rp_id(string(data, "relyingPartyId")?, "id")?,
                    selection,
                    exclude,
                    cred_params(&params)?,
                )
            };

        let authenticator_attachment = selection
            .get("authenticatorAttachment")
            .and_then(|v| serde_json::from_value::<AuthenticatorAttachment>(v.clone()).ok());
        if authenticator_attachment == Some(AuthenticatorAttachment::CrossPlatform) {
            return Err(error("Unsupported Authenticator Attachment type"));
        }

        Ok(Self {
            raw: json.clone(),
            json_format,
            relying_party_name: string(data, "relyingPartyName")?.to_owned(),
            relying_party_id,
            attestation_preference,
            display_name: string(data, "displayName")?.to_owned(),
            user_name: string(data, "userName")?.to_owned(),
            user_id: string(data, "userId")?.to_owned(),
            timeout: timeout(data)?,
            challenge: challenge(data)?,
            exclude_credentials,
            pub_key_cred_params,
            require_resident_key: selection
                .get("requireResidentKey")
                .and_then(Value::as_bool)
                .unwrap_or_default(),
            user_verification: user_verification(selection.get("userVerification"))
                .unwrap_or_default(),
            authenticator_attachment,
            supports_json_response: data
                .get("supportsJsonResponse")
                .and_then(Value::as_bool)
                .unwrap_or_default(),
        })
    }

    /// Whether AM sent the 7.1+ JSON format.
    pub fn is_json_format(&self) -> bool {
        self.json_format
    }

    #[allow(missing_docs)]
    pub fn relying_party_id(&self) -> &str {
        &self.relying_party_id
    }

    #[allow(missing_docs)]
    pub fn relying_party_name(&self) -> &str {
        &self.relying_party_name
    }

    #[allow(missing_docs)]
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    #[allow(missing_docs)]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Credential ids already registered for the user.
    pub fn exclude_credentials(&self) -> &[Bytes] {
        &self.exclude_credentials
    }

    #[allow(missing_docs)]
    pub fn authenticator_attachment(&self) -> Option<AuthenticatorAttachment> {
        self.authenticator_attachment
    }

    /// Whether the outcome may be sent as a JSON document.
    pub fn supports_json_response(&self) -> bool {
        self.supports_json_response
    }

    /// The creation options for this registration.
    pub fn creation_options(&self) -> PublicKeyCredentialCreationOptions {
        PublicKeyCredentialCreationOptions {
            rp: PublicKeyCredentialRpEntity {
                id: (!self.relying_party_id.is_empty()).then(|| self.relying_party_id.clone()),
                name: self.relying_party_name.clone(),
            },
            user: PublicKeyCredentialUserEntity {
                id: self.user_id.as_bytes().into(),
                name: self.user_name.clone(),
                display_name: self.display_name.clone(),
            },
            challenge: self.challenge.clone(),
            pub_key_cred_params: self.pub_key_cred_params.clone(),
            timeout: Some(self.timeout / 1000),
            exclude_credentials: self
                .exclude_credentials
                .iter()
                .map(|id| PublicKeyCredentialDescriptor::new(id.clone(), None))
                .collect(),
            authenticator_selection: Some(AuthenticatorSelectionCriteria {
                authenticator_attachment: None,
                require_resident_key: self.require_resident_key,
                user_verification: self.user_verification,
            }),
            attestation: self.attestation_preference,
        }
    }

    /// Create a credential and render it as the outcome AM expects.
    ///
    /// `device_name` is appended to the outcome so AM can label the registered device.
    pub async fn register<A: Authenticator>(
        &self,
        client: &WebAuthnClient<A>,
        device_name: Option<&str>,
    ) -> Result<String, WebAuthnError> {
        log::info!(
            "Performing WebAuthn registration in the {} format",
            if self.json_format { "JSON" } else { "legacy" }
        );
        let credential = client.create(self.creation_options()).await?;
        let mut outcome = format!(
            "{}::{}::{}",
            credential.response.client_data_json,
            credential.response.attestation_object.to_signed_csv(),
            credential.id
        );
        if let Some(device_name) = device_name {
            outcome = format!("{outcome}::{device_name}");
        }
        if self.supports_json_response {
            outcome = json!({
                "authenticatorAttachment": "platform",
                "legacyData": outcome,
            })
            .to_string();
        }
        Ok(outcome)
    }

    pub(crate) fn build_response(&self) -> Value {
        self.raw.clone()
    }
}

/// Assertion with an existing credential.
#[derive(Debug, Clone, PartialEq)]
pub struct WebAuthnAuthenticationCallback {
    raw: Value,
    json_format: bool,
    relying_party_id: String,
    challenge: Bytes,
    timeout: u64,
    user_verification: UserVerificationRequirement,
    allow_credentials: Vec<Bytes>,
}

impl WebAuthnAuthenticationCallback {
    pub(crate) fn from_json(json: &Value) -> Result<Self, AuthError> {
        let (data, json_format) = data(json, AUTHENTICATION_ACTION)?;
        string(data, "_type")?;
        let user_verification = user_verification(data.get("userVerification"))
            .ok_or_else(|| error("Missing userVerification"))?;

        let (relying_party_id, allow_credentials) = if json_format {
            let allow = data
                .get("_allowCredentials")
                .and_then(Value::as_array)
                .ok_or_else(|| error("Missing allowCredentials"))?;
            (
                string(data, "_relyingPartyId")?.to_owned(),
                json_credential_ids(allow, "Invalid allowCredentials format")?,
            )
        } else {
            (
                legacy_rp_id(string(data, "relyingPartyId")?, "rpId")?,
                int8_arrays(
                    string(data, "allowCredentials")?,
                    "Invalid allowCredentials byte",
                )?,
            )
        };

        Ok(Self {
            raw: json.clone(),
            json_format,
            relying_party_id,
            challenge: challenge(data)?,
            timeout: timeout(data)?,
            user_verification,
            allow_credentials,
        })
    }

    /// Whether AM sent the 7.1+ JSON format.
    pub fn is_json_format(&self) -> bool {
        self.json_format
    }

    #[allow(missing_docs)]
    pub fn relying_party_id(&self) -> &str {
        &self.relying_party_id
    }

    /// Credential ids AM accepts; empty for a username-less flow.
    pub fn allow_credentials(&self) -> &[Bytes] {
        &self.allow_credentials
    }

    #[allow(missing_docs)]
    pub fn user_verification(&self) -> UserVerificationRequirement {
        self.user_verification
    }

    /// The request options for this assertion.
    pub fn request_options(&self) -> PublicKeyCredentialRequestOptions {
        PublicKeyCredentialRequestOptions {
            challenge: self.challenge.clone(),
            timeout: Some(self.timeout / 1000),
            rp_id: (!self.relying_party_id.is_empty()).then(|| self.relying_party_id.clone()),
            allow_credentials: self
                .allow_credentials
                .iter()
                .map(|id| {
                    PublicKeyCredentialDescriptor::new(
                        id.clone(),
                        Some(vec![AuthenticatorTransport::Internal]),
                    )
                })
                .collect(),
            user_verification: self.user_verification,
        }
    }

    /// Sign the challenge and render the assertion as the outcome AM expects.
    pub async fn authenticate<A: Authenticator>(
        &self,
        client: &WebAuthnClient<A>,
    ) -> Result<String, WebAuthnError> {
        log::info!(
            "Performing WebAuthn authentication in the {} format",
            if self.json_format { "JSON" } else { "legacy" }
        );
        let assertion = client.get(self.request_options()).await?;
        let response = &assertion.response;
        let mut outcome = format!(
            "{}::{}::{}::{}",
            response.client_data_json,
            response.authenticator_data.to_signed_csv(),
            response.signature.to_signed_csv(),
            assertion.id
        );
        if let Some(user_handle) = response
            .user_handle
            .as_ref()
            .and_then(|handle| std::str::from_utf8(handle).ok())
        {
            outcome = format!("{outcome}::{user_handle}");
        }
        Ok(outcome)
    }

    pub(crate) fn build_response(&self) -> Value {
        self.raw.clone()
    }
}
