use std::time::Duration;

use frauth_types::{
    crypto::sha256,
    encoding,
    webauthn::{
        AuthenticatedPublicKeyCredential, ClientDataType, CollectedClientData,
        CreatedPublicKeyCredential, PublicKeyCredentialCreationOptions,
        PublicKeyCredentialRequestOptions,
    },
    Bytes,
};

use crate::{session::Authenticator, CreateOperation, GetOperation, WebAuthnError};

/// The client data of one ceremony, serialized once so the JSON handed back to the Relying Party
/// is byte for byte what was hashed.
#[derive(Debug, Clone)]
pub(crate) struct ClientData {
    pub(crate) json: String,
    pub(crate) hash: [u8; 32],
}

impl ClientData {
    pub(crate) fn new(ty: ClientDataType, challenge: &Bytes, origin: &str) -> Self {
        let collected = CollectedClientData {
            ty,
            challenge: encoding::base64url(challenge),
            origin: origin.to_owned(),
        };
        // SAFETY: a struct of strings always serializes.
        let json = serde_json::to_string(&collected).unwrap();
        let hash = sha256(json.as_bytes());
        Self { json, hash }
    }
}

/// Entry point for WebAuthn ceremonies.
///
/// The client builds the client data for the configured origin, clamps the ceremony lifetime, and
/// hands each ceremony a fresh session from its [`Authenticator`].
pub struct WebAuthnClient<A> {
    origin: String,
    authenticator: A,
    default_timeout: Duration,
    min_timeout: Duration,
    max_timeout: Duration,
}

impl<A: Authenticator> WebAuthnClient<A> {
    /// A client for `origin` with a 60 second default lifetime, clamped between 5 and 300 seconds.
    pub fn new(origin: impl Into<String>, authenticator: A) -> Self {
        Self {
            origin: origin.into(),
            authenticator,
            default_timeout: Duration::from_secs(60),
            min_timeout: Duration::from_secs(5),
            max_timeout: Duration::from_secs(300),
        }
    }

    /// Override the lifetime used when the options carry no timeout, and its bounds.
    pub fn with_timeouts(mut self, default: Duration, min: Duration, max: Duration) -> Self {
        self.default_timeout = default;
        self.min_timeout = min;
        self.max_timeout = max.max(min);
        self
    }

    /// The origin written into client data.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub(crate) fn lifetime(&self, timeout: Option<u64>) -> Duration {
        timeout
            .map(|secs| Duration::from_secs(secs).clamp(self.min_timeout, self.max_timeout))
            .unwrap_or(self.default_timeout)
    }

    fn rp_id(&self, rp_id: Option<&str>) -> String {
        rp_id.unwrap_or(&self.origin).to_owned()
    }

    /// Prepare a credential creation without starting it.
    pub fn new_create_operation(
        &self,
        options: PublicKeyCredentialCreationOptions,
    ) -> CreateOperation<A::MakeCredential> {
        log::debug!("<WebAuthnClient> newCreateOperation");
        let lifetime = self.lifetime(options.timeout);
        let rp_id = self.rp_id(options.rp.id.as_deref());
        let client_data = ClientData::new(ClientDataType::Create, &options.challenge, &self.origin);
        let session = self.authenticator.new_make_credential_session();
        CreateOperation::new(options, rp_id, client_data, session, lifetime)
    }

    /// Prepare an assertion without starting it.
    pub fn new_get_operation(
        &self,
        options: PublicKeyCredentialRequestOptions,
    ) -> GetOperation<A::GetAssertion> {
        log::debug!("<WebAuthnClient> newGetOperation");
        let lifetime = self.lifetime(options.timeout);
        let rp_id = self.rp_id(options.rp_id.as_deref());
        let client_data = ClientData::new(ClientDataType::Get, &options.challenge, &self.origin);
        let session = self.authenticator.new_get_assertion_session();
        GetOperation::new(options, rp_id, client_data, session, lifetime)
    }

    /// Create a credential.
    pub async fn create(
        &self,
        options: PublicKeyCredentialCreationOptions,
    ) -> Result<CreatedPublicKeyCredential, WebAuthnError> {
        self.new_create_operation(options).start().await
    }

    /// Sign a challenge with an existing credential.
    pub async fn get(
        &self,
        options: PublicKeyCredentialRequestOptions,
    ) -> Result<AuthenticatedPublicKeyCredential, WebAuthnError> {
        self.new_get_operation(options).start().await
    }
}
