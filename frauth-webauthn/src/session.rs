//! The seam between the client and an authenticator.
//!
//! A session is handed an event sender when the operation starts and reports everything that
//! happens on the authenticator side through it: availability changes, the ceremony result, or
//! the reason it gave up. The operation reacts to those events; it never blocks on the session.

use frauth_types::{
    webauthn::{
        AttestationConveyancePreference, AttestationObject, AuthenticatorAttachment,
        AuthenticatorTransport, PublicKeyCredentialDescriptor, PublicKeyCredentialParameters,
        PublicKeyCredentialRpEntity, PublicKeyCredentialUserEntity,
    },
    Bytes,
};
use tokio::sync::mpsc::UnboundedSender;

use crate::WebAuthnError;

/// What the authenticator is asked to do to create a credential.
#[derive(Debug, Clone, PartialEq)]
pub struct MakeCredentialRequest {
    /// SHA-256 of the client data JSON.
    pub client_data_hash: [u8; 32],
    /// The Relying Party, with its id always set.
    pub rp: PublicKeyCredentialRpEntity,
    #[allow(missing_docs)]
    pub user: PublicKeyCredentialUserEntity,
    #[allow(missing_docs)]
    pub require_resident_key: bool,
    #[allow(missing_docs)]
    pub require_user_presence: bool,
    #[allow(missing_docs)]
    pub require_user_verification: bool,
    #[allow(missing_docs)]
    pub attestation: AttestationConveyancePreference,
    #[allow(missing_docs)]
    pub pub_key_cred_params: Vec<PublicKeyCredentialParameters>,
    /// Only the excluded credentials reachable over the session's transport.
    pub exclude_credentials: Vec<PublicKeyCredentialDescriptor>,
}

/// What the authenticator is asked to do to produce an assertion.
#[derive(Debug, Clone, PartialEq)]
pub struct GetAssertionRequest {
    #[allow(missing_docs)]
    pub rp_id: String,
    /// SHA-256 of the client data JSON.
    pub client_data_hash: [u8; 32],
    /// Empty means any discoverable credential may be used.
    pub allow_credentials: Vec<PublicKeyCredentialDescriptor>,
    #[allow(missing_docs)]
    pub require_user_presence: bool,
    #[allow(missing_docs)]
    pub require_user_verification: bool,
}

/// The raw output of an assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionResult {
    /// Some authenticators leave this out when only one credential was allowed.
    pub credential_id: Option<Bytes>,
    #[allow(missing_docs)]
    pub authenticator_data: Bytes,
    #[allow(missing_docs)]
    pub signature: Bytes,
    #[allow(missing_docs)]
    pub user_handle: Option<Bytes>,
}

/// Events emitted by a [`MakeCredentialSession`].
#[derive(Debug, Clone, PartialEq)]
pub enum MakeCredentialEvent {
    /// The authenticator is ready for [`MakeCredentialSession::make_credential`].
    BecameAvailable,
    /// The authenticator went away.
    BecameUnavailable,
    /// The credential was created.
    MadeCredential(AttestationObject),
    /// The authenticator stopped, e.g. after the user dismissed its UI.
    StoppedOperation(WebAuthnError),
}

/// Events emitted by a [`GetAssertionSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetAssertionEvent {
    /// The authenticator is ready for [`GetAssertionSession::get_assertion`].
    BecameAvailable,
    /// The authenticator went away.
    BecameUnavailable,
    /// A credential was used to sign the challenge.
    DiscoveredCredential(AssertionResult),
    /// The authenticator stopped, e.g. after the user dismissed its UI.
    StoppedOperation(WebAuthnError),
}

/// One credential creation on an authenticator.
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
pub trait MakeCredentialSession: Send + Sync {
    /// How the authenticator is attached to the client.
    fn attachment(&self) -> AuthenticatorAttachment;

    /// The transport the client reaches the authenticator over.
    fn transport(&self) -> AuthenticatorTransport;

    /// Whether the authenticator can store discoverable credentials.
    fn can_store_resident_key(&self) -> bool;

    /// Whether the authenticator can verify the user itself.
    fn can_perform_user_verification(&self) -> bool;

    /// Begin the session. Every following event goes through `events`.
    fn start(&self, events: UnboundedSender<MakeCredentialEvent>);

    /// Create a credential. Called at most once, after [`MakeCredentialEvent::BecameAvailable`].
    fn make_credential(&self, request: MakeCredentialRequest);

    /// Abort whatever the session is doing.
    ///
    /// Sessions owning their own UI should answer with [`MakeCredentialEvent::StoppedOperation`].
    fn cancel(&self, reason: WebAuthnError);
}

/// One assertion on an authenticator.
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
pub trait GetAssertionSession: Send + Sync {
    /// How the authenticator is attached to the client.
    fn attachment(&self) -> AuthenticatorAttachment;

    /// The transport the client reaches the authenticator over.
    fn transport(&self) -> AuthenticatorTransport;

    /// Whether the authenticator can verify the user itself.
    fn can_perform_user_verification(&self) -> bool;

    /// Begin the session. Every following event goes through `events`.
    fn start(&self, events: UnboundedSender<GetAssertionEvent>);

    /// Sign the challenge. Called at most once, after [`GetAssertionEvent::BecameAvailable`].
    fn get_assertion(&self, request: GetAssertionRequest);

    /// Abort whatever the session is doing.
    ///
    /// Sessions owning their own UI should answer with [`GetAssertionEvent::StoppedOperation`].
    fn cancel(&self, reason: WebAuthnError);
}

/// Creates sessions for the [`WebAuthnClient`](crate::WebAuthnClient).
#[cfg_attr(any(test, feature = "testable"), mockall::automock(
    type MakeCredential = MockMakeCredentialSession;
    type GetAssertion = MockGetAssertionSession;
))]
pub trait Authenticator: Send + Sync {
    /// The session type used for credential creation.
    type MakeCredential: MakeCredentialSession + 'static;

    /// The session type used for assertions.
    type GetAssertion: GetAssertionSession + 'static;

    /// A fresh session for one credential creation.
    fn new_make_credential_session(&self) -> Self::MakeCredential;

    /// A fresh session for one assertion.
    fn new_get_assertion_session(&self) -> Self::GetAssertion;
}
