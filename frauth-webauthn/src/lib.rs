//! # frauth WebAuthn
//!
//! A WebAuthn client in the shape of the [Webauthn] client model. The [`WebAuthnClient`] builds
//! the client data and hands the ceremony to a [`CreateOperation`] or [`GetOperation`], which
//! drive an authenticator through a [`MakeCredentialSession`] or [`GetAssertionSession`].
//!
//! The crate performs no cryptography of its own and no networking: the authenticator behind the
//! session signs, and the caller ships the resulting credential to the Relying Party.
//!
//! [Webauthn]: https://w3c.github.io/webauthn/

mod client;
mod error;
mod operation;
mod session;

#[cfg(test)]
mod tests;

pub(crate) use self::client::ClientData;
pub use self::{
    client::WebAuthnClient,
    error::WebAuthnError,
    operation::{CreateOperation, GetOperation},
    session::{
        AssertionResult, Authenticator, GetAssertionEvent, GetAssertionRequest,
        GetAssertionSession, MakeCredentialEvent, MakeCredentialRequest, MakeCredentialSession,
    },
};

#[cfg(any(test, feature = "testable"))]
pub use self::session::{MockAuthenticator, MockGetAssertionSession, MockMakeCredentialSession};
