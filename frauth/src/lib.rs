//! # frauth
//!
//! A client SDK for ForgeRock/Ping AM. It is made of four libraries:
//!
//! - `frauth` - this crate: drives authentication trees, keeps the SSO session and the OAuth2
//!   tokens issued for it, and decodes the callbacks AM sends.
//! - `frauth-webauthn` - usable as [`webauthn`]: a WebAuthn client answering AM's WebAuthn
//!   registration and authentication nodes with a platform authenticator.
//! - `frauth-authenticator` - usable as [`authenticator`]: the authenticator app side of AM's push
//!   second factor.
//! - `frauth-transport` and `frauth-types` - usable as [`transport`] and [`types`]: the HTTP seam
//!   every network call goes through, and the shared value types.
//!
//! ## Authentication trees
//!
//! A tree is a server-side graph of nodes. The SDK starts it with an [`AuthService`], then keeps
//! answering the [`Node`]s AM sends back until the tree ends in an SSO [`Token`]. Depending on the
//! [`DesiredResult`], the token is handed back as is, exchanged for an [`AccessToken`], or wrapped
//! in a [`User`].
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use frauth::{
//!     callback::Callback, transport::HttpTransport, types::storage::MemoryStore, AuthIndexType,
//!     AuthService, Config, DesiredResult, FlowResult, SessionContext,
//! };
//!
//! # async fn login() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_json(r#"{"forgerock_url": "https://openam.example.com/openam"}"#)?;
//! let ctx = SessionContext::from_config(
//!     &config,
//!     Arc::new(HttpTransport::new()?),
//!     Arc::new(MemoryStore::new()),
//! );
//!
//! let mut result = AuthService::new("Login", AuthIndexType::Service)
//!     .next(&ctx, DesiredResult::SessionToken)
//!     .await?;
//! while let FlowResult::Node(mut node) = result {
//!     for callback in &mut node.callbacks {
//!         match callback {
//!             Callback::Name(name) => name.set_value("demo"),
//!             Callback::Password(password) => password.set_value("Password1!"),
//!             _ => {}
//!         }
//!     }
//!     result = node.next(&ctx, DesiredResult::SessionToken).await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Sessions
//!
//! The [`SessionContext`] owns the current SSO token, OAuth2 tokens and user. A tree that ends in
//! a different SSO token than the stored one revokes the OAuth2 tokens of the old session, so an
//! access token never outlives the login it was issued for.

pub mod callback;
pub mod config;
mod error;
mod node;
pub mod oauth2;
mod session;
pub mod storage;
mod token;
pub mod token_manager;

#[cfg(test)]
mod tests;

pub use self::{
    config::Config,
    error::{AuthError, TokenError},
    node::{AuthIndexType, AuthService, DesiredResult, FlowResult, Node},
    session::{SessionContext, User},
    token::{AccessToken, Token},
};

pub use frauth_authenticator as authenticator;
pub use frauth_transport as transport;
pub use frauth_types as types;
pub use frauth_webauthn as webauthn;

/// Header selecting the version of AM's REST API.
pub(crate) const ACCEPT_API_VERSION: &str = "Accept-API-Version";
/// API version of the authenticate and sessions endpoints.
pub(crate) const AUTH_API_VERSION: &str = "resource=2.1, protocol=1.0";
