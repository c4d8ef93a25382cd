//! # frauth Types
//!
//! Rust type definitions shared by the `frauth` crates:
//!
//! - [`webauthn`]: the subset of the [WebAuthn] data model needed by a FIDO2 client, including
//!   the attestation object and authenticator data codec.
//! - [`storage`]: the opaque key-value store the SDK persists sessions, tokens, mechanisms and
//!   notifications into.
//! - [`Bytes`], [`encoding`] and [`crypto`]: helpers for the byte strings, base64 flavours and
//!   digests the AM protocols use.
//!
//! [WebAuthn]: https://w3c.github.io/webauthn

mod utils;

pub mod storage;
pub mod webauthn;

// Re-exports
pub use utils::{
    bytes::{Bytes, NotBase64Encoded},
    crypto, encoding,
};
