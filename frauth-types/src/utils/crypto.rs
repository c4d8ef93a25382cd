//! Collection of common cryptography primitives used by the SDK protocols.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

/// Compute the SHA-256 of the given `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    // SAFETY: sha256 always gives a 32 byte array
    Sha256::digest(data).into()
}

/// Compute the HMAC-SHA256 of `data` keyed with `key`.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    // SAFETY: HMAC accepts keys of any length, `new_from_slice` never errors for it.
    let mut mac = Hmac::<Sha256>::new_from_slice(key).unwrap();
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Compute the HMAC-SHA1 of `data` keyed with `key`, as used by OATH codes.
pub fn hmac_sha1(key: &[u8], data: &[u8]) -> Vec<u8> {
    // SAFETY: see `hmac_sha256`.
    let mut mac = Hmac::<Sha1>::new_from_slice(key).unwrap();
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Compute the HMAC-SHA512 of `data` keyed with `key`.
pub fn hmac_sha512(key: &[u8], data: &[u8]) -> Vec<u8> {
    // SAFETY: see `hmac_sha256`.
    let mut mac = Hmac::<Sha512>::new_from_slice(key).unwrap();
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
