//! HS256 compact JWTs keyed with a push mechanism's shared secret.
//!
//! AM hands out the shared secret base64url encoded. The HMAC key is the decoded secret, both for
//! the JWTs we sign and for the notifications we verify.

use frauth_types::{crypto::hmac_sha256, encoding};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header};
use serde_json::{Map, Value};

use crate::CryptoError;

fn secret_key(secret: &str) -> Result<Vec<u8>, CryptoError> {
    encoding::try_from_base64url(secret)
        .or_else(|| encoding::try_from_base64(secret))
        .ok_or_else(|| CryptoError::InvalidParam("secret".into()))
}

/// Sign `claims` into a compact HS256 JWT.
pub fn sign(secret: &str, claims: &Map<String, Value>) -> Result<String, CryptoError> {
    let key = secret_key(secret)?;
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(&key),
    )
    .map_err(|e| CryptoError::InvalidJwt(e.to_string()))
}

/// Check the signature of `jwt` against `secret`.
///
/// A well formed token with a bad signature gives `Ok(false)`.
pub fn verify(secret: &str, jwt: &str) -> Result<bool, CryptoError> {
    let header =
        jsonwebtoken::decode_header(jwt).map_err(|e| CryptoError::InvalidJwt(e.to_string()))?;
    if header.alg != Algorithm::HS256 {
        return Err(CryptoError::UnsupportedJwtType);
    }
    let Some((message, signature)) = jwt.rsplit_once('.') else {
        return Err(CryptoError::InvalidJwt("missing signature".into()));
    };
    let key = secret_key(secret)?;
    jsonwebtoken::crypto::verify(
        signature,
        message.as_bytes(),
        &DecodingKey::from_secret(&key),
        Algorithm::HS256,
    )
    .map_err(|e| CryptoError::InvalidJwt(e.to_string()))
}

/// Read the claims of `jwt` without verifying it.
///
/// Used to find out which mechanism, and therefore which secret, a notification belongs to.
pub fn extract_payload(jwt: &str) -> Result<Map<String, Value>, CryptoError> {
    let mut parts = jwt.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(CryptoError::InvalidJwt("expected three segments".into()));
    };
    let bytes = encoding::try_from_base64url(payload).ok_or(CryptoError::FailToConvertData)?;
    serde_json::from_slice(&bytes).map_err(|e| CryptoError::InvalidJwt(e.to_string()))
}

/// The answer to a push challenge: `base64(HMAC-SHA256(secret, base64_decode(challenge)))`.
pub fn challenge_response(challenge: &str, secret: &str) -> Result<String, CryptoError> {
    let key = secret_key(secret)?;
    let challenge = encoding::try_from_base64(challenge)
        .ok_or_else(|| CryptoError::InvalidParam("challenge".into()))?;
    Ok(encoding::base64(&hmac_sha256(&key, &challenge)))
}
