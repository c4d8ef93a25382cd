//! Encoding helpers for the base64 flavours spoken by AM.
//!
//! AM mixes standard base64 (with padding) for push challenges and load balancer keys, with
//! unpadded base64url for QR code parameters, credential ids and WebAuthn challenges. These
//! functions keep the conversions in one place.

use data_encoding::{
    Specification, BASE32_NOPAD, BASE64, BASE64URL, BASE64URL_NOPAD, BASE64_NOPAD,
};

/// Convert bytes to standard base64 with padding.
pub fn base64(data: &[u8]) -> String {
    BASE64.encode(data)
}

/// Convert bytes to base64url without padding
pub fn base64url(data: &[u8]) -> String {
    BASE64URL_NOPAD.encode(data)
}

/// Try parsing from base64 with or without padding
pub fn try_from_base64(input: &str) -> Option<Vec<u8>> {
    let sane_string = input.trim_end_matches('=');
    BASE64_NOPAD.decode(sane_string.as_bytes()).ok()
}

/// Try parsing from base64url with or without padding
pub fn try_from_base64url(input: &str) -> Option<Vec<u8>> {
    let specs = BASE64URL.specification();
    let specs = Specification {
        check_trailing_bits: false,
        padding: None,
        ..specs
    };
    let encoding = specs.encoding().ok()?;
    let sane_string = input.trim_end_matches('=');
    encoding.decode(sane_string.as_bytes()).ok()
}

/// Convert bytes to unpadded base32, the encoding of OATH secrets.
pub fn base32(data: &[u8]) -> String {
    BASE32_NOPAD.encode(data)
}

/// Try parsing from base32, ignoring case and padding.
pub fn try_from_base32(input: &str) -> Option<Vec<u8>> {
    let sane_string = input.trim_end_matches('=').to_ascii_uppercase();
    BASE32_NOPAD.decode(sane_string.as_bytes()).ok()
}

/// Rewrite a base64url string into standard, padded base64 without decoding it.
///
/// AM sends push challenges url-safe encoded while the challenge response is computed over the
/// standard representation.
pub fn url_safe_to_standard(input: &str) -> String {
    let mut converted: String = input
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    while converted.len() % 4 != 0 {
        converted.push('=');
    }
    converted
}

/// Rewrite a standard base64 string into unpadded base64url without decoding it.
pub fn standard_to_url_safe(input: &str) -> String {
    input
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect()
}

/// Decode base64 or base64url into an UTF-8 string.
pub fn decode_to_string(input: &str) -> Option<String> {
    try_from_base64(input)
        .or_else(|| try_from_base64url(input))
        .and_then(|bytes| String::from_utf8(bytes).ok())
}
