//! Bulk import of OATH accounts from `otpauth-migration://offline?data=...` QR codes.
//!
//! The `data` parameter is a standard base64 `MigrationPayload` protobuf, the format other
//! authenticator apps export their accounts in.

use frauth_types::encoding;
use prost::Message;
use url::Url;

use super::{
    mechanism::{DEFAULT_DIGITS, DEFAULT_PERIOD},
    OathAlgorithm, OathKind, OathMechanism,
};
use crate::{uri::query_params, Account, AccountMigrationError, AuthenticatorError};

const SCHEME: &str = "otpauth-migration";
const HOST: &str = "offline";

#[derive(Clone, PartialEq, Message)]
struct MigrationPayload {
    #[prost(message, repeated, tag = "1")]
    otp_parameters: Vec<OtpParameters>,
    #[prost(int32, tag = "2")]
    version: i32,
    #[prost(int32, tag = "3")]
    batch_size: i32,
    #[prost(int32, tag = "4")]
    batch_index: i32,
    #[prost(int32, tag = "5")]
    batch_id: i32,
}

#[derive(Clone, PartialEq, Message)]
struct OtpParameters {
    #[prost(bytes = "vec", tag = "1")]
    secret: Vec<u8>,
    #[prost(string, tag = "2")]
    name: String,
    #[prost(string, tag = "3")]
    issuer: String,
    #[prost(enumeration = "Algorithm", tag = "4")]
    algorithm: i32,
    #[prost(enumeration = "DigitCount", tag = "5")]
    digits: i32,
    #[prost(enumeration = "OtpType", tag = "6")]
    r#type: i32,
    #[prost(int64, tag = "7")]
    counter: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
enum Algorithm {
    Unspecified = 0,
    Sha1 = 1,
    Sha256 = 2,
    Sha512 = 3,
    Md5 = 4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
enum DigitCount {
    Unspecified = 0,
    Six = 1,
    Eight = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
enum OtpType {
    Unspecified = 0,
    Hotp = 1,
    Totp = 2,
}

impl OtpParameters {
    fn into_account(self) -> Option<Account> {
        let kind = match OtpType::try_from(self.r#type) {
            Ok(OtpType::Hotp) => OathKind::Hotp {
                counter: u64::try_from(self.counter).unwrap_or_default(),
            },
            Ok(OtpType::Totp) => OathKind::Totp {
                period: DEFAULT_PERIOD,
            },
            _ => {
                log::warn!("Skipping {} with unsupported type {}", self.name, self.r#type);
                return None;
            }
        };
        let algorithm = match Algorithm::try_from(self.algorithm) {
            Ok(Algorithm::Sha256) => OathAlgorithm::Sha256,
            Ok(Algorithm::Sha512) => OathAlgorithm::Sha512,
            _ => OathAlgorithm::Sha1,
        };
        let digits = match DigitCount::try_from(self.digits) {
            Ok(DigitCount::Eight) => 8,
            _ => DEFAULT_DIGITS,
        };

        let mechanism = OathMechanism::new(
            &self.issuer,
            &self.name,
            encoding::base32(&self.secret),
            algorithm,
            digits,
            kind,
        );
        let mut account = Account::new(&self.issuer, &self.name);
        account.oath_mechanisms.push(mechanism);
        Some(account)
    }
}

/// The accounts in an `otpauth-migration` URI, each holding one OATH mechanism.
pub fn decode_to_accounts(uri: &str) -> Result<Vec<Account>, AccountMigrationError> {
    let uri = Url::parse(uri).map_err(|_| AccountMigrationError::InvalidScheme)?;
    if uri.scheme() != SCHEME {
        log::warn!("Unsupported migration scheme {}", uri.scheme());
        return Err(AccountMigrationError::InvalidScheme);
    }
    if uri.host_str() != Some(HOST) {
        log::warn!("Unsupported migration host {:?}", uri.host_str());
        return Err(AccountMigrationError::InvalidHost);
    }
    let params = query_params(&uri);
    let data = params.get("data").ok_or(AccountMigrationError::MissingData)?;
    let bytes = encoding::try_from_base64(data).ok_or(AccountMigrationError::FailToDecodeData)?;
    let payload = MigrationPayload::decode(bytes.as_slice()).map_err(|e| {
        log::warn!("Invalid migration payload: {e}");
        AccountMigrationError::FailToDecodeData
    })?;

    Ok(payload
        .otp_parameters
        .into_iter()
        .filter_map(OtpParameters::into_account)
        .collect())
}

/// The `otpauth://` URIs of every mechanism in an `otpauth-migration` URI.
pub fn decode_to_uris(uri: &str) -> Result<Vec<Url>, AuthenticatorError> {
    let mut uris = Vec::new();
    for account in decode_to_accounts(uri)? {
        for mechanism in &account.oath_mechanisms {
            uris.push(mechanism.to_uri(account.image_url.as_deref())?);
        }
    }
    Ok(uris)
}
