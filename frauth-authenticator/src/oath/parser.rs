use std::str::FromStr;

use frauth_types::encoding;
use url::Url;

use super::{
    mechanism::{DEFAULT_DIGITS, DEFAULT_PERIOD},
    OathAlgorithm, OathKind,
};
use crate::{
    uri::{issuer_and_label, query_params},
    MechanismError,
};

const SCHEME: &str = "otpauth";

/// The content of an `otpauth://<hotp|totp>/<issuer>:<label>?secret=...` QR code.
#[derive(Debug, Clone, PartialEq)]
pub struct OathRegistrationUri {
    /// Issuer from the path, else the `issuer` parameter, else the label.
    pub issuer: String,
    #[allow(missing_docs)]
    pub account_name: String,
    /// Shared secret, base32.
    pub secret: String,
    #[allow(missing_docs)]
    pub algorithm: OathAlgorithm,
    #[allow(missing_docs)]
    pub digits: u8,
    /// HOTP counter or TOTP period.
    pub kind: OathKind,
    /// Logo of the issuer.
    pub image_url: Option<String>,
    /// Hex colour code without the leading `#`.
    pub background_color: Option<String>,
}

impl FromStr for OathRegistrationUri {
    type Err = MechanismError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uri = Url::parse(s).map_err(|e| MechanismError::InvalidQrCode(e.to_string()))?;
        Self::try_from(&uri)
    }
}

impl TryFrom<&Url> for OathRegistrationUri {
    type Error = MechanismError;

    fn try_from(uri: &Url) -> Result<Self, Self::Error> {
        if uri.scheme() != SCHEME {
            return Err(MechanismError::InvalidQrCode(format!(
                "unexpected scheme {}",
                uri.scheme()
            )));
        }
        let host = uri.host_str().unwrap_or_default().to_ascii_lowercase();
        let params = query_params(uri);
        let number = |name: &str| params.get(name).and_then(|v| v.parse::<u64>().ok());
        let kind = match host.as_str() {
            "hotp" => OathKind::Hotp {
                counter: number("counter").unwrap_or_default(),
            },
            "totp" => OathKind::Totp {
                period: number("period")
                    .and_then(|p| u32::try_from(p).ok())
                    .filter(|p| *p > 0)
                    .unwrap_or(DEFAULT_PERIOD),
            },
            _ => return Err(MechanismError::InvalidType(host)),
        };

        let (path_issuer, account_name) = issuer_and_label(uri);
        let secret = params
            .get("secret")
            .cloned()
            .ok_or_else(|| MechanismError::MissingInformation("secret".into()))?;
        if encoding::try_from_base32(&secret).is_none() {
            return Err(MechanismError::InvalidInformation("secret".into()));
        }

        let issuer = match (path_issuer, params.get("issuer")) {
            (issuer, _) if !issuer.is_empty() => issuer,
            (_, Some(issuer)) if !issuer.is_empty() => issuer.clone(),
            _ => account_name.clone(),
        };

        Ok(Self {
            issuer,
            account_name,
            secret,
            algorithm: params
                .get("algorithm")
                .and_then(|a| a.parse().ok())
                .unwrap_or_default(),
            digits: number("digits")
                .filter(|d| *d == 6 || *d == 8)
                .and_then(|d| u8::try_from(d).ok())
                .unwrap_or(DEFAULT_DIGITS),
            kind,
            image_url: params.get("image").and_then(|v| encoding::decode_to_string(v)),
            background_color: params.get("b").cloned(),
        })
    }
}
