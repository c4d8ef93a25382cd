use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use frauth_types::{crypto, encoding};
use serde::{Deserialize, Serialize};
use url::Url;
use zeroize::Zeroizing;

use super::OathRegistrationUri;
use crate::MechanismError;

pub(crate) const DEFAULT_DIGITS: u8 = 6;
pub(crate) const DEFAULT_PERIOD: u32 = 30;

/// HMAC algorithm of an OATH mechanism.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OathAlgorithm {
    #[default]
    #[allow(missing_docs)]
    Sha1,
    #[allow(missing_docs)]
    Sha256,
    #[allow(missing_docs)]
    Sha512,
}

impl OathAlgorithm {
    fn hmac(self, key: &[u8], data: &[u8]) -> Vec<u8> {
        match self {
            OathAlgorithm::Sha1 => crypto::hmac_sha1(key, data),
            OathAlgorithm::Sha256 => crypto::hmac_sha256(key, data).to_vec(),
            OathAlgorithm::Sha512 => crypto::hmac_sha512(key, data),
        }
    }
}

/// The moving factor of an OATH mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OathKind {
    /// Event based: the counter moves on every generated code.
    Hotp {
        #[allow(missing_docs)]
        counter: u64,
    },
    /// Time based: a new code every `period` seconds.
    Totp {
        #[allow(missing_docs)]
        period: u32,
    },
}

impl OathKind {
    /// `hotp` or `totp`.
    pub fn as_str(&self) -> &'static str {
        match self {
            OathKind::Hotp { .. } => "hotp",
            OathKind::Totp { .. } => "totp",
        }
    }
}

/// A registered HOTP or TOTP second factor.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OathMechanism {
    #[serde(rename = "mechanismUID")]
    #[allow(missing_docs)]
    pub mechanism_uuid: String,
    #[allow(missing_docs)]
    pub issuer: String,
    #[allow(missing_docs)]
    pub account_name: String,
    secret: Zeroizing<String>,
    #[allow(missing_docs)]
    pub algorithm: OathAlgorithm,
    /// Length of the generated codes, 6 or 8.
    pub digits: u8,
    #[allow(missing_docs)]
    #[serde(flatten)]
    pub kind: OathKind,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[allow(missing_docs)]
    pub time_added: DateTime<Utc>,
}

impl fmt::Debug for OathMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OathMechanism")
            .field("mechanism_uuid", &self.mechanism_uuid)
            .field("issuer", &self.issuer)
            .field("account_name", &self.account_name)
            .field("algorithm", &self.algorithm)
            .field("digits", &self.digits)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl From<&OathRegistrationUri> for OathMechanism {
    fn from(uri: &OathRegistrationUri) -> Self {
        Self::new(
            &uri.issuer,
            &uri.account_name,
            uri.secret.clone(),
            uri.algorithm,
            uri.digits,
            uri.kind,
        )
    }
}

impl OathMechanism {
    /// A mechanism added now. `secret` is base32 encoded.
    pub fn new(
        issuer: impl Into<String>,
        account_name: impl Into<String>,
        secret: String,
        algorithm: OathAlgorithm,
        digits: u8,
        kind: OathKind,
    ) -> Self {
        Self {
            mechanism_uuid: uuid::Uuid::new_v4().to_string().to_uppercase(),
            issuer: issuer.into(),
            account_name: account_name.into(),
            secret: Zeroizing::new(secret),
            algorithm,
            digits,
            kind,
            time_added: Utc::now().trunc_subsecs(3),
        }
    }

    /// `<issuer>-<accountName>-<hotp|totp>`
    pub fn identifier(&self) -> String {
        format!(
            "{}-{}-{}",
            self.issuer,
            self.account_name,
            self.kind.as_str()
        )
    }

    /// Identifier of the owning [`Account`](crate::Account).
    pub fn account_identifier(&self) -> String {
        format!("{}-{}", self.issuer, self.account_name)
    }

    /// The code for `now`. An HOTP mechanism moves its counter forward; persisting it is up to
    /// the caller.
    pub fn generate_code_at(&mut self, now: DateTime<Utc>) -> Result<OathTokenCode, MechanismError> {
        let key = encoding::try_from_base32(&self.secret)
            .ok_or_else(|| MechanismError::InvalidInformation("secret".into()))?;
        let token_type = self.kind.as_str();
        match &mut self.kind {
            OathKind::Hotp { counter } => {
                let code = generate_otp(&key, self.algorithm, *counter, self.digits);
                *counter += 1;
                Ok(OathTokenCode {
                    token_type,
                    code,
                    start: now,
                    until: None,
                })
            }
            OathKind::Totp { period } => {
                if *period == 0 {
                    return Err(MechanismError::InvalidInformation("period".into()));
                }
                let period = i64::from(*period);
                let step = now.timestamp().div_euclid(period);
                let counter = u64::try_from(step)
                    .map_err(|_| MechanismError::InvalidInformation("time".into()))?;
                let window = |secs: i64| {
                    DateTime::from_timestamp(secs, 0)
                        .ok_or_else(|| MechanismError::InvalidInformation("time".into()))
                };
                Ok(OathTokenCode {
                    token_type,
                    code: generate_otp(&key, self.algorithm, counter, self.digits),
                    start: window(step * period)?,
                    until: Some(window((step + 1) * period)?),
                })
            }
        }
    }

    /// Render the mechanism back as the `otpauth://` URI it was registered from.
    pub fn to_uri(&self, image_url: Option<&str>) -> Result<Url, MechanismError> {
        let mut uri = Url::parse(&format!("otpauth://{}", self.kind.as_str()))
            .map_err(|e| MechanismError::InvalidInformation(e.to_string()))?;
        if self.issuer.is_empty() {
            uri.set_path(&format!("/{}", self.account_name));
        } else {
            uri.set_path(&format!("/{}:{}", self.issuer, self.account_name));
        }
        {
            let mut query = uri.query_pairs_mut();
            query
                .append_pair("secret", &self.secret)
                .append_pair("digits", &self.digits.to_string())
                .append_pair("algorithm", self.algorithm.into());
            if let Some(image) = image_url {
                query.append_pair("image", &encoding::base64url(image.as_bytes()));
            }
            if !self.issuer.is_empty() {
                query.append_pair("issuer", &self.issuer);
            }
            match self.kind {
                OathKind::Hotp { counter } => query.append_pair("counter", &counter.to_string()),
                OathKind::Totp { period } => query.append_pair("period", &period.to_string()),
            };
        }
        Ok(uri)
    }
}

/// RFC 4226 code for `counter`, zero padded to `digits`.
pub(crate) fn generate_otp(key: &[u8], algorithm: OathAlgorithm, counter: u64, digits: u8) -> String {
    let mac = algorithm.hmac(key, &counter.to_be_bytes());
    let offset = usize::from(mac[mac.len() - 1] & 0x0f);
    let binary = u32::from_be_bytes([mac[offset], mac[offset + 1], mac[offset + 2], mac[offset + 3]])
        & 0x7fff_ffff;
    let code = binary % 10u32.pow(u32::from(digits));
    format!("{code:0width$}", width = usize::from(digits))
}

/// A generated one time password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OathTokenCode {
    /// `hotp` or `totp`.
    pub token_type: &'static str,
    #[allow(missing_docs)]
    pub code: String,
    /// When the code was generated, or when its TOTP window opened.
    pub start: DateTime<Utc>,
    /// End of the TOTP window. HOTP codes don't expire.
    pub until: Option<DateTime<Utc>>,
}

impl OathTokenCode {
    /// Whether the code can still be used at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.until {
            Some(until) => self.start <= now && now < until,
            None => true,
        }
    }

    #[allow(missing_docs)]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// How far through its window a TOTP code is at `now`, from 0.0 to 1.0. Always 0.0 for HOTP.
    pub fn progress_at(&self, now: DateTime<Utc>) -> f64 {
        let Some(until) = self.until else {
            return 0.0;
        };
        if now <= self.start {
            return 0.0;
        }
        if now >= until {
            return 1.0;
        }
        let elapsed = (now - self.start).num_milliseconds();
        let duration = (until - self.start).num_milliseconds();
        // Windows are at most a few minutes long, well within f64 precision.
        f64::from(i32::try_from(elapsed).unwrap_or(i32::MAX))
            / f64::from(i32::try_from(duration).unwrap_or(i32::MAX))
    }
}
