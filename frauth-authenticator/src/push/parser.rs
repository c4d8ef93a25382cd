use std::str::FromStr;

use frauth_types::encoding;
use url::Url;

use crate::{
    uri::{issuer_and_label, query_params},
    MechanismError,
};

const SCHEME: &str = "pushauth";
const PUSH_TYPE: &str = "push";

/// The content of a `pushauth://push/<issuer>:<label>?...` registration QR code.
#[derive(Debug, Clone, PartialEq)]
pub struct PushRegistrationUri {
    /// Issuer, taken from the `issuer` parameter when present, else from the path.
    pub issuer: String,
    /// Account name at the issuer.
    pub account_name: String,
    /// Shared secret, base64url encoded as AM sends it.
    pub secret: String,
    /// Where the device registers itself.
    pub registration_endpoint: Url,
    /// Where notifications are answered.
    pub authentication_endpoint: Url,
    /// Message id of the registration request.
    pub message_id: String,
    /// Registration challenge, standard base64.
    pub challenge: String,
    /// Load balancer cookie, e.g. `amlbcookie=01`.
    pub load_balancer: Option<String>,
    /// Logo of the issuer.
    pub image_url: Option<String>,
    /// Hex colour code without the leading `#`.
    pub background_color: Option<String>,
    /// JSON object of policies attached to the account.
    pub policies: Option<String>,
}

impl FromStr for PushRegistrationUri {
    type Err = MechanismError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uri = Url::parse(s).map_err(|e| MechanismError::InvalidQrCode(e.to_string()))?;
        Self::try_from(&uri)
    }
}

impl TryFrom<&Url> for PushRegistrationUri {
    type Error = MechanismError;

    fn try_from(uri: &Url) -> Result<Self, Self::Error> {
        if uri.scheme() != SCHEME {
            return Err(MechanismError::InvalidQrCode(format!(
                "unexpected scheme {}",
                uri.scheme()
            )));
        }
        match uri.host_str() {
            Some(host) if host.eq_ignore_ascii_case(PUSH_TYPE) => {}
            other => {
                return Err(MechanismError::InvalidType(
                    other.unwrap_or_default().to_owned(),
                ))
            }
        }

        let (path_issuer, account_name) = issuer_and_label(uri);
        if account_name.is_empty() {
            return Err(MechanismError::MissingInformation(
                "issuer, or account name".into(),
            ));
        }

        let params = query_params(uri);
        let required = |name: &str| {
            params
                .get(name)
                .cloned()
                .ok_or_else(|| MechanismError::MissingInformation(name.to_owned()))
        };
        let secret = required("s")?;
        let registration_endpoint = endpoint(&required("r")?)?;
        let authentication_endpoint = endpoint(&required("a")?)?;
        let message_id = required("m")?;
        let challenge = encoding::url_safe_to_standard(&required("c")?);
        let load_balancer = encoding::decode_to_string(&required("l")?);

        let issuer = match params.get("issuer") {
            Some(encoded) => encoding::decode_to_string(encoded)
                .ok_or_else(|| MechanismError::InvalidInformation("issuer".into()))?,
            None => path_issuer,
        };
        let image_url = params.get("image").and_then(|v| encoding::decode_to_string(v));
        let policies = params
            .get("policies")
            .and_then(|v| encoding::decode_to_string(v));

        Ok(Self {
            issuer,
            account_name,
            secret,
            registration_endpoint,
            authentication_endpoint,
            message_id,
            challenge,
            load_balancer,
            image_url,
            background_color: params.get("b").cloned(),
            policies,
        })
    }
}

fn endpoint(encoded: &str) -> Result<Url, MechanismError> {
    encoding::decode_to_string(encoded)
        .and_then(|url| Url::parse(&url).ok())
        .ok_or_else(|| {
            MechanismError::InvalidInformation("registration and/or authentication URL".into())
        })
}
