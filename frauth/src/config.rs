//! SDK configuration.
//!
//! [`Config`] reads the same keys as the SDK's property list, so an app can ship one JSON file:
//!
//! ```json
//! {
//!     "forgerock_url": "https://openam.example.com/openam",
//!     "forgerock_realm": "alpha",
//!     "forgerock_auth_service_name": "Login",
//!     "forgerock_oauth_client_id": "iosClient",
//!     "forgerock_oauth_redirect_uri": "frauth://oauth2redirect",
//!     "forgerock_oauth_scope": "openid profile"
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_REALM: &str = "root";
const DEFAULT_COOKIE_NAME: &str = "iPlanetDirectoryPro";
const DEFAULT_TIMEOUT: u64 = 60;
const DEFAULT_THRESHOLD: u64 = 60;

fn default_realm() -> String {
    DEFAULT_REALM.into()
}

fn default_cookie_name() -> String {
    DEFAULT_COOKIE_NAME.into()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT
}

fn default_threshold() -> u64 {
    DEFAULT_THRESHOLD
}

/// The SDK option set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of AM, e.g. `https://openam.example.com/openam`.
    #[serde(rename = "forgerock_url")]
    pub url: String,

    #[allow(missing_docs)]
    #[serde(rename = "forgerock_realm", default = "default_realm")]
    pub realm: String,

    /// Request timeout in seconds.
    #[serde(rename = "forgerock_timeout", default = "default_timeout")]
    pub timeout: u64,

    /// Name of AM's session cookie.
    #[serde(rename = "forgerock_cookie_name", default = "default_cookie_name")]
    pub cookie_name: String,

    /// Tree used to log in.
    #[serde(rename = "forgerock_auth_service_name", default)]
    pub auth_service_name: Option<String>,

    /// Tree used to register a user.
    #[serde(rename = "forgerock_registration_service_name", default)]
    pub registration_service_name: Option<String>,

    #[allow(missing_docs)]
    #[serde(rename = "forgerock_oauth_client_id", default)]
    pub oauth_client_id: Option<String>,

    #[allow(missing_docs)]
    #[serde(rename = "forgerock_oauth_redirect_uri", default)]
    pub oauth_redirect_uri: Option<String>,

    /// Space separated scopes.
    #[serde(rename = "forgerock_oauth_scope", default)]
    pub oauth_scope: Option<String>,

    /// Seconds before expiry at which an access token is considered expired.
    #[serde(rename = "forgerock_oauth_threshold", default = "default_threshold")]
    pub oauth_threshold: u64,

    /// Overrides `/json/realms/{realm}/authenticate`.
    #[serde(rename = "forgerock_authenticate_endpoint", default)]
    pub authenticate_endpoint: Option<String>,

    /// Overrides `/oauth2/realms/{realm}/authorize`.
    #[serde(rename = "forgerock_authorize_endpoint", default)]
    pub authorize_endpoint: Option<String>,

    /// Overrides `/oauth2/realms/{realm}/access_token`.
    #[serde(rename = "forgerock_token_endpoint", default)]
    pub token_endpoint: Option<String>,

    /// Overrides `/oauth2/realms/{realm}/token/revoke`.
    #[serde(rename = "forgerock_revoke_endpoint", default)]
    pub revoke_endpoint: Option<String>,

    /// Overrides `/oauth2/realms/{realm}/userinfo`.
    #[serde(rename = "forgerock_userinfo_endpoint", default)]
    pub userinfo_endpoint: Option<String>,

    /// Overrides `/oauth2/realms/{realm}/connect/endSession`.
    #[serde(rename = "forgerock_endsession_endpoint", default)]
    pub end_session_endpoint: Option<String>,

    /// Overrides `/json/realms/{realm}/sessions`.
    #[serde(rename = "forgerock_session_endpoint", default)]
    pub session_endpoint: Option<String>,
}

impl Config {
    /// A configuration for `url` with every other option at its default.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            realm: default_realm(),
            timeout: DEFAULT_TIMEOUT,
            cookie_name: default_cookie_name(),
            auth_service_name: None,
            registration_service_name: None,
            oauth_client_id: None,
            oauth_redirect_uri: None,
            oauth_scope: None,
            oauth_threshold: DEFAULT_THRESHOLD,
            authenticate_endpoint: None,
            authorize_endpoint: None,
            token_endpoint: None,
            revoke_endpoint: None,
            userinfo_endpoint: None,
            end_session_endpoint: None,
            session_endpoint: None,
        }
    }

    /// Read a configuration from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The endpoints derived from this configuration.
    pub fn server(&self) -> ServerConfig {
        let base = self.url.trim_end_matches('/');
        let realm = &self.realm;
        let endpoint = |custom: &Option<String>, path: String| {
            custom
                .as_deref()
                .map(|custom| format!("{base}/{}", custom.trim_start_matches('/')))
                .unwrap_or_else(|| format!("{base}/{path}"))
        };
        ServerConfig {
            url: base.to_owned(),
            realm: realm.clone(),
            timeout: Duration::from_secs(self.timeout),
            cookie_name: self.cookie_name.clone(),
            authenticate_url: endpoint(
                &self.authenticate_endpoint,
                format!("json/realms/{realm}/authenticate"),
            ),
            authorize_url: endpoint(
                &self.authorize_endpoint,
                format!("oauth2/realms/{realm}/authorize"),
            ),
            token_url: endpoint(
                &self.token_endpoint,
                format!("oauth2/realms/{realm}/access_token"),
            ),
            revoke_url: endpoint(
                &self.revoke_endpoint,
                format!("oauth2/realms/{realm}/token/revoke"),
            ),
            userinfo_url: endpoint(
                &self.userinfo_endpoint,
                format!("oauth2/realms/{realm}/userinfo"),
            ),
            end_session_url: endpoint(
                &self.end_session_endpoint,
                format!("oauth2/realms/{realm}/connect/endSession"),
            ),
            sessions_url: endpoint(
                &self.session_endpoint,
                format!("json/realms/{realm}/sessions"),
            ),
        }
    }

    /// The OAuth2 client settings, when all of client id, redirect URI and scope are present.
    pub fn oauth2(&self) -> Option<OAuth2Config> {
        match (
            &self.oauth_client_id,
            &self.oauth_redirect_uri,
            &self.oauth_scope,
        ) {
            (Some(client_id), Some(redirect_uri), Some(scope)) => Some(OAuth2Config {
                client_id: client_id.clone(),
                redirect_uri: redirect_uri.clone(),
                scope: scope.clone(),
                threshold: Duration::from_secs(self.oauth_threshold),
            }),
            _ => None,
        }
    }
}

/// The AM endpoints the SDK talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Base URL without a trailing slash.
    pub url: String,
    #[allow(missing_docs)]
    pub realm: String,
    #[allow(missing_docs)]
    pub timeout: Duration,
    #[allow(missing_docs)]
    pub cookie_name: String,
    /// Authentication tree endpoint.
    pub authenticate_url: String,
    #[allow(missing_docs)]
    pub authorize_url: String,
    #[allow(missing_docs)]
    pub token_url: String,
    #[allow(missing_docs)]
    pub revoke_url: String,
    #[allow(missing_docs)]
    pub userinfo_url: String,
    #[allow(missing_docs)]
    pub end_session_url: String,
    /// Session endpoint, used to log an SSO token out.
    pub sessions_url: String,
}

/// OAuth2 public client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuth2Config {
    #[allow(missing_docs)]
    pub client_id: String,
    #[allow(missing_docs)]
    pub redirect_uri: String,
    #[allow(missing_docs)]
    pub scope: String,
    /// How long before expiry an access token should be refreshed.
    pub threshold: Duration,
}
