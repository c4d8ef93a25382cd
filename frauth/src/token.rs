use std::{fmt, time::Duration};

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::TokenError;

/// An SSO token issued by AM at the end of a tree.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    value: String,
    /// The URL AM redirects to after login, if the tree set one.
    #[serde(rename = "successUrl", default, skip_serializing_if = "Option::is_none")]
    pub success_url: Option<String>,
    /// The realm the session lives in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
}

impl Token {
    #[allow(missing_docs)]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            success_url: None,
            realm: None,
        }
    }

    /// Read the terminal response of a tree, `{"tokenId": .., "successUrl": .., "realm": ..}`.
    pub(crate) fn from_response(body: &Value) -> Option<Self> {
        let value = body.get("tokenId")?.as_str()?;
        let field = |name: &str| body.get(name).and_then(Value::as_str).map(str::to_owned);
        Some(Self {
            value: value.to_owned(),
            success_url: field("successUrl"),
            realm: field("realm"),
        })
    }

    /// The token itself.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"<redacted>")
            .field("success_url", &self.success_url)
            .field("realm", &self.realm)
            .finish()
    }
}

/// An OAuth2 token set obtained from the token endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    /// The access token.
    pub value: String,
    /// Usually `Bearer`.
    pub token_type: String,
    /// Space separated scopes granted.
    pub scope: String,
    /// Lifetime in seconds, counted from [`auth_time`](Self::auth_time).
    pub expires_in: i64,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// When the token was received.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub auth_time: DateTime<Utc>,
}

impl AccessToken {
    /// Read a token endpoint response.
    ///
    /// `access_token`, `scope`, `expires_in` and `token_type` are required.
    pub fn from_token_response(body: &Value) -> Result<Self, TokenError> {
        let required = |name: &str| {
            body.get(name)
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| TokenError::Exchange(format!("token response is missing {name}")))
        };
        let optional = |name: &str| body.get(name).and_then(Value::as_str).map(str::to_owned);
        let expires_in = body
            .get("expires_in")
            .and_then(Value::as_i64)
            .ok_or_else(|| TokenError::Exchange("token response is missing expires_in".into()))?;
        Ok(Self {
            value: required("access_token")?,
            token_type: required("token_type")?,
            scope: required("scope")?,
            expires_in,
            refresh_token: optional("refresh_token"),
            id_token: optional("id_token"),
            auth_time: Utc::now().trunc_subsecs(3),
        })
    }

    /// When the token stops being valid.
    pub fn expires_at(&self) -> DateTime<Utc> {
        chrono::Duration::try_seconds(self.expires_in)
            .and_then(|lifetime| self.auth_time.checked_add_signed(lifetime))
            .unwrap_or(self.auth_time)
    }

    /// Whether the token expires within `threshold` from now.
    pub fn will_expire_in(&self, threshold: Duration) -> bool {
        chrono::Duration::from_std(threshold)
            .ok()
            .and_then(|threshold| Utc::now().checked_add_signed(threshold))
            .map_or(true, |deadline| deadline >= self.expires_at())
    }

    #[allow(missing_docs)]
    pub fn is_expired(&self) -> bool {
        self.will_expire_in(Duration::ZERO)
    }

    /// The value of an `Authorization` header.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.value)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("expires_in", &self.expires_in)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("has_id_token", &self.id_token.is_some())
            .field("auth_time", &self.auth_time)
            .finish()
    }
}
