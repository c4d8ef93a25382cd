use serde_json::Value;

/// The protocol step a [`Request`](crate::Request) is made for.
///
/// Interceptors use it to recognise which request they are looking at without parsing URLs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    /// First request of an authentication tree: `/json/realms/{realm}/authenticate`
    StartAuthenticate,
    /// Any following tree submission to the same endpoint.
    Authenticate,
    /// SSO token to authorization code: `/oauth2/realms/{realm}/authorize`
    Authorize,
    /// Authorization code to token set: `/oauth2/realms/{realm}/access_token`
    ExchangeToken,
    /// Refresh token grant on the access token endpoint.
    RefreshToken,
    /// `/oauth2/realms/{realm}/token/revoke`
    RevokeToken,
    /// `/oauth2/realms/{realm}/connect/endSession`
    EndSession,
    /// `/json/realms/{realm}/sessions?_action=logout`
    Logout,
    /// `/oauth2/realms/{realm}/userinfo`
    UserInfo,
    /// Push mechanism registration or device token refresh.
    PushRegister,
    /// Push notification accept or deny.
    PushAuthenticate,
}

/// An [`ActionType`] with optional context, e.g. the tree name for tree actions.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    /// What the request is for.
    pub ty: ActionType,
    /// Extra context an interceptor may need.
    pub payload: Option<Value>,
}

impl Action {
    /// An action without payload.
    pub fn new(ty: ActionType) -> Self {
        Self { ty, payload: None }
    }

    /// An action carrying a payload.
    pub fn with_payload(ty: ActionType, payload: Value) -> Self {
        Self {
            ty,
            payload: Some(payload),
        }
    }
}

impl From<ActionType> for Action {
    fn from(ty: ActionType) -> Self {
        Self::new(ty)
    }
}
