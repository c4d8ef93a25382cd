//! OAuth2 against AM's authorization server.
//!
//! AM lets a public client turn an SSO token into OAuth2 tokens without a browser: the authorize
//! endpoint accepts the SSO token as a query parameter named after the session cookie and answers
//! with a redirect carrying the authorization code. The code is then redeemed with PKCE.

use std::sync::Arc;

use frauth_transport::{Action, ActionType, Method, Request, Response, Transport};
use frauth_types::{crypto::sha256, encoding};
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use crate::{
    config::{OAuth2Config, ServerConfig},
    AccessToken, Token, TokenError, ACCEPT_API_VERSION, AUTH_API_VERSION,
};

/// The OAuth2 calls the SDK makes.
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
#[async_trait::async_trait]
pub trait OAuth2Client: Send + Sync {
    /// Exchange an SSO token for an OAuth2 token set.
    async fn exchange_token(&self, session_token: &Token) -> Result<AccessToken, TokenError>;

    /// Refresh a token set with its refresh token.
    async fn refresh(&self, token: &AccessToken) -> Result<AccessToken, TokenError>;

    /// Revoke the refresh token of a set, or its access token when there is none.
    async fn revoke(&self, token: &AccessToken) -> Result<(), TokenError>;

    /// End the OIDC session the id token belongs to.
    async fn end_session(&self, id_token: &str) -> Result<(), TokenError>;

    /// Fetch the claims of the token's user.
    async fn user_info(&self, token: &AccessToken) -> Result<Value, TokenError>;
}

/// PKCE parameters of one authorization request.
#[derive(Debug, Clone)]
pub(crate) struct Pkce {
    pub(crate) code_verifier: String,
    pub(crate) code_challenge: String,
    pub(crate) state: String,
}

impl Pkce {
    pub(crate) fn new() -> Self {
        let code_verifier = format!(
            "{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        );
        let code_challenge = encoding::base64url(&sha256(code_verifier.as_bytes()));
        Self {
            code_verifier,
            code_challenge,
            state: Uuid::new_v4().simple().to_string(),
        }
    }
}

/// [`OAuth2Client`] speaking to AM through a [`Transport`].
pub struct AmOAuth2Client {
    server: ServerConfig,
    config: OAuth2Config,
    transport: Arc<dyn Transport>,
}

impl AmOAuth2Client {
    #[allow(missing_docs)]
    pub fn new(server: ServerConfig, config: OAuth2Config, transport: Arc<dyn Transport>) -> Self {
        Self {
            server,
            config,
            transport,
        }
    }

    #[allow(missing_docs)]
    pub fn config(&self) -> &OAuth2Config {
        &self.config
    }

    /// Read the authorization code out of the authorize redirect.
    fn authorization_code(&self, response: &Response, state: &str) -> Result<String, TokenError> {
        let location = response
            .header("Location")
            .ok_or_else(|| TokenError::Exchange("authorize response has no redirect".into()))?;
        let location = Url::parse(location)
            .map_err(|e| TokenError::Exchange(format!("invalid authorize redirect: {e}")))?;
        let param = |name: &str| {
            location
                .query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };

        if let Some(error) = param("error") {
            let description = param("error_description").unwrap_or_default();
            return Err(TokenError::Exchange(format!("{error}: {description}")));
        }
        if param("state").is_some_and(|returned| returned != state) {
            return Err(TokenError::Exchange("authorize state mismatch".into()));
        }
        param("code").ok_or_else(|| TokenError::Exchange("authorize redirect has no code".into()))
    }

    async fn token_request(
        &self,
        form: Vec<(&str, String)>,
        action: ActionType,
    ) -> Result<AccessToken, TokenError> {
        let request = Request::new(Method::Post, self.server.token_url.as_str())
            .header(ACCEPT_API_VERSION, AUTH_API_VERSION)
            .form(form)
            .timeout(self.server.timeout);
        let response = self.transport.invoke(request, Action::new(action)).await?;
        let body = response
            .body
            .ok_or_else(|| TokenError::Exchange("empty token response".into()))?;
        AccessToken::from_token_response(&body)
    }
}

#[async_trait::async_trait]
impl OAuth2Client for AmOAuth2Client {
    async fn exchange_token(&self, session_token: &Token) -> Result<AccessToken, TokenError> {
        log::debug!("Exchanging SSO token for OAuth2 tokens");
        let pkce = Pkce::new();
        let request = Request::new(Method::Get, self.server.authorize_url.as_str())
            .header(ACCEPT_API_VERSION, AUTH_API_VERSION)
            .param("response_type", "code")
            .param(self.server.cookie_name.as_str(), session_token.value())
            .param("client_id", self.config.client_id.as_str())
            .param("scope", self.config.scope.as_str())
            .param("redirect_uri", self.config.redirect_uri.as_str())
            .param("state", pkce.state.as_str())
            .param("code_challenge", pkce.code_challenge.as_str())
            .param("code_challenge_method", "S256")
            .timeout(self.server.timeout);
        let response = self
            .transport
            .invoke(request, Action::new(ActionType::Authorize))
            .await?;
        let code = self.authorization_code(&response, &pkce.state)?;

        self.token_request(
            vec![
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.clone()),
                ("client_id", self.config.client_id.clone()),
                ("grant_type", "authorization_code".to_owned()),
                ("code_verifier", pkce.code_verifier),
            ],
            ActionType::ExchangeToken,
        )
        .await
    }

    async fn refresh(&self, token: &AccessToken) -> Result<AccessToken, TokenError> {
        let refresh_token = token.refresh_token.clone().ok_or(TokenError::NullToken)?;
        log::debug!("Refreshing OAuth2 tokens");
        let mut refreshed = self
            .token_request(
                vec![
                    ("grant_type", "refresh_token".to_owned()),
                    ("refresh_token", refresh_token.clone()),
                    ("client_id", self.config.client_id.clone()),
                    ("scope", self.config.scope.clone()),
                ],
                ActionType::RefreshToken,
            )
            .await?;
        refreshed.refresh_token.get_or_insert(refresh_token);
        Ok(refreshed)
    }

    async fn revoke(&self, token: &AccessToken) -> Result<(), TokenError> {
        let revoked = token.refresh_token.as_deref().unwrap_or(&token.value);
        let request = Request::new(Method::Post, self.server.revoke_url.as_str())
            .header(ACCEPT_API_VERSION, AUTH_API_VERSION)
            .form([("token", revoked), ("client_id", self.config.client_id.as_str())])
            .timeout(self.server.timeout);
        self.transport
            .invoke(request, Action::new(ActionType::RevokeToken))
            .await?;
        Ok(())
    }

    async fn end_session(&self, id_token: &str) -> Result<(), TokenError> {
        let request = Request::new(Method::Get, self.server.end_session_url.as_str())
            .header(ACCEPT_API_VERSION, AUTH_API_VERSION)
            .param("client_id", self.config.client_id.as_str())
            .param("id_token_hint", id_token)
            .timeout(self.server.timeout);
        self.transport
            .invoke(request, Action::new(ActionType::EndSession))
            .await?;
        Ok(())
    }

    async fn user_info(&self, token: &AccessToken) -> Result<Value, TokenError> {
        let request = Request::new(Method::Get, self.server.userinfo_url.as_str())
            .header("Authorization", token.authorization_header())
            .timeout(self.server.timeout);
        let response = self
            .transport
            .invoke(request, Action::new(ActionType::UserInfo))
            .await?;
        response
            .body
            .ok_or_else(|| TokenError::Exchange("empty userinfo response".into()))
    }
}
