//! The SDK's session state.
//!
//! A [`SessionContext`] is created once at startup and passed to every flow. It owns the
//! collaborators (transport, store, OAuth2 client, token manager) and the process-wide current
//! session: the stored SSO token, the stored OAuth2 token set and the cached [`User`].
//!
//! When a tree finishes, the new SSO token is reconciled with what is already stored. If OAuth2
//! tokens exist that were not issued for the new session they are revoked, unless the tree was
//! entered for composite advice and there is no SSO token to compare against: that is a step-up
//! inside the existing OAuth2 session, not a new login.

use std::sync::{Arc, Mutex, PoisonError};

use frauth_transport::{Action, ActionType, Method, Request, Transport};
use frauth_types::storage::KeyValueStore;
use serde_json::{json, Value};

use crate::{
    callback::CallbackRegistry,
    config::{Config, ServerConfig},
    node::{AuthIndexType, AuthService, DesiredResult, FlowResult},
    oauth2::{AmOAuth2Client, OAuth2Client},
    storage::TokenStore,
    token_manager::{DefaultTokenManager, TokenManager},
    AccessToken, AuthError, Token, ACCEPT_API_VERSION, AUTH_API_VERSION,
};

/// An authenticated user: the SSO token and the OAuth2 tokens issued for it.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    #[allow(missing_docs)]
    pub session_token: Token,
    #[allow(missing_docs)]
    pub access_token: AccessToken,
}

/// Collaborators and current session of the SDK.
pub struct SessionContext {
    server: ServerConfig,
    transport: Arc<dyn Transport>,
    store: TokenStore,
    registry: CallbackRegistry,
    oauth2_client: Option<Arc<dyn OAuth2Client>>,
    token_manager: Option<Arc<dyn TokenManager>>,
    current_user: Mutex<Option<User>>,
}

impl SessionContext {
    /// A context without OAuth2 support: trees end in SSO tokens only.
    pub fn new(server: ServerConfig, transport: Arc<dyn Transport>, kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            server,
            transport,
            store: TokenStore::new(kv),
            registry: CallbackRegistry::new(),
            oauth2_client: None,
            token_manager: None,
            current_user: Mutex::new(None),
        }
    }

    /// A context for `config`, with the AM OAuth2 client and token manager when the
    /// configuration has OAuth2 settings.
    pub fn from_config(config: &Config, transport: Arc<dyn Transport>, kv: Arc<dyn KeyValueStore>) -> Self {
        let context = Self::new(config.server(), transport, kv);
        let Some(oauth2) = config.oauth2() else {
            log::debug!("No OAuth2 client configured");
            return context;
        };
        let threshold = oauth2.threshold;
        let client: Arc<dyn OAuth2Client> = Arc::new(AmOAuth2Client::new(
            context.server.clone(),
            oauth2,
            context.transport.clone(),
        ));
        let manager = DefaultTokenManager::new(client.clone(), context.store.clone(), threshold);
        context
            .with_oauth2_client(client)
            .with_token_manager(Arc::new(manager))
    }

    #[allow(missing_docs)]
    pub fn with_oauth2_client(mut self, client: Arc<dyn OAuth2Client>) -> Self {
        self.oauth2_client = Some(client);
        self
    }

    #[allow(missing_docs)]
    pub fn with_token_manager(mut self, manager: Arc<dyn TokenManager>) -> Self {
        self.token_manager = Some(manager);
        self
    }

    /// Decode callbacks with `registry`, e.g. one with custom callbacks registered.
    pub fn with_registry(mut self, registry: CallbackRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[allow(missing_docs)]
    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub(crate) fn registry(&self) -> &CallbackRegistry {
        &self.registry
    }

    /// The stored SSO token.
    pub fn session_token(&self) -> Result<Option<Token>, AuthError> {
        Ok(self.store.session_token()?)
    }

    /// Replace the stored SSO token.
    pub fn set_session_token(&self, token: &Token) -> Result<(), AuthError> {
        Ok(self.store.set_session_token(token)?)
    }

    /// The stored OAuth2 token set, as is.
    pub fn access_token(&self) -> Result<Option<AccessToken>, AuthError> {
        Ok(self.store.access_token()?)
    }

    /// Replace the stored OAuth2 token set.
    pub fn set_access_token(&self, token: &AccessToken) -> Result<(), AuthError> {
        Ok(self.store.set_access_token(token)?)
    }

    /// The stored OAuth2 token set, refreshed first when it is about to expire.
    pub async fn valid_access_token(&self) -> Result<AccessToken, AuthError> {
        match &self.token_manager {
            Some(manager) => Ok(manager.access_token().await?),
            None => self.access_token()?.ok_or(AuthError::UserAuthenticationRequired),
        }
    }

    /// The cached user, if a flow produced one.
    pub fn current_user(&self) -> Option<User> {
        self.user_slot().clone()
    }

    #[allow(missing_docs)]
    pub fn set_current_user(&self, user: Option<User>) {
        *self.user_slot() = user;
    }

    fn user_slot(&self) -> std::sync::MutexGuard<'_, Option<User>> {
        self.current_user
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// A flow that registers a new user with `tree`.
    ///
    /// Fails when a user is already authenticated.
    pub fn registration(&self, tree: impl Into<String>) -> Result<AuthService, AuthError> {
        if self.current_user().is_some() {
            return Err(AuthError::UserAlreadyAuthenticated);
        }
        Ok(AuthService::new(tree, AuthIndexType::Service))
    }

    /// Claims of the current user from the userinfo endpoint.
    pub async fn user_info(&self) -> Result<Value, AuthError> {
        let client = self
            .oauth2_client
            .as_ref()
            .ok_or(AuthError::InvalidOAuth2Client)?;
        let token = self.valid_access_token().await?;
        Ok(client.user_info(&token).await?)
    }

    /// Persist the SSO token a tree ended with, revoking OAuth2 tokens it does not belong to.
    pub(crate) async fn reconcile(
        &self,
        token: &Token,
        index_type: &AuthIndexType,
    ) -> Result<(), AuthError> {
        let current = self.store.session_token()?;
        let has_access_token = self.store.access_token()?.is_some();

        if current.is_none() && has_access_token && *index_type == AuthIndexType::CompositeAdvice {
            log::debug!("Composite advice completed inside the current OAuth2 session");
        } else if has_access_token && current.as_ref().map(Token::value) != Some(token.value()) {
            log::warn!("SSO token changed while OAuth2 tokens exist, revoking them");
            self.revoke_stale_tokens().await;
        }

        self.store.set_session_token(token)?;
        Ok(())
    }

    async fn revoke_stale_tokens(&self) {
        match &self.token_manager {
            Some(manager) => {
                if let Err(e) = manager.revoke_and_end_session().await {
                    log::error!("Failed to revoke stale OAuth2 tokens: {e}");
                }
            }
            None => {
                if let Err(e) = self.store.clear_access_token() {
                    log::error!("Failed to remove stale OAuth2 tokens: {e}");
                }
            }
        }
        self.set_current_user(None);
    }

    /// Turn the SSO token a tree ended with into the result the caller asked for.
    pub(crate) async fn deliver(
        &self,
        token: Token,
        desired: DesiredResult,
    ) -> Result<FlowResult, AuthError> {
        if desired == DesiredResult::SessionToken {
            return Ok(FlowResult::SessionToken(token));
        }

        let client = self
            .oauth2_client
            .as_ref()
            .ok_or(AuthError::InvalidOAuth2Client)?;
        let access_token = client.exchange_token(&token).await?;
        if let Err(e) = self.store.set_access_token(&access_token) {
            log::error!("Failed to store OAuth2 tokens: {e}");
        }

        if desired == DesiredResult::AccessToken {
            return Ok(FlowResult::AccessToken(access_token));
        }
        let user = User {
            session_token: token,
            access_token,
        };
        self.set_current_user(Some(user.clone()));
        Ok(FlowResult::User(user))
    }

    /// What the caller asked for, if it is already at hand.
    pub(crate) fn cached(&self, desired: DesiredResult) -> Result<Option<FlowResult>, AuthError> {
        Ok(match desired {
            DesiredResult::User => self.current_user().map(FlowResult::User),
            DesiredResult::AccessToken => self.access_token()?.map(FlowResult::AccessToken),
            DesiredResult::SessionToken => None,
        })
    }

    /// Log the current session out of AM and forget it.
    ///
    /// Every step is attempted even when an earlier one fails; failures are logged.
    pub async fn logout(&self) -> Result<(), AuthError> {
        if let Some(token) = self.store.session_token()? {
            let request = Request::new(Method::Post, self.server.sessions_url.as_str())
                .header(ACCEPT_API_VERSION, AUTH_API_VERSION)
                .header(self.server.cookie_name.as_str(), token.value())
                .param("_action", "logout")
                .json(json!({}))
                .timeout(self.server.timeout);
            if let Err(e) = self
                .transport
                .invoke(request, Action::new(ActionType::Logout))
                .await
            {
                log::error!("Failed to log out the SSO session: {e}");
            }
        }
        if let Some(manager) = &self.token_manager {
            if let Err(e) = manager.revoke_and_end_session().await {
                log::error!("Failed to revoke OAuth2 tokens: {e}");
            }
        }
        self.clear()
    }

    /// Forget the current session without telling AM.
    pub fn clear(&self) -> Result<(), AuthError> {
        self.set_current_user(None);
        self.store.clear_session_token()?;
        self.store.clear_access_token()?;
        Ok(())
    }
}
