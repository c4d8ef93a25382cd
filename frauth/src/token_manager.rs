use std::{sync::Arc, time::Duration};

use crate::{oauth2::OAuth2Client, storage::TokenStore, AccessToken, TokenError};

/// Owns the lifecycle of the stored OAuth2 token set.
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
#[async_trait::async_trait]
pub trait TokenManager: Send + Sync {
    /// The stored token set, refreshed first when it is about to expire.
    async fn access_token(&self) -> Result<AccessToken, TokenError>;

    /// Revoke the stored token set and forget it.
    async fn revoke(&self) -> Result<(), TokenError>;

    /// Revoke the stored token set, end its OIDC session and forget it.
    async fn revoke_and_end_session(&self) -> Result<(), TokenError>;
}

/// [`TokenManager`] on top of an [`OAuth2Client`] and a [`TokenStore`].
pub struct DefaultTokenManager {
    client: Arc<dyn OAuth2Client>,
    store: TokenStore,
    threshold: Duration,
}

impl DefaultTokenManager {
    /// Tokens expiring within `threshold` are refreshed before being handed out.
    pub fn new(client: Arc<dyn OAuth2Client>, store: TokenStore, threshold: Duration) -> Self {
        Self {
            client,
            store,
            threshold,
        }
    }

    fn stored(&self) -> Result<AccessToken, TokenError> {
        self.store.access_token()?.ok_or(TokenError::NullToken)
    }
}

#[async_trait::async_trait]
impl TokenManager for DefaultTokenManager {
    async fn access_token(&self) -> Result<AccessToken, TokenError> {
        let token = self.stored()?;
        if !token.will_expire_in(self.threshold) {
            return Ok(token);
        }
        log::debug!("Access token expires within {:?}, refreshing", self.threshold);
        let refreshed = self.client.refresh(&token).await?;
        self.store.set_access_token(&refreshed)?;
        Ok(refreshed)
    }

    async fn revoke(&self) -> Result<(), TokenError> {
        let token = self.stored()?;
        self.store.clear_access_token()?;
        self.client.revoke(&token).await
    }

    async fn revoke_and_end_session(&self) -> Result<(), TokenError> {
        let token = self.stored()?;
        self.store.clear_access_token()?;

        let revoke = self.client.revoke(&token);
        let end_session = async {
            match &token.id_token {
                Some(id_token) => self.client.end_session(id_token).await,
                None => Ok(()),
            }
        };
        let (revoked, ended) = futures::join!(revoke, end_session);
        if let Err(e) = &revoked {
            log::error!("Failed to revoke access token: {e}");
        }
        if let Err(e) = &ended {
            log::error!("Failed to end OIDC session: {e}");
        }
        revoked.and(ended)
    }
}
