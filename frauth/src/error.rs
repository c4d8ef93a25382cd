use frauth_transport::TransportError;
use frauth_types::storage::StorageError;

/// Errors of the authentication tree driver.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthError {
    /// The response carried an `authId` but no usable step.
    #[error("invalid AuthService response: {0}")]
    InvalidAuthServiceResponse(String),
    /// A callback in the response is malformed.
    #[error("invalid callback response: {0}")]
    InvalidCallbackResponse(String),
    /// No decoder is registered for the callback type.
    #[error("unsupported callback: {0}")]
    UnsupportedCallback(String),
    /// The response had neither an `authId` nor a `tokenId`.
    #[error("response is neither a tree step nor a session token")]
    EmptyOrUnrecognizedResponse,
    /// A user is already authenticated.
    #[error("user is already authenticated")]
    UserAlreadyAuthenticated,
    /// The operation needs an authenticated session.
    #[error("user is not authenticated")]
    UserAuthenticationRequired,
    /// An access token was requested but no OAuth2 client is configured.
    #[error("OAuth2 client is not configured")]
    InvalidOAuth2Client,
    /// Resume URI without a `suspendedId`.
    #[error("invalid resume URI: missing {0}")]
    InvalidResumeUri(String),
    #[allow(missing_docs)]
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[allow(missing_docs)]
    #[error(transparent)]
    Token(#[from] TokenError),
    /// Reading or writing the session store failed.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<StorageError> for AuthError {
    fn from(e: StorageError) -> Self {
        AuthError::Storage(e.0)
    }
}

/// Errors of the OAuth2 token lifecycle.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TokenError {
    /// There is no token to work with.
    #[error("token is missing")]
    NullToken,
    /// The authorize or token endpoint did not produce a token.
    #[error("token exchange failed: {0}")]
    Exchange(String),
    #[allow(missing_docs)]
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Reading or writing the token store failed.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<StorageError> for TokenError {
    fn from(e: StorageError) -> Self {
        TokenError::Storage(e.0)
    }
}
