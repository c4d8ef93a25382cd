//! # frauth Transport
//!
//! The seam between the SDK's protocol logic and the network. Everything that talks to AM goes
//! through a [`Transport`]: tree submissions, OAuth2 calls and push requests. The crate provides:
//!
//! - [`Request`]/[`Response`]: a transport agnostic request description and its parsed result.
//! - [`Action`]: the protocol step a request is made for, given to [`RequestInterceptor`]s.
//! - [`InterceptingTransport`]: applies interceptors in registration order.
//! - [`HttpTransport`]: the default implementation on top of `reqwest`.

use std::sync::Arc;

use serde_json::Value;

mod action;
mod http;
mod interceptor;
mod request;

pub use self::{
    action::{Action, ActionType},
    http::HttpTransport,
    interceptor::{InterceptingTransport, RequestInterceptor},
    request::{Body, Method, Request, Response, DEFAULT_TIMEOUT},
};

#[cfg(any(test, feature = "testable"))]
pub use self::interceptor::MockRequestInterceptor;

/// Errors produced while executing a [`Request`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// The request could not be turned into an HTTP request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Connection, TLS or timeout failure.
    #[error("network failure: {0}")]
    Network(String),
    /// The server answered with a status of 400 or above.
    #[error("server responded with status {status}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// The parsed error body, if the server sent JSON.
        body: Option<Value>,
    },
    /// The response could not be read.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    /// The `message` AM puts into its JSON error bodies, if present.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            TransportError::Api {
                body: Some(body), ..
            } => body.get("message").and_then(Value::as_str),
            _ => None,
        }
    }
}

/// Executes requests on behalf of the SDK.
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the server response, or the failure.
    async fn invoke(&self, request: Request, action: Action) -> Result<Response, TransportError>;
}

#[async_trait::async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn invoke(&self, request: Request, action: Action) -> Result<Response, TransportError> {
        (**self).invoke(request, action).await
    }
}
