use reqwest::{header::ACCEPT, redirect::Policy, Url};
use serde_json::Value;

use crate::{Action, Body, Method, Request, Response, Transport, TransportError};

/// The default [`Transport`], backed by a `reqwest` client.
///
/// Redirects are never followed: the OAuth2 authorize step reads the authorization code from the
/// `Location` header of the redirect itself.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport with its own connection pool.
    pub fn new() -> Result<Self, TransportError> {
        reqwest::Client::builder()
            .redirect(Policy::none())
            .build()
            .map(|client| Self { client })
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))
    }

    /// Use an existing client. It must be configured not to follow redirects.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build(&self, request: &Request) -> Result<reqwest::Request, TransportError> {
        let mut url = Url::parse(&request.url)
            .map_err(|e| TransportError::InvalidRequest(format!("{}: {e}", request.url)))?;
        if !request.url_params.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.url_params);
        }

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self.client.request(method, url).timeout(request.timeout);
        if request.header_value(ACCEPT.as_str()).is_none() {
            builder = builder.header(ACCEPT, "application/json");
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match (&request.body, request.method) {
            (Body::Empty, _) => builder,
            (_, Method::Get | Method::Delete) => {
                log::warn!("Ignoring body parameters for {} request", request.method);
                builder
            }
            (Body::Json(json), _) => builder.json(json),
            (Body::Form(pairs), _) => builder.form(pairs),
        };

        builder
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))
    }
}

fn parse_body(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(text) {
        Ok(json) => Some(json),
        Err(e) => {
            log::debug!("Response body is not JSON: {e}");
            None
        }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn invoke(&self, request: Request, action: Action) -> Result<Response, TransportError> {
        let http_request = self.build(&request)?;
        log::debug!("[{}] {} {}", action.ty, request.method, request.url);

        let response = self
            .client
            .execute(http_request)
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_owned(), value.to_owned()))
            })
            .collect();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
        let body = parse_body(&text);

        if status >= 400 {
            log::warn!("[{}] request failed with status {status}", action.ty);
            return Err(TransportError::Api { status, body });
        }

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
