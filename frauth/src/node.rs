//! The authentication tree driver.
//!
//! A flow starts with [`AuthService::next`], which posts to AM's authenticate endpoint and gets
//! back either a [`Node`] (one step with callbacks to fill in) or a terminal SSO token. Each
//! [`Node::next`] submits the filled callbacks and gets back the same two kinds of answer, until
//! the tree ends. The caller picks the final shape with a [`DesiredResult`].

use frauth_transport::{Action, ActionType, Method, Request};
use frauth_webauthn::{Authenticator, WebAuthnClient, WebAuthnError};
use serde_json::{json, Value};
use url::Url;
use uuid::Uuid;

use crate::{
    callback::Callback, session::SessionContext, AccessToken, AuthError, Token, User,
    ACCEPT_API_VERSION, AUTH_API_VERSION,
};

/// How AM picks the tree to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthIndexType {
    /// A tree or chain by name.
    Service,
    /// An advice (transaction condition, step-up) issued by a policy.
    CompositeAdvice,
    /// Any other index type AM understands.
    Other(String),
}

impl AuthIndexType {
    /// The `authIndexType` parameter value.
    pub fn as_str(&self) -> &str {
        match self {
            AuthIndexType::Service => "service",
            AuthIndexType::CompositeAdvice => "composite_advice",
            AuthIndexType::Other(other) => other,
        }
    }
}

/// What the caller wants once the tree ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesiredResult {
    /// The SSO token.
    SessionToken,
    /// OAuth2 tokens exchanged for the SSO token.
    AccessToken,
    /// A [`User`] holding both.
    User,
}

/// The outcome of one step of a flow.
#[derive(Debug)]
pub enum FlowResult {
    /// The tree needs more input.
    Node(Node),
    #[allow(missing_docs)]
    SessionToken(Token),
    #[allow(missing_docs)]
    AccessToken(AccessToken),
    #[allow(missing_docs)]
    User(User),
}

/// Identity of a running flow, shared by all its nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Flow {
    id: String,
    service_name: String,
    index_type: AuthIndexType,
}

impl Flow {
    fn payload(&self) -> Value {
        json!({"tree": self.service_name, "type": self.index_type.as_str()})
    }
}

/// Entry point of a tree.
#[derive(Debug, Clone)]
pub struct AuthService {
    flow: Flow,
    suspended_id: Option<String>,
}

impl AuthService {
    /// A flow through the tree `name`, selected by `index_type`.
    pub fn new(name: impl Into<String>, index_type: AuthIndexType) -> Self {
        Self {
            flow: Flow {
                id: Uuid::new_v4().to_string(),
                service_name: name.into(),
                index_type,
            },
            suspended_id: None,
        }
    }

    /// A flow resuming a tree that AM suspended, e.g. to wait for an emailed link.
    pub fn resume(suspended_id: impl Into<String>) -> Self {
        Self {
            suspended_id: Some(suspended_id.into()),
            ..Self::new("", AuthIndexType::Service)
        }
    }

    /// A flow resuming from the link AM sent, which carries a `suspendedId` query parameter.
    pub fn from_resume_uri(uri: &str) -> Result<Self, AuthError> {
        let missing = || AuthError::InvalidResumeUri("suspendedId".into());
        let url = Url::parse(uri).map_err(|_| missing())?;
        let suspended_id = url
            .query_pairs()
            .find(|(name, _)| name == "suspendedId")
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
            .ok_or_else(missing)?;
        Ok(Self::resume(suspended_id))
    }

    /// Unique id of this flow, shared by every node it produces.
    pub fn flow_id(&self) -> &str {
        &self.flow.id
    }

    #[allow(missing_docs)]
    pub fn service_name(&self) -> &str {
        &self.flow.service_name
    }

    #[allow(missing_docs)]
    pub fn index_type(&self) -> &AuthIndexType {
        &self.flow.index_type
    }

    /// Start the tree.
    pub async fn next(
        &self,
        ctx: &SessionContext,
        desired: DesiredResult,
    ) -> Result<FlowResult, AuthError> {
        if let Some(cached) = ctx.cached(desired)? {
            log::debug!("Returning cached result instead of starting {}", self.flow.service_name);
            return Ok(cached);
        }

        let server = ctx.server();
        let request = Request::new(Method::Post, server.authenticate_url.as_str())
            .header(ACCEPT_API_VERSION, AUTH_API_VERSION)
            .json(json!({}))
            .timeout(server.timeout);
        let (request, action) = match &self.suspended_id {
            Some(suspended_id) => (
                request.param("suspendedId", suspended_id.as_str()),
                Action::with_payload(
                    ActionType::StartAuthenticate,
                    json!({"suspendedId": suspended_id}),
                ),
            ),
            None => (
                request
                    .param("authIndexType", self.flow.index_type.as_str())
                    .param("authIndexValue", self.flow.service_name.as_str()),
                Action::with_payload(ActionType::StartAuthenticate, self.flow.payload()),
            ),
        };
        log::info!("Starting flow {} ({})", self.flow.id, self.flow.service_name);
        submit(ctx, request, action, &self.flow, desired).await
    }
}

/// One step of a tree.
#[derive(Debug)]
pub struct Node {
    auth_id: String,
    /// The callbacks to fill in, in the order AM sent them.
    pub callbacks: Vec<Callback>,
    /// Stage name, from the response or a `MetadataCallback`.
    pub stage: Option<String>,
    /// Page header configured on the tree's page node.
    pub header: Option<String>,
    /// Page description configured on the tree's page node.
    pub description: Option<String>,
    flow: Flow,
}

impl Node {
    fn from_response(
        auth_id: &str,
        body: &Value,
        ctx: &SessionContext,
        flow: &Flow,
    ) -> Result<Self, AuthError> {
        let callbacks = body
            .get("callbacks")
            .and_then(Value::as_array)
            .ok_or_else(|| AuthError::InvalidAuthServiceResponse("missing callbacks".into()))?;
        let callbacks = ctx.registry().decode_all(callbacks)?;

        let field = |name: &str| body.get(name).and_then(Value::as_str).map(str::to_owned);
        let stage = field("stage").or_else(|| {
            callbacks.iter().find_map(|callback| match callback {
                Callback::Metadata(metadata) => metadata.stage().map(str::to_owned),
                _ => None,
            })
        });
        Ok(Self {
            auth_id: auth_id.to_owned(),
            callbacks,
            stage,
            header: field("header"),
            description: field("description"),
            flow: flow.clone(),
        })
    }

    /// The opaque state AM round-trips between steps.
    pub fn auth_id(&self) -> &str {
        &self.auth_id
    }

    #[allow(missing_docs)]
    pub fn flow_id(&self) -> &str {
        &self.flow.id
    }

    #[allow(missing_docs)]
    pub fn service_name(&self) -> &str {
        &self.flow.service_name
    }

    /// The body submitted by [`Self::next`].
    pub fn build_request_payload(&self) -> Value {
        let callbacks: Vec<Value> = self.callbacks.iter().map(Callback::build_response).collect();
        json!({"authId": self.auth_id, "callbacks": callbacks})
    }

    /// Submit the callbacks and move to the next step.
    ///
    /// The node is left untouched, so it can be resubmitted after a failure.
    pub async fn next(
        &self,
        ctx: &SessionContext,
        desired: DesiredResult,
    ) -> Result<FlowResult, AuthError> {
        if let Some(cached) = ctx.cached(desired)? {
            log::debug!("Returning cached result instead of submitting flow {}", self.flow.id);
            return Ok(cached);
        }

        let server = ctx.server();
        let request = Request::new(Method::Post, server.authenticate_url.as_str())
            .header(ACCEPT_API_VERSION, AUTH_API_VERSION)
            .json(self.build_request_payload())
            .timeout(server.timeout);
        let action = Action::with_payload(ActionType::Authenticate, self.flow.payload());
        submit(ctx, request, action, &self.flow, desired).await
    }

    /// Write `outcome` into the node's `webAuthnOutcome` hidden value.
    ///
    /// Returns `false` when the node has no such hidden value.
    pub fn set_webauthn_outcome(&mut self, outcome: &str) -> bool {
        let hidden = self.callbacks.iter_mut().find_map(|callback| match callback {
            Callback::HiddenValue(hidden) if hidden.is_webauthn_outcome() => Some(hidden),
            _ => None,
        });
        match hidden {
            Some(hidden) => {
                hidden.set_value(outcome);
                true
            }
            None => {
                log::warn!("No webAuthnOutcome hidden value in node of flow {}", self.flow.id);
                false
            }
        }
    }

    /// Run the node's WebAuthn registration and record the outcome for AM.
    ///
    /// A failed ceremony is recorded too, in the form AM understands, so the tree can branch on
    /// it; the error is still returned to the caller.
    pub async fn register_webauthn<A: Authenticator>(
        &mut self,
        client: &WebAuthnClient<A>,
        device_name: Option<&str>,
    ) -> Result<(), WebAuthnError> {
        let callback = self
            .callbacks
            .iter()
            .find_map(|callback| match callback {
                Callback::WebAuthnRegistration(registration) => Some(registration.clone()),
                _ => None,
            })
            .ok_or(WebAuthnError::InvalidState)?;
        let result = callback.register(client, device_name).await;
        self.record_webauthn(result)
    }

    /// Run the node's WebAuthn authentication and record the outcome for AM.
    pub async fn authenticate_webauthn<A: Authenticator>(
        &mut self,
        client: &WebAuthnClient<A>,
    ) -> Result<(), WebAuthnError> {
        let callback = self
            .callbacks
            .iter()
            .find_map(|callback| match callback {
                Callback::WebAuthnAuthentication(authentication) => Some(authentication.clone()),
                _ => None,
            })
            .ok_or(WebAuthnError::InvalidState)?;
        let result = callback.authenticate(client).await;
        self.record_webauthn(result)
    }

    fn record_webauthn(&mut self, result: Result<String, WebAuthnError>) -> Result<(), WebAuthnError> {
        let outcome = match &result {
            Ok(outcome) => outcome.clone(),
            Err(e) => {
                log::error!("WebAuthn ceremony failed: {e}");
                e.outcome()
            }
        };
        if !self.set_webauthn_outcome(&outcome) {
            return Err(WebAuthnError::InvalidState);
        }
        result.map(|_| ())
    }
}

async fn submit(
    ctx: &SessionContext,
    request: Request,
    action: Action,
    flow: &Flow,
    desired: DesiredResult,
) -> Result<FlowResult, AuthError> {
    let response = ctx.transport().invoke(request, action).await?;
    let body = response.body.unwrap_or(Value::Null);

    if let Some(auth_id) = body.get("authId") {
        let auth_id = auth_id.as_str().ok_or_else(|| {
            log::error!("Flow {} got a non-string authId", flow.id);
            AuthError::InvalidAuthServiceResponse("authId is not a string".into())
        })?;
        let node = Node::from_response(auth_id, &body, ctx, flow)?;
        log::debug!(
            "Flow {} continues with {} callback(s)",
            flow.id,
            node.callbacks.len()
        );
        return Ok(FlowResult::Node(node));
    }

    let Some(token) = Token::from_response(&body) else {
        log::error!("Flow {} got a response with neither authId nor tokenId", flow.id);
        return Err(AuthError::EmptyOrUnrecognizedResponse);
    };
    log::info!("Flow {} ended with an SSO token", flow.id);
    ctx.reconcile(&token, &flow.index_type).await?;
    ctx.deliver(token, desired).await
}
