use std::{any::Any, sync::Arc};

use frauth_transport::{Action, ActionType, MockTransport, Request, Response, TransportError};
use frauth_types::{
    storage::MemoryStore,
    webauthn::{AuthenticatorAttachment, AuthenticatorTransport},
};
use frauth_webauthn::{
    GetAssertionEvent, MockAuthenticator, MockGetAssertionSession, WebAuthnClient, WebAuthnError,
};
use mockall::{predicate::*, Sequence};
use serde_json::{json, Value};

use crate::{
    callback::{Callback, CallbackRegistry, CustomCallback},
    oauth2::MockOAuth2Client,
    token_manager::MockTokenManager,
    *,
};

const AM: &str = "https://openam.example.com/openam";
const AUTHENTICATE_URL: &str = "https://openam.example.com/openam/json/realms/root/authenticate";

fn context(transport: MockTransport) -> SessionContext {
    SessionContext::new(
        Config::new(AM).server(),
        Arc::new(transport),
        Arc::new(MemoryStore::new()),
    )
}

fn oauth2_context(
    transport: MockTransport,
    client: MockOAuth2Client,
    manager: MockTokenManager,
) -> SessionContext {
    context(transport)
        .with_oauth2_client(Arc::new(client))
        .with_token_manager(Arc::new(manager))
}

fn access_token(value: &str) -> AccessToken {
    AccessToken::from_token_response(&json!({
        "access_token": value,
        "refresh_token": "refresh",
        "id_token": "id",
        "scope": "openid profile",
        "token_type": "Bearer",
        "expires_in": 3599
    }))
    .unwrap()
}

fn name_callback() -> Value {
    json!({
        "type": "NameCallback",
        "output": [{"name": "prompt", "value": "User Name"}],
        "input": [{"name": "IDToken1", "value": ""}],
        "_id": 0
    })
}

fn password_callback() -> Value {
    json!({
        "type": "PasswordCallback",
        "output": [{"name": "prompt", "value": "Password"}],
        "input": [{"name": "IDToken2", "value": ""}],
        "_id": 1
    })
}

fn step(callbacks: Vec<Value>) -> Response {
    Response::ok(json!({
        "authId": "eyJ0eXAiOiJKV1QiLCJhbGciOiJIUzI1NiJ9.e30.sig",
        "callbacks": callbacks,
        "header": "Sign In",
        "description": "Enter your credentials"
    }))
}

fn session_token(value: &str) -> Response {
    Response::ok(json!({
        "tokenId": value,
        "successUrl": "/openam/console",
        "realm": "/"
    }))
}

/// A transport that ends any tree with `token` on the first request.
fn ends_with(token: &'static str) -> MockTransport {
    let mut transport = MockTransport::new();
    transport
        .expect_invoke()
        .times(1)
        .returning(move |_, _| Ok(session_token(token)));
    transport
}

fn login() -> AuthService {
    AuthService::new("Login", AuthIndexType::Service)
}

#[tokio::test]
async fn username_password_tree_ends_in_session_token() {
    // Arrange
    let mut transport = MockTransport::new();
    let mut seq = Sequence::new();
    transport
        .expect_invoke()
        .withf(|request, action| {
            request.url == AUTHENTICATE_URL
                && request.param_value("authIndexType") == Some("service")
                && request.param_value("authIndexValue") == Some("Login")
                && request.header_value("Accept-API-Version") == Some("resource=2.1, protocol=1.0")
                && action.ty == ActionType::StartAuthenticate
                && action.payload == Some(json!({"tree": "Login", "type": "service"}))
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| {
            Ok(step(vec![
                json!({
                    "type": "MetadataCallback",
                    "output": [{"name": "data", "value": {"stage": "UsernamePassword"}}]
                }),
                name_callback(),
                password_callback(),
            ]))
        });
    transport
        .expect_invoke()
        .withf(|request, action| {
            let Some(body) = request.json_body() else {
                return false;
            };
            action.ty == ActionType::Authenticate
                && body["authId"] == "eyJ0eXAiOiJKV1QiLCJhbGciOiJIUzI1NiJ9.e30.sig"
                && body["callbacks"][1]["input"][0]["value"] == "demo"
                && body["callbacks"][2]["input"][0]["value"] == "Password1!"
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(session_token("AQIC5w")));
    let ctx = context(transport);
    let service = login();

    // Act
    let FlowResult::Node(mut node) = service.next(&ctx, DesiredResult::SessionToken).await.unwrap()
    else {
        panic!("expected a node");
    };
    for callback in &mut node.callbacks {
        match callback {
            Callback::Name(name) => name.set_value("demo"),
            Callback::Password(password) => password.set_value("Password1!"),
            _ => {}
        }
    }
    let result = node.next(&ctx, DesiredResult::SessionToken).await.unwrap();

    // Assert
    assert_eq!(node.flow_id(), service.flow_id());
    assert_eq!(node.stage.as_deref(), Some("UsernamePassword"));
    assert_eq!(node.header.as_deref(), Some("Sign In"));
    assert!(matches!(result, FlowResult::SessionToken(token) if token.value() == "AQIC5w"));
    let stored = ctx.session_token().unwrap().unwrap();
    assert_eq!(stored.value(), "AQIC5w");
    assert_eq!(stored.success_url.as_deref(), Some("/openam/console"));
}

#[tokio::test]
async fn response_without_auth_id_or_token_is_rejected() {
    let mut transport = MockTransport::new();
    transport
        .expect_invoke()
        .returning(|_, _| Ok(Response::ok(json!({"code": 200}))));
    let ctx = context(transport);

    let result = login().next(&ctx, DesiredResult::SessionToken).await;

    assert_eq!(result.unwrap_err(), AuthError::EmptyOrUnrecognizedResponse);
    assert_eq!(ctx.session_token().unwrap(), None);
}

#[tokio::test]
async fn step_without_callbacks_is_invalid() {
    let mut transport = MockTransport::new();
    transport
        .expect_invoke()
        .returning(|_, _| Ok(Response::ok(json!({"authId": "abc"}))));

    let result = login().next(&context(transport), DesiredResult::SessionToken).await;

    assert!(matches!(result, Err(AuthError::InvalidAuthServiceResponse(_))));
}

#[tokio::test]
async fn non_string_auth_id_is_invalid() {
    // Arrange
    let mut transport = MockTransport::new();
    transport.expect_invoke().times(1).returning(|_, _| {
        Ok(Response::ok(json!({"authId": 42, "tokenId": "AQIC5w"})))
    });
    let ctx = context(transport);

    // Act
    let result = login().next(&ctx, DesiredResult::SessionToken).await;

    // Assert
    assert_eq!(
        result.unwrap_err(),
        AuthError::InvalidAuthServiceResponse("authId is not a string".into())
    );
    assert_eq!(ctx.session_token().unwrap(), None);
}

#[tokio::test]
async fn unsupported_callback_aborts_the_step() {
    let mut transport = MockTransport::new();
    transport.expect_invoke().returning(|_, _| {
        Ok(step(vec![
            name_callback(),
            json!({"type": "DeviceProfileCallback", "output": [], "input": []}),
        ]))
    });

    let result = login().next(&context(transport), DesiredResult::SessionToken).await;

    assert_eq!(
        result.unwrap_err(),
        AuthError::UnsupportedCallback("DeviceProfileCallback".into())
    );
}

#[derive(Debug)]
struct DeviceProfile {
    raw: Value,
    profile: Option<String>,
}

impl CustomCallback for DeviceProfile {
    fn callback_type(&self) -> &str {
        "DeviceProfileCallback"
    }

    fn build_response(&self) -> Value {
        let mut response = self.raw.clone();
        if let Some(profile) = &self.profile {
            response["input"][0]["value"] = json!(profile);
        }
        response
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[tokio::test]
async fn registered_callback_is_decoded_and_submitted() {
    // Arrange
    let mut transport = MockTransport::new();
    let mut seq = Sequence::new();
    transport
        .expect_invoke()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| {
            Ok(step(vec![json!({
                "type": "DeviceProfileCallback",
                "output": [{"name": "metadata", "value": true}],
                "input": [{"name": "IDToken1", "value": ""}]
            })]))
        });
    transport
        .expect_invoke()
        .withf(|request, _| {
            request
                .json_body()
                .map_or(false, |body| body["callbacks"][0]["input"][0]["value"] == "{}")
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(session_token("AQIC5w")));
    let mut registry = CallbackRegistry::new();
    registry.register("DeviceProfileCallback", |json| {
        Ok(Box::new(DeviceProfile {
            raw: json.clone(),
            profile: None,
        }))
    });
    let ctx = context(transport).with_registry(registry);

    // Act
    let FlowResult::Node(mut node) = login().next(&ctx, DesiredResult::SessionToken).await.unwrap()
    else {
        panic!("expected a node");
    };
    node.callbacks[0]
        .downcast_mut::<DeviceProfile>()
        .unwrap()
        .profile = Some("{}".into());
    let result = node.next(&ctx, DesiredResult::SessionToken).await;

    // Assert
    assert_eq!(node.callbacks[0].callback_type(), "DeviceProfileCallback");
    assert!(matches!(result, Ok(FlowResult::SessionToken(_))));
}

#[tokio::test]
async fn same_session_token_keeps_oauth2_tokens() {
    // Arrange
    let mut manager = MockTokenManager::new();
    manager.expect_revoke_and_end_session().never();
    let ctx = oauth2_context(ends_with("sso"), MockOAuth2Client::new(), manager);
    ctx.set_session_token(&Token::new("sso")).unwrap();
    ctx.set_access_token(&access_token("access")).unwrap();

    // Act
    let result = login().next(&ctx, DesiredResult::SessionToken).await;

    // Assert
    assert!(matches!(result, Ok(FlowResult::SessionToken(_))));
    assert_eq!(ctx.access_token().unwrap().unwrap().value, "access");
}

#[tokio::test]
async fn new_session_token_revokes_stale_oauth2_tokens() {
    // Arrange
    let mut manager = MockTokenManager::new();
    manager
        .expect_revoke_and_end_session()
        .times(1)
        .returning(|| Ok(()));
    let ctx = oauth2_context(ends_with("new"), MockOAuth2Client::new(), manager);
    ctx.set_session_token(&Token::new("old")).unwrap();
    ctx.set_access_token(&access_token("access")).unwrap();
    ctx.set_current_user(Some(User {
        session_token: Token::new("old"),
        access_token: access_token("access"),
    }));

    // Act
    let result = login().next(&ctx, DesiredResult::SessionToken).await;

    // Assert
    assert!(matches!(result, Ok(FlowResult::SessionToken(token)) if token.value() == "new"));
    assert_eq!(ctx.session_token().unwrap().unwrap().value(), "new");
    assert_eq!(ctx.current_user(), None);
}

#[tokio::test]
async fn composite_advice_without_session_keeps_oauth2_tokens() {
    let mut manager = MockTokenManager::new();
    manager.expect_revoke_and_end_session().never();
    let ctx = oauth2_context(ends_with("sso"), MockOAuth2Client::new(), manager);
    ctx.set_access_token(&access_token("access")).unwrap();
    let advice = AuthService::new(
        "<Advices><AttributeValuePair><Attribute name=\"TransactionConditionAdvice\"/></AttributeValuePair></Advices>",
        AuthIndexType::CompositeAdvice,
    );

    advice.next(&ctx, DesiredResult::SessionToken).await.unwrap();

    assert!(ctx.access_token().unwrap().is_some());
    assert_eq!(ctx.session_token().unwrap().unwrap().value(), "sso");
}

#[tokio::test]
async fn service_without_session_revokes_oauth2_tokens() {
    let mut manager = MockTokenManager::new();
    manager
        .expect_revoke_and_end_session()
        .times(1)
        .returning(|| Ok(()));
    let ctx = oauth2_context(ends_with("sso"), MockOAuth2Client::new(), manager);
    ctx.set_access_token(&access_token("access")).unwrap();

    login().next(&ctx, DesiredResult::SessionToken).await.unwrap();

    assert_eq!(ctx.session_token().unwrap().unwrap().value(), "sso");
}

#[tokio::test]
async fn revocation_failure_does_not_fail_the_flow() {
    let mut manager = MockTokenManager::new();
    manager
        .expect_revoke_and_end_session()
        .times(1)
        .returning(|| Err(TokenError::Transport(TransportError::Network("offline".into()))));
    let ctx = oauth2_context(ends_with("new"), MockOAuth2Client::new(), manager);
    ctx.set_session_token(&Token::new("old")).unwrap();
    ctx.set_access_token(&access_token("access")).unwrap();

    let result = login().next(&ctx, DesiredResult::SessionToken).await;

    assert!(matches!(result, Ok(FlowResult::SessionToken(_))));
    assert_eq!(ctx.session_token().unwrap().unwrap().value(), "new");
}

#[tokio::test]
async fn stale_oauth2_tokens_are_dropped_without_token_manager() {
    let ctx = context(ends_with("new"));
    ctx.set_session_token(&Token::new("old")).unwrap();
    ctx.set_access_token(&access_token("access")).unwrap();

    login().next(&ctx, DesiredResult::SessionToken).await.unwrap();

    assert_eq!(ctx.access_token().unwrap(), None);
    assert_eq!(ctx.session_token().unwrap().unwrap().value(), "new");
}

#[tokio::test]
async fn access_token_is_exchanged_and_stored() {
    // Arrange
    let mut client = MockOAuth2Client::new();
    client
        .expect_exchange_token()
        .withf(|token| token.value() == "sso")
        .times(1)
        .returning(|_| Ok(access_token("access")));
    let ctx = oauth2_context(ends_with("sso"), client, MockTokenManager::new());

    // Act
    let result = login().next(&ctx, DesiredResult::AccessToken).await.unwrap();

    // Assert
    assert!(matches!(result, FlowResult::AccessToken(token) if token.value == "access"));
    assert_eq!(ctx.access_token().unwrap().unwrap().value, "access");
    assert_eq!(ctx.session_token().unwrap().unwrap().value(), "sso");
}

#[tokio::test]
async fn stored_access_token_short_circuits_the_tree() {
    let mut transport = MockTransport::new();
    transport.expect_invoke().never();
    let ctx = oauth2_context(transport, MockOAuth2Client::new(), MockTokenManager::new());
    ctx.set_access_token(&access_token("stored")).unwrap();

    let result = login().next(&ctx, DesiredResult::AccessToken).await.unwrap();

    assert!(matches!(result, FlowResult::AccessToken(token) if token.value == "stored"));
}

#[tokio::test]
async fn cached_user_short_circuits_the_tree() {
    let mut transport = MockTransport::new();
    transport.expect_invoke().never();
    let ctx = context(transport);
    let user = User {
        session_token: Token::new("sso"),
        access_token: access_token("access"),
    };
    ctx.set_current_user(Some(user.clone()));

    let result = login().next(&ctx, DesiredResult::User).await.unwrap();

    assert!(matches!(result, FlowResult::User(cached) if cached == user));
}

#[tokio::test]
async fn user_is_built_and_cached() {
    let mut client = MockOAuth2Client::new();
    client
        .expect_exchange_token()
        .times(1)
        .returning(|_| Ok(access_token("access")));
    let ctx = oauth2_context(ends_with("sso"), client, MockTokenManager::new());

    let result = login().next(&ctx, DesiredResult::User).await.unwrap();

    let FlowResult::User(user) = result else {
        panic!("expected a user");
    };
    assert_eq!(user.session_token.value(), "sso");
    assert_eq!(ctx.current_user(), Some(user));
}

#[tokio::test]
async fn access_token_needs_an_oauth2_client() {
    let ctx = context(ends_with("sso"));

    let result = login().next(&ctx, DesiredResult::AccessToken).await;

    assert_eq!(result.unwrap_err(), AuthError::InvalidOAuth2Client);
    assert_eq!(ctx.session_token().unwrap().unwrap().value(), "sso");
}

#[tokio::test]
async fn exchange_failure_keeps_the_session_token() {
    let mut client = MockOAuth2Client::new();
    client
        .expect_exchange_token()
        .times(1)
        .returning(|_| Err(TokenError::Exchange("invalid_client: unknown client".into())));
    let ctx = oauth2_context(ends_with("sso"), client, MockTokenManager::new());

    let result = login().next(&ctx, DesiredResult::AccessToken).await;

    assert!(matches!(result, Err(AuthError::Token(TokenError::Exchange(_)))));
    assert_eq!(ctx.session_token().unwrap().unwrap().value(), "sso");
    assert_eq!(ctx.access_token().unwrap(), None);
}

#[tokio::test]
async fn resume_uri_restarts_the_suspended_tree() {
    // Arrange
    let mut transport = MockTransport::new();
    transport
        .expect_invoke()
        .withf(|request, action| {
            request.param_value("suspendedId") == Some("6IIGsGlsM3zJvBnmRoBpaPn2jWs")
                && request.param_value("authIndexType").is_none()
                && action.ty == ActionType::StartAuthenticate
                && action.payload == Some(json!({"suspendedId": "6IIGsGlsM3zJvBnmRoBpaPn2jWs"}))
        })
        .times(1)
        .returning(|_, _| Ok(session_token("AQIC5w")));
    let service = AuthService::from_resume_uri(
        "https://app.example.com/resume?suspendedId=6IIGsGlsM3zJvBnmRoBpaPn2jWs&realm=/",
    )
    .unwrap();

    // Act
    let result = service.next(&context(transport), DesiredResult::SessionToken).await;

    // Assert
    assert!(matches!(result, Ok(FlowResult::SessionToken(_))));
}

#[test]
fn resume_uri_needs_a_suspended_id() {
    assert_eq!(
        AuthService::from_resume_uri("https://app.example.com/resume?realm=/").unwrap_err(),
        AuthError::InvalidResumeUri("suspendedId".into())
    );
    assert!(AuthService::from_resume_uri("not a uri").is_err());
}

#[test]
fn registration_needs_a_signed_out_user() {
    let ctx = context(MockTransport::new());
    assert!(ctx.registration("Registration").is_ok());

    ctx.set_current_user(Some(User {
        session_token: Token::new("sso"),
        access_token: access_token("access"),
    }));

    assert_eq!(
        ctx.registration("Registration").unwrap_err(),
        AuthError::UserAlreadyAuthenticated
    );
}

#[tokio::test]
async fn logout_is_best_effort_and_clears_everything() {
    // Arrange
    let mut transport = MockTransport::new();
    transport
        .expect_invoke()
        .withf(|request: &Request, action: &Action| {
            request.url == "https://openam.example.com/openam/json/realms/root/sessions"
                && request.param_value("_action") == Some("logout")
                && request.header_value("iPlanetDirectoryPro") == Some("sso")
                && action.ty == ActionType::Logout
        })
        .times(1)
        .returning(|_, _| Err(TransportError::Network("offline".into())));
    let mut manager = MockTokenManager::new();
    manager
        .expect_revoke_and_end_session()
        .times(1)
        .returning(|| Ok(()));
    let ctx = oauth2_context(transport, MockOAuth2Client::new(), manager);
    ctx.set_session_token(&Token::new("sso")).unwrap();
    ctx.set_access_token(&access_token("access")).unwrap();
    ctx.set_current_user(Some(User {
        session_token: Token::new("sso"),
        access_token: access_token("access"),
    }));

    // Act
    ctx.logout().await.unwrap();

    // Assert
    assert_eq!(ctx.session_token().unwrap(), None);
    assert_eq!(ctx.access_token().unwrap(), None);
    assert_eq!(ctx.current_user(), None);
}

#[tokio::test]
async fn user_info_needs_an_oauth2_client() {
    let ctx = context(MockTransport::new());

    assert_eq!(ctx.user_info().await.unwrap_err(), AuthError::InvalidOAuth2Client);
}

#[tokio::test]
async fn user_info_uses_the_managed_access_token() {
    let mut client = MockOAuth2Client::new();
    client
        .expect_user_info()
        .withf(|token| token.value == "fresh")
        .times(1)
        .returning(|_| Ok(json!({"sub": "demo"})));
    let mut manager = MockTokenManager::new();
    manager
        .expect_access_token()
        .times(1)
        .returning(|| Ok(access_token("fresh")));
    let ctx = oauth2_context(MockTransport::new(), client, manager);

    assert_eq!(ctx.user_info().await.unwrap(), json!({"sub": "demo"}));
}

fn webauthn_authentication_step() -> Response {
    step(vec![
        json!({
            "type": "MetadataCallback",
            "output": [{"name": "data", "value": {
                "_type": "WebAuthn",
                "challenge": "yS4s0H1yrbLAKqB0jTr7R1ElOC5hC5Bcg+mPzYkJ2Zw=",
                "allowCredentials": "",
                "timeout": "60000",
                "userVerification": "preferred",
                "relyingPartyId": "rpId: \"openam.example.com\","
            }}]
        }),
        json!({
            "type": "HiddenValueCallback",
            "output": [
                {"name": "value", "value": "false"},
                {"name": "id", "value": "webAuthnOutcome"}
            ],
            "input": [{"name": "IDToken2", "value": "webAuthnOutcome"}]
        }),
    ])
}

fn unavailable_authenticator() -> WebAuthnClient<MockAuthenticator> {
    let mut session = MockGetAssertionSession::new();
    session
        .expect_attachment()
        .return_const(AuthenticatorAttachment::Platform);
    session
        .expect_transport()
        .return_const(AuthenticatorTransport::Internal);
    session
        .expect_can_perform_user_verification()
        .return_const(true);
    session.expect_start().times(1).returning(|tx| {
        let _ = tx.send(GetAssertionEvent::BecameUnavailable);
        let _ = tx.send(GetAssertionEvent::BecameAvailable);
    });
    session.expect_get_assertion().never();
    session
        .expect_cancel()
        .with(eq(WebAuthnError::NotAllowed))
        .return_const(());
    let mut authenticator = MockAuthenticator::new();
    authenticator
        .expect_new_get_assertion_session()
        .return_once(move || session);
    WebAuthnClient::new("https://openam.example.com", authenticator)
}

#[tokio::test]
async fn failed_webauthn_ceremony_is_recorded_as_outcome() {
    // Arrange
    let mut transport = MockTransport::new();
    transport
        .expect_invoke()
        .times(1)
        .returning(|_, _| Ok(webauthn_authentication_step()));
    let ctx = context(transport);
    let FlowResult::Node(mut node) = login().next(&ctx, DesiredResult::SessionToken).await.unwrap()
    else {
        panic!("expected a node");
    };

    // Act
    let result = node.authenticate_webauthn(&unavailable_authenticator()).await;

    // Assert
    assert!(matches!(node.callbacks[0], Callback::WebAuthnAuthentication(_)));
    assert_eq!(result, Err(WebAuthnError::NotAllowed));
    assert_eq!(
        node.build_request_payload()["callbacks"][1]["input"][0]["value"],
        "ERROR::NotAllowedError:"
    );
}

#[tokio::test]
async fn webauthn_outcome_needs_a_hidden_value() {
    let mut transport = MockTransport::new();
    transport
        .expect_invoke()
        .returning(|_, _| Ok(step(vec![name_callback()])));
    let ctx = context(transport);
    let FlowResult::Node(mut node) = login().next(&ctx, DesiredResult::SessionToken).await.unwrap()
    else {
        panic!("expected a node");
    };

    assert!(!node.set_webauthn_outcome("outcome"));
    assert_eq!(
        node.authenticate_webauthn(&WebAuthnClient::new(AM, MockAuthenticator::new()))
            .await,
        Err(WebAuthnError::InvalidState)
    );
}
