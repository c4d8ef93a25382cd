use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use ciborium::value::Value;
use frauth_types::{
    encoding,
    webauthn::{
        Aaguid, AttestationConveyancePreference, AttestationObject, AttestedCredentialData,
        AuthenticatorAttachment, AuthenticatorData, AuthenticatorSelectionCriteria,
        AuthenticatorTransport, PublicKeyCredentialCreationOptions, PublicKeyCredentialDescriptor,
        PublicKeyCredentialParameters, PublicKeyCredentialRequestOptions,
        PublicKeyCredentialRpEntity, PublicKeyCredentialType, PublicKeyCredentialUserEntity,
        UserVerificationRequirement,
    },
    Bytes,
};
use mockall::predicate::*;
use tokio::sync::mpsc::UnboundedSender;

use crate::*;

const ORIGIN: &str = "https://openam.example.com";

fn creation_options() -> PublicKeyCredentialCreationOptions {
    PublicKeyCredentialCreationOptions {
        rp: PublicKeyCredentialRpEntity {
            id: None,
            name: "ForgeRock".into(),
        },
        user: PublicKeyCredentialUserEntity {
            id: vec![1, 2, 3].into(),
            name: "demo".into(),
            display_name: "Demo User".into(),
        },
        challenge: b"challenge".to_vec().into(),
        pub_key_cred_params: vec![PublicKeyCredentialParameters {
            ty: PublicKeyCredentialType::PublicKey,
            alg: -7,
        }],
        timeout: None,
        exclude_credentials: Vec::new(),
        authenticator_selection: Some(AuthenticatorSelectionCriteria {
            authenticator_attachment: Some(AuthenticatorAttachment::Platform),
            require_resident_key: false,
            user_verification: UserVerificationRequirement::Preferred,
        }),
        attestation: AttestationConveyancePreference::None,
    }
}

fn request_options(allow_credentials: Vec<PublicKeyCredentialDescriptor>) -> PublicKeyCredentialRequestOptions {
    PublicKeyCredentialRequestOptions {
        challenge: b"challenge".to_vec().into(),
        timeout: None,
        rp_id: Some("example.com".into()),
        allow_credentials,
        user_verification: UserVerificationRequirement::Preferred,
    }
}

fn packed_attestation(aaguid: [u8; 16], credential_id: &[u8]) -> AttestationObject {
    AttestationObject {
        fmt: "packed".into(),
        att_stmt: Value::Map(vec![
            (Value::Text("alg".into()), Value::Integer((-7).into())),
            (
                Value::Text("x5c".into()),
                Value::Array(vec![Value::Bytes(vec![0x30, 0x82])]),
            ),
        ]),
        auth_data: AuthenticatorData::new("openam.example.com", 0).set_attested_credential_data(
            AttestedCredentialData::new(
                Aaguid(aaguid),
                credential_id.to_vec(),
                Value::Map(vec![(Value::Integer(1.into()), Value::Integer(2.into()))]),
            ),
        ),
    }
}

fn make_credential_session(
    transport: AuthenticatorTransport,
    events: Vec<MakeCredentialEvent>,
) -> MockMakeCredentialSession {
    let mut session = MockMakeCredentialSession::new();
    session
        .expect_attachment()
        .return_const(AuthenticatorAttachment::Platform);
    session.expect_transport().return_const(transport);
    session.expect_can_store_resident_key().return_const(true);
    session
        .expect_can_perform_user_verification()
        .return_const(true);
    session.expect_start().times(1).returning(move |tx| {
        for event in events.clone() {
            let _ = tx.send(event);
        }
    });
    session
}

fn get_assertion_session(
    transport: AuthenticatorTransport,
    events: Vec<GetAssertionEvent>,
) -> MockGetAssertionSession {
    let mut session = MockGetAssertionSession::new();
    session
        .expect_attachment()
        .return_const(AuthenticatorAttachment::Platform);
    session.expect_transport().return_const(transport);
    session
        .expect_can_perform_user_verification()
        .return_const(true);
    session.expect_start().times(1).returning(move |tx| {
        for event in events.clone() {
            let _ = tx.send(event);
        }
    });
    session
}

fn create_client(session: MockMakeCredentialSession) -> WebAuthnClient<MockAuthenticator> {
    let mut authenticator = MockAuthenticator::new();
    authenticator
        .expect_new_make_credential_session()
        .return_once(move || session);
    WebAuthnClient::new(ORIGIN, authenticator)
}

fn get_client(session: MockGetAssertionSession) -> WebAuthnClient<MockAuthenticator> {
    let mut authenticator = MockAuthenticator::new();
    authenticator
        .expect_new_get_assertion_session()
        .return_once(move || session);
    WebAuthnClient::new(ORIGIN, authenticator)
}

#[tokio::test]
async fn create_strips_attestation_when_none_is_requested() {
    // Arrange
    let mut session = make_credential_session(
        AuthenticatorTransport::Internal,
        vec![
            MakeCredentialEvent::BecameAvailable,
            MakeCredentialEvent::MadeCredential(packed_attestation([7; 16], &[9; 16])),
        ],
    );
    session
        .expect_make_credential()
        .withf(|request| {
            request.require_user_verification
                && !request.require_user_presence
                && request.rp.id.as_deref() == Some(ORIGIN)
        })
        .times(1)
        .return_const(());
    session.expect_cancel().times(0);
    let client = create_client(session);

    // Act
    let credential = client
        .create(creation_options())
        .await
        .expect("credential creation failed");

    // Assert
    assert_eq!(credential.raw_id, Bytes::from(vec![9; 16]));
    assert_eq!(credential.id, encoding::base64url(&[9; 16]));
    let attestation =
        AttestationObject::from_slice(&credential.response.attestation_object).unwrap();
    assert_eq!(attestation.fmt, "none");
    assert!(attestation
        .auth_data
        .attested_credential_data
        .unwrap()
        .aaguid
        .is_empty());

    let client_data: serde_json::Value =
        serde_json::from_str(&credential.response.client_data_json).unwrap();
    assert_eq!(client_data["type"], "webauthn.create");
    assert_eq!(client_data["origin"], ORIGIN);
    assert_eq!(client_data["challenge"], encoding::base64url(b"challenge"));
}

#[tokio::test]
async fn create_keeps_attestation_when_direct_is_requested() {
    // Arrange
    let mut session = make_credential_session(
        AuthenticatorTransport::Internal,
        vec![
            MakeCredentialEvent::BecameAvailable,
            MakeCredentialEvent::MadeCredential(packed_attestation([7; 16], &[9; 16])),
        ],
    );
    session.expect_make_credential().times(1).return_const(());
    let client = create_client(session);
    let mut options = creation_options();
    options.attestation = AttestationConveyancePreference::Direct;

    // Act
    let credential = client.create(options).await.unwrap();

    // Assert
    let attestation =
        AttestationObject::from_slice(&credential.response.attestation_object).unwrap();
    assert_eq!(attestation.fmt, "packed");
    assert_eq!(
        attestation.auth_data.attested_credential_data.unwrap().aaguid,
        Aaguid([7; 16])
    );
}

#[tokio::test]
async fn create_rejects_attachment_mismatch() {
    // Arrange
    let mut session = make_credential_session(
        AuthenticatorTransport::Internal,
        vec![MakeCredentialEvent::BecameAvailable],
    );
    session.expect_make_credential().times(0);
    session
        .expect_cancel()
        .with(eq(WebAuthnError::Unsupported))
        .times(1)
        .return_const(());
    let client = create_client(session);
    let mut options = creation_options();
    options.authenticator_selection = Some(AuthenticatorSelectionCriteria {
        authenticator_attachment: Some(AuthenticatorAttachment::CrossPlatform),
        ..Default::default()
    });

    // Act
    let result = client.create(options).await;

    // Assert
    assert_eq!(result.unwrap_err(), WebAuthnError::Unsupported);
}

#[tokio::test]
async fn create_rejects_required_verification_without_support() {
    // Arrange
    let mut session = MockMakeCredentialSession::new();
    session
        .expect_attachment()
        .return_const(AuthenticatorAttachment::Platform);
    session
        .expect_transport()
        .return_const(AuthenticatorTransport::Internal);
    session.expect_can_store_resident_key().return_const(true);
    session
        .expect_can_perform_user_verification()
        .return_const(false);
    session.expect_start().returning(|tx| {
        let _ = tx.send(MakeCredentialEvent::BecameAvailable);
    });
    session.expect_make_credential().times(0);
    session.expect_cancel().times(1).return_const(());
    let client = create_client(session);
    let mut options = creation_options();
    options.authenticator_selection = Some(AuthenticatorSelectionCriteria {
        authenticator_attachment: None,
        require_resident_key: false,
        user_verification: UserVerificationRequirement::Required,
    });

    // Act
    let result = client.create(options).await;

    // Assert
    assert_eq!(result.unwrap_err(), WebAuthnError::Unsupported);
}

#[tokio::test]
async fn create_rejects_required_resident_key_without_support() {
    // Arrange
    let mut session = MockMakeCredentialSession::new();
    session
        .expect_attachment()
        .return_const(AuthenticatorAttachment::Platform);
    session
        .expect_transport()
        .return_const(AuthenticatorTransport::Internal);
    session.expect_can_store_resident_key().return_const(false);
    session
        .expect_can_perform_user_verification()
        .return_const(true);
    session.expect_start().times(1).returning(|tx| {
        let _ = tx.send(MakeCredentialEvent::BecameAvailable);
    });
    session.expect_make_credential().times(0);
    session
        .expect_cancel()
        .with(eq(WebAuthnError::Unsupported))
        .times(1)
        .return_const(());
    let client = create_client(session);
    let mut options = creation_options();
    options.authenticator_selection = Some(AuthenticatorSelectionCriteria {
        authenticator_attachment: Some(AuthenticatorAttachment::Platform),
        require_resident_key: true,
        user_verification: UserVerificationRequirement::Preferred,
    });

    // Act
    let result = client.create(options).await;

    // Assert
    assert_eq!(result.unwrap_err(), WebAuthnError::Unsupported);
}

#[tokio::test]
async fn create_filters_excluded_credentials_by_transport() {
    // Arrange
    let mut session = make_credential_session(
        AuthenticatorTransport::Internal,
        vec![
            MakeCredentialEvent::BecameAvailable,
            MakeCredentialEvent::MadeCredential(packed_attestation([0; 16], &[4; 8])),
        ],
    );
    session
        .expect_make_credential()
        .withf(|request| {
            let ids: Vec<_> = request
                .exclude_credentials
                .iter()
                .map(|d| d.id.clone())
                .collect();
            ids == vec![Bytes::from(vec![1]), Bytes::from(vec![3])]
                && !request.require_user_verification
                && request.require_user_presence
        })
        .times(1)
        .return_const(());
    let client = create_client(session);
    let mut options = creation_options();
    options.authenticator_selection = None;
    options.exclude_credentials = vec![
        PublicKeyCredentialDescriptor::new(vec![1].into(), None),
        PublicKeyCredentialDescriptor::new(vec![2].into(), Some(vec![AuthenticatorTransport::Usb])),
        PublicKeyCredentialDescriptor::new(
            vec![3].into(),
            Some(vec![AuthenticatorTransport::Internal]),
        ),
    ];

    // Act
    let result = client.create(options).await;

    // Assert
    assert!(result.is_ok());
}

#[tokio::test]
async fn create_without_attested_credential_data_is_unknown() {
    // Arrange
    let mut attestation = packed_attestation([0; 16], &[4; 8]);
    attestation.auth_data.attested_credential_data = None;
    let mut session = make_credential_session(
        AuthenticatorTransport::Internal,
        vec![
            MakeCredentialEvent::BecameAvailable,
            MakeCredentialEvent::MadeCredential(attestation),
        ],
    );
    session.expect_make_credential().return_const(());
    session
        .expect_cancel()
        .with(eq(WebAuthnError::Unknown))
        .times(1)
        .return_const(());
    let client = create_client(session);

    // Act
    let result = client.create(creation_options()).await;

    // Assert
    assert_eq!(result.unwrap_err(), WebAuthnError::Unknown);
}

#[tokio::test]
async fn create_completes_once_despite_late_events() {
    // Arrange
    let mut session = make_credential_session(
        AuthenticatorTransport::Internal,
        vec![
            MakeCredentialEvent::BecameAvailable,
            MakeCredentialEvent::MadeCredential(packed_attestation([0; 16], &[1; 8])),
            MakeCredentialEvent::MadeCredential(packed_attestation([0; 16], &[2; 8])),
            MakeCredentialEvent::StoppedOperation(WebAuthnError::Cancelled),
            MakeCredentialEvent::BecameUnavailable,
        ],
    );
    session.expect_make_credential().times(1).return_const(());
    session.expect_cancel().times(0);
    let client = create_client(session);
    let operation = client.new_create_operation(creation_options());

    // Act
    let credential = operation.start().await.unwrap();
    operation.cancel(WebAuthnError::Cancelled);

    // Assert
    assert_eq!(credential.raw_id, Bytes::from(vec![1; 8]));
    assert_eq!(
        operation.start().await.unwrap_err(),
        WebAuthnError::BadOperation
    );
}

#[tokio::test]
async fn starting_twice_is_a_bad_operation() {
    // Arrange
    let mut session = MockMakeCredentialSession::new();
    session
        .expect_transport()
        .return_const(AuthenticatorTransport::Usb);
    session.expect_start().times(1).return_const(());
    session
        .expect_cancel()
        .with(eq(WebAuthnError::Cancelled))
        .times(1)
        .return_const(());
    let client = create_client(session);
    let operation = client.new_create_operation(creation_options());
    let running = {
        let operation = operation.clone();
        tokio::spawn(async move { operation.start().await })
    };
    tokio::task::yield_now().await;

    // Act
    let second = operation.start().await;
    operation.cancel(WebAuthnError::Cancelled);

    // Assert
    assert_eq!(second.unwrap_err(), WebAuthnError::BadOperation);
    assert_eq!(
        running.await.unwrap().unwrap_err(),
        WebAuthnError::Cancelled
    );
}

#[tokio::test(start_paused = true)]
async fn lifetime_timer_stops_roaming_sessions() {
    // Arrange
    let mut session = MockMakeCredentialSession::new();
    session
        .expect_transport()
        .return_const(AuthenticatorTransport::Usb);
    session.expect_start().times(1).return_const(());
    session
        .expect_cancel()
        .with(eq(WebAuthnError::Timeout))
        .times(1)
        .return_const(());
    let client = create_client(session);
    let mut options = creation_options();
    options.timeout = Some(10);

    // Act
    let started = tokio::time::Instant::now();
    let result = client.create(options).await;

    // Assert
    assert_eq!(result.unwrap_err(), WebAuthnError::Timeout);
    assert!(started.elapsed() >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn lifetime_timer_lets_internal_sessions_close_themselves() {
    // Arrange
    let events: Arc<Mutex<Option<UnboundedSender<MakeCredentialEvent>>>> = Default::default();
    let mut session = MockMakeCredentialSession::new();
    session
        .expect_transport()
        .return_const(AuthenticatorTransport::Internal);
    let started_events = events.clone();
    session.expect_start().times(1).returning(move |tx| {
        *started_events.lock().unwrap() = Some(tx);
    });
    let cancel_events = events.clone();
    session
        .expect_cancel()
        .with(eq(WebAuthnError::Timeout))
        .times(2)
        .returning(move |reason| {
            if let Some(tx) = cancel_events.lock().unwrap().as_ref() {
                let _ = tx.send(MakeCredentialEvent::StoppedOperation(reason));
            }
        });
    let client = create_client(session);

    // Act
    let result = client.create(creation_options()).await;

    // Assert
    assert_eq!(result.unwrap_err(), WebAuthnError::Timeout);
}

#[test]
fn lifetime_is_clamped() {
    let client = WebAuthnClient::new(ORIGIN, MockAuthenticator::new());

    assert_eq!(client.lifetime(None), Duration::from_secs(60));
    assert_eq!(client.lifetime(Some(1)), Duration::from_secs(5));
    assert_eq!(client.lifetime(Some(120)), Duration::from_secs(120));
    assert_eq!(client.lifetime(Some(3600)), Duration::from_secs(300));
}

#[tokio::test]
async fn get_substitutes_the_only_allowed_credential_id() {
    // Arrange
    let mut session = get_assertion_session(
        AuthenticatorTransport::Internal,
        vec![
            GetAssertionEvent::BecameAvailable,
            GetAssertionEvent::DiscoveredCredential(AssertionResult {
                credential_id: None,
                authenticator_data: vec![5; 37].into(),
                signature: vec![6; 70].into(),
                user_handle: Some(vec![1, 2, 3].into()),
            }),
        ],
    );
    session
        .expect_get_assertion()
        .withf(|request| {
            request.allow_credentials.len() == 1
                && request.rp_id == "example.com"
                && request.require_user_verification
        })
        .times(1)
        .return_const(());
    let client = get_client(session);
    let options = request_options(vec![
        PublicKeyCredentialDescriptor::new(
            vec![1; 8].into(),
            Some(vec![AuthenticatorTransport::Internal]),
        ),
        PublicKeyCredentialDescriptor::new(vec![2; 8].into(), Some(vec![AuthenticatorTransport::Nfc])),
    ]);

    // Act
    let credential = client.get(options).await.unwrap();

    // Assert
    assert_eq!(credential.raw_id, Bytes::from(vec![1; 8]));
    assert_eq!(credential.response.signature, Bytes::from(vec![6; 70]));
    assert_eq!(
        credential.response.user_handle,
        Some(Bytes::from(vec![1, 2, 3]))
    );
}

#[tokio::test]
async fn get_without_reachable_credentials_is_not_allowed() {
    // Arrange
    let mut session = get_assertion_session(
        AuthenticatorTransport::Internal,
        vec![GetAssertionEvent::BecameAvailable],
    );
    session.expect_get_assertion().times(0);
    session
        .expect_cancel()
        .with(eq(WebAuthnError::NotAllowed))
        .times(1)
        .return_const(());
    let client = get_client(session);
    let options = request_options(vec![PublicKeyCredentialDescriptor::new(
        vec![2; 8].into(),
        Some(vec![AuthenticatorTransport::Usb]),
    )]);

    // Act
    let result = client.get(options).await;

    // Assert
    assert_eq!(result.unwrap_err(), WebAuthnError::NotAllowed);
}

#[tokio::test]
async fn get_without_any_credential_id_is_unknown() {
    // Arrange
    let mut session = get_assertion_session(
        AuthenticatorTransport::Internal,
        vec![
            GetAssertionEvent::BecameAvailable,
            GetAssertionEvent::DiscoveredCredential(AssertionResult {
                credential_id: None,
                authenticator_data: vec![5; 37].into(),
                signature: vec![6; 70].into(),
                user_handle: None,
            }),
        ],
    );
    session
        .expect_get_assertion()
        .withf(|request| request.allow_credentials.is_empty())
        .return_const(());
    session
        .expect_cancel()
        .with(eq(WebAuthnError::Unknown))
        .return_const(());
    let client = get_client(session);

    // Act
    let result = client.get(request_options(Vec::new())).await;

    // Assert
    assert_eq!(result.unwrap_err(), WebAuthnError::Unknown);
}

#[tokio::test]
async fn get_stops_when_authenticator_becomes_unavailable() {
    // Arrange
    let mut session = get_assertion_session(
        AuthenticatorTransport::Internal,
        vec![
            GetAssertionEvent::BecameUnavailable,
            GetAssertionEvent::BecameAvailable,
        ],
    );
    session.expect_get_assertion().times(0);
    session
        .expect_cancel()
        .with(eq(WebAuthnError::NotAllowed))
        .times(1)
        .return_const(());
    let client = get_client(session);

    // Act
    let result = client.get(request_options(Vec::new())).await;

    // Assert
    assert_eq!(result.unwrap_err(), WebAuthnError::NotAllowed);
}

#[tokio::test]
async fn get_uses_the_authenticator_credential_id_for_discoverable_credentials() {
    // Arrange
    let mut session = get_assertion_session(
        AuthenticatorTransport::Internal,
        vec![
            GetAssertionEvent::BecameAvailable,
            GetAssertionEvent::DiscoveredCredential(AssertionResult {
                credential_id: Some(vec![8; 8].into()),
                authenticator_data: vec![5; 37].into(),
                signature: vec![6; 70].into(),
                user_handle: None,
            }),
            GetAssertionEvent::DiscoveredCredential(AssertionResult {
                credential_id: Some(vec![9; 8].into()),
                authenticator_data: vec![5; 37].into(),
                signature: vec![6; 70].into(),
                user_handle: None,
            }),
        ],
    );
    session.expect_get_assertion().times(1).return_const(());
    session.expect_cancel().times(0);
    let client = get_client(session);

    // Act
    let credential = client.get(request_options(Vec::new())).await.unwrap();

    // Assert
    assert_eq!(credential.id, encoding::base64url(&[8; 8]));
    let client_data: serde_json::Value =
        serde_json::from_str(&credential.response.client_data_json).unwrap();
    assert_eq!(client_data["type"], "webauthn.get");
}

#[tokio::test]
async fn get_completes_once_despite_late_events() {
    // Arrange
    let assertion = |id: u8| AssertionResult {
        credential_id: Some(vec![id; 8].into()),
        authenticator_data: vec![5; 37].into(),
        signature: vec![6; 70].into(),
        user_handle: None,
    };
    let mut session = get_assertion_session(
        AuthenticatorTransport::Internal,
        vec![
            GetAssertionEvent::BecameAvailable,
            GetAssertionEvent::DiscoveredCredential(assertion(1)),
            GetAssertionEvent::DiscoveredCredential(assertion(2)),
            GetAssertionEvent::StoppedOperation(WebAuthnError::Cancelled),
            GetAssertionEvent::BecameUnavailable,
        ],
    );
    session.expect_get_assertion().times(1).return_const(());
    session.expect_cancel().times(0);
    let client = get_client(session);
    let operation = client.new_get_operation(request_options(Vec::new()));

    // Act
    let credential = operation.start().await.unwrap();
    operation.cancel(WebAuthnError::Cancelled);

    // Assert
    assert_eq!(credential.raw_id, Bytes::from(vec![1; 8]));
    assert_eq!(
        operation.start().await.unwrap_err(),
        WebAuthnError::BadOperation
    );
}
