use std::sync::{Arc, Mutex, PoisonError};

use frauth_types::{
    webauthn::{
        AuthenticatedPublicKeyCredential, AuthenticatorAssertionResponse, AuthenticatorTransport,
        PublicKeyCredential, PublicKeyCredentialDescriptor, PublicKeyCredentialRequestOptions,
        UserVerificationRequirement,
    },
    Bytes,
};
use tokio::sync::mpsc;

use super::{outcome, Lifecycle};
use crate::{
    session::{AssertionResult, GetAssertionEvent, GetAssertionRequest, GetAssertionSession},
    ClientData, WebAuthnError,
};

/// An assertion ceremony.
///
/// Cloning gives another handle to the same operation.
pub struct GetOperation<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for GetOperation<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<S> {
    options: PublicKeyCredentialRequestOptions,
    rp_id: String,
    client_data: ClientData,
    session: S,
    saved_credential_id: Mutex<Option<Bytes>>,
    lifecycle: Lifecycle<AuthenticatedPublicKeyCredential>,
}

impl<S: GetAssertionSession + 'static> GetOperation<S> {
    pub(crate) fn new(
        options: PublicKeyCredentialRequestOptions,
        rp_id: String,
        client_data: ClientData,
        session: S,
        lifetime: std::time::Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                options,
                rp_id,
                client_data,
                session,
                saved_credential_id: Mutex::new(None),
                lifecycle: Lifecycle::new(lifetime),
            }),
        }
    }

    /// Run the ceremony until the authenticator signs the challenge or the operation stops.
    ///
    /// Fails right away with [`WebAuthnError::BadOperation`] when the operation was already started
    /// or stopped.
    pub async fn start(&self) -> Result<AuthenticatedPublicKeyCredential, WebAuthnError> {
        log::debug!("<GetOperation> start");
        let rx = self.inner.lifecycle.begin()?;

        let timer = {
            let inner = self.inner.clone();
            tokio::spawn(async move {
                tokio::time::sleep(inner.lifecycle.lifetime()).await;
                log::debug!("<GetOperation> timeout");
                inner.cancel(WebAuthnError::Timeout);
            })
        };
        self.inner.lifecycle.arm_timer(timer);

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let (tx, mut events) = mpsc::unbounded_channel();
            inner.session.start(tx);
            while let Some(event) = events.recv().await {
                inner.on_event(event);
                if inner.lifecycle.is_stopped() {
                    break;
                }
            }
        });

        outcome(rx).await
    }

    /// Cancel a running operation, see [`CreateOperation::cancel`](super::CreateOperation::cancel).
    pub fn cancel(&self, reason: WebAuthnError) {
        self.inner.cancel(reason);
    }

    /// The client data JSON the authenticator signs over.
    pub fn client_data_json(&self) -> &str {
        &self.inner.client_data.json
    }
}

impl<S: GetAssertionSession> Inner<S> {
    fn cancel(&self, reason: WebAuthnError) {
        log::debug!("<GetOperation> cancel");
        if !self.lifecycle.is_running() {
            return;
        }
        if self.session.transport() == AuthenticatorTransport::Internal {
            let reason = if reason == WebAuthnError::Timeout {
                WebAuthnError::Timeout
            } else {
                WebAuthnError::Cancelled
            };
            self.session.cancel(reason);
        } else {
            self.stop(reason);
        }
    }

    fn stop(&self, reason: WebAuthnError) {
        log::debug!("<GetOperation> stop by {reason:?}");
        if let Some(settled) = self.lifecycle.settle() {
            self.session.cancel(reason);
            settled.dispatch(Err(reason));
        }
    }

    fn on_event(&self, event: GetAssertionEvent) {
        match event {
            GetAssertionEvent::BecameAvailable => self.on_available(),
            GetAssertionEvent::BecameUnavailable => {
                log::debug!("<GetOperation> authenticator became unavailable");
                self.stop(WebAuthnError::NotAllowed);
            }
            GetAssertionEvent::DiscoveredCredential(assertion) => self.on_assertion(assertion),
            GetAssertionEvent::StoppedOperation(reason) => {
                log::debug!("<GetOperation> authenticator stopped operation");
                self.stop(reason);
            }
        }
    }

    fn on_available(&self) {
        log::debug!("<GetOperation> authenticator became available");
        if self.lifecycle.is_stopped() {
            return;
        }

        let can_verify = self.session.can_perform_user_verification();
        if self.options.user_verification == UserVerificationRequirement::Required && !can_verify {
            log::debug!("<GetOperation> user verification is required but unsupported");
            return self.stop(WebAuthnError::Unsupported);
        }
        let require_user_verification = match self.options.user_verification {
            UserVerificationRequirement::Required => true,
            UserVerificationRequirement::Preferred => can_verify,
            UserVerificationRequirement::Discouraged => false,
        };

        let allow_credentials: Vec<PublicKeyCredentialDescriptor> =
            if self.options.allow_credentials.is_empty() {
                Vec::new()
            } else {
                let transport = self.session.transport();
                let reachable: Vec<_> = self
                    .options
                    .allow_credentials
                    .iter()
                    .filter(|descriptor| descriptor.is_reachable_over(transport))
                    .cloned()
                    .collect();
                if reachable.is_empty() {
                    log::debug!("<GetOperation> no allowed credential on this authenticator");
                    return self.stop(WebAuthnError::NotAllowed);
                }
                if let [only] = reachable.as_slice() {
                    *self
                        .saved_credential_id
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner) = Some(only.id.clone());
                }
                reachable
            };

        self.session.get_assertion(GetAssertionRequest {
            rp_id: self.rp_id.clone(),
            client_data_hash: self.client_data.hash,
            allow_credentials,
            require_user_presence: !require_user_verification,
            require_user_verification,
        });
    }

    fn on_assertion(&self, assertion: AssertionResult) {
        log::debug!("<GetOperation> authenticator discovered credential");
        let saved = self
            .saved_credential_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(credential_id) = saved.or(assertion.credential_id) else {
            log::debug!("<GetOperation> credential id not found");
            return self.stop(WebAuthnError::Unknown);
        };

        if let Some(settled) = self.lifecycle.settle() {
            log::debug!("<GetOperation> completed");
            settled.dispatch(Ok(PublicKeyCredential::new(
                credential_id,
                AuthenticatorAssertionResponse {
                    client_data_json: self.client_data.json.clone(),
                    authenticator_data: assertion.authenticator_data,
                    signature: assertion.signature,
                    user_handle: assertion.user_handle,
                },
            )));
        }
    }
}
