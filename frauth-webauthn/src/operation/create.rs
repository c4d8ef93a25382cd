use std::sync::Arc;

use frauth_types::webauthn::{
    AttestationConveyancePreference, AttestationObject, AuthenticatorAttestationResponse,
    AuthenticatorTransport, CreatedPublicKeyCredential, PublicKeyCredential,
    PublicKeyCredentialCreationOptions, PublicKeyCredentialRpEntity, UserVerificationRequirement,
};
use tokio::sync::mpsc;

use super::{outcome, Lifecycle};
use crate::{
    session::{MakeCredentialEvent, MakeCredentialRequest, MakeCredentialSession},
    ClientData, WebAuthnError,
};

/// A credential creation ceremony.
///
/// Cloning gives another handle to the same operation, e.g. to [`cancel`](Self::cancel) it while
/// another task awaits [`start`](Self::start).
pub struct CreateOperation<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for CreateOperation<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<S> {
    options: PublicKeyCredentialCreationOptions,
    rp_id: String,
    client_data: ClientData,
    session: S,
    lifecycle: Lifecycle<CreatedPublicKeyCredential>,
}

impl<S: MakeCredentialSession + 'static> CreateOperation<S> {
    pub(crate) fn new(
        options: PublicKeyCredentialCreationOptions,
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
                lifecycle: Lifecycle::new(lifetime),
            }),
        }
    }

    /// Run the ceremony until the authenticator produces a credential or the operation stops.
    ///
    /// Fails right away with [`WebAuthnError::BadOperation`] when the operation was already started
    /// or stopped.
    pub async fn start(&self) -> Result<CreatedPublicKeyCredential, WebAuthnError> {
        log::debug!("<CreateOperation> start");
        let rx = self.inner.lifecycle.begin()?;

        let timer = {
            let inner = self.inner.clone();
            tokio::spawn(async move {
                tokio::time::sleep(inner.lifecycle.lifetime()).await;
                log::debug!("<CreateOperation> timeout");
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

    /// Cancel a running operation.
    ///
    /// Sessions on the [`Internal`](AuthenticatorTransport::Internal) transport own their UI and
    /// are asked to wind down themselves; anything else stops immediately.
    pub fn cancel(&self, reason: WebAuthnError) {
        self.inner.cancel(reason);
    }

    /// The client data JSON the authenticator signs over.
    pub fn client_data_json(&self) -> &str {
        &self.inner.client_data.json
    }
}

impl<S: MakeCredentialSession> Inner<S> {
    fn cancel(&self, reason: WebAuthnError) {
        log::debug!("<CreateOperation> cancel");
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
        log::debug!("<CreateOperation> stop by {reason:?}");
        if let Some(settled) = self.lifecycle.settle() {
            self.session.cancel(reason);
            settled.dispatch(Err(reason));
        }
    }

    fn completed(&self, credential: CreatedPublicKeyCredential) {
        log::debug!("<CreateOperation> completed");
        if let Some(settled) = self.lifecycle.settle() {
            settled.dispatch(Ok(credential));
        }
    }

    fn on_event(&self, event: MakeCredentialEvent) {
        match event {
            MakeCredentialEvent::BecameAvailable => self.on_available(),
            MakeCredentialEvent::BecameUnavailable => {
                log::debug!("<CreateOperation> authenticator became unavailable");
                self.stop(WebAuthnError::NotAllowed);
            }
            MakeCredentialEvent::MadeCredential(attestation) => self.on_credential(attestation),
            MakeCredentialEvent::StoppedOperation(reason) => {
                log::debug!("<CreateOperation> authenticator stopped operation");
                self.stop(reason);
            }
        }
    }

    fn user_verification(&self) -> bool {
        let requirement = self
            .options
            .authenticator_selection
            .map(|s| s.user_verification)
            .unwrap_or(UserVerificationRequirement::Discouraged);
        match requirement {
            UserVerificationRequirement::Required => true,
            UserVerificationRequirement::Preferred => self.session.can_perform_user_verification(),
            UserVerificationRequirement::Discouraged => false,
        }
    }

    fn on_available(&self) {
        log::debug!("<CreateOperation> authenticator became available");
        if self.lifecycle.is_stopped() {
            return;
        }

        if let Some(selection) = &self.options.authenticator_selection {
            if let Some(attachment) = selection.authenticator_attachment {
                if attachment != self.session.attachment() {
                    log::debug!("<CreateOperation> authenticator attachment doesn't match");
                    return self.stop(WebAuthnError::Unsupported);
                }
            }
            if selection.require_resident_key && !self.session.can_store_resident_key() {
                log::debug!("<CreateOperation> authenticator can't store resident keys");
                return self.stop(WebAuthnError::Unsupported);
            }
            if selection.user_verification == UserVerificationRequirement::Required
                && !self.session.can_perform_user_verification()
            {
                log::debug!("<CreateOperation> authenticator can't verify the user");
                return self.stop(WebAuthnError::Unsupported);
            }
        }

        let require_user_verification = self.user_verification();
        let transport = self.session.transport();
        let exclude_credentials = self
            .options
            .exclude_credentials
            .iter()
            .filter(|descriptor| descriptor.is_reachable_over(transport))
            .cloned()
            .collect();

        self.session.make_credential(MakeCredentialRequest {
            client_data_hash: self.client_data.hash,
            rp: PublicKeyCredentialRpEntity {
                id: Some(self.rp_id.clone()),
                name: self.options.rp.name.clone(),
            },
            user: self.options.user.clone(),
            require_resident_key: self
                .options
                .authenticator_selection
                .map(|s| s.require_resident_key)
                .unwrap_or(false),
            require_user_presence: !require_user_verification,
            require_user_verification,
            attestation: self.options.attestation,
            pub_key_cred_params: self.options.pub_key_cred_params.clone(),
            exclude_credentials,
        });
    }

    fn on_credential(&self, attestation: AttestationObject) {
        log::debug!("<CreateOperation> authenticator made credential");
        let Some(credential_id) = attestation
            .auth_data
            .attested_credential_data
            .as_ref()
            .map(|acd| acd.credential_id().to_vec())
        else {
            log::debug!("<CreateOperation> attested credential data not found");
            return self.stop(WebAuthnError::Unknown);
        };

        let attestation = if self.options.attestation == AttestationConveyancePreference::None
            && !attestation.is_self_attestation()
        {
            log::debug!("<CreateOperation> replacing attestation with none");
            attestation.to_none()
        } else {
            attestation
        };
        let attestation_object = match attestation.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("<CreateOperation> failed to build attestation object: {e}");
                return self.stop(WebAuthnError::Unknown);
            }
        };

        self.completed(PublicKeyCredential::new(
            credential_id.into(),
            AuthenticatorAttestationResponse {
                client_data_json: self.client_data.json.clone(),
                attestation_object,
            },
        ));
    }
}
