use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use frauth_transport::{Action, ActionType, Method, Request, Transport};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use url::Url;
use zeroize::Zeroizing;

use super::{PushNotification, PushRegistrationUri};
use crate::{jwt, AuthenticatorError, MechanismError};

pub(crate) const ACCEPT_API_VERSION: &str = "Accept-API-Version";
pub(crate) const PUSH_API_VERSION: &str = "resource=1.0, protocol=1.0";
const MECHANISM_TYPE: &str = "push";
pub(crate) const DEFAULT_DEVICE_TYPE: &str = "ios";
pub(crate) const DEFAULT_COMMUNICATION_TYPE: &str = "apns";

/// How this device presents itself when registering for push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRegistration {
    /// Token the push service delivers notifications to.
    pub device_token: String,
    /// Defaults to `ios`.
    pub device_type: String,
    /// Defaults to `apns`.
    pub communication_type: String,
}

impl DeviceRegistration {
    /// A registration for `device_token` with the default device constants.
    pub fn new(device_token: impl Into<String>) -> Self {
        Self {
            device_token: device_token.into(),
            device_type: DEFAULT_DEVICE_TYPE.into(),
            communication_type: DEFAULT_COMMUNICATION_TYPE.into(),
        }
    }
}

/// A registered push second factor.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMechanism {
    /// Uppercase UUID AM puts in the `u` claim of every notification for this mechanism.
    #[serde(rename = "mechanismUID")]
    pub mechanism_uuid: String,
    #[allow(missing_docs)]
    pub issuer: String,
    #[allow(missing_docs)]
    pub account_name: String,
    secret: Zeroizing<String>,
    /// Where notifications are answered.
    #[serde(rename = "authenticationEndpoint")]
    pub auth_endpoint: Url,
    /// Where the device registers itself.
    #[serde(rename = "registrationEndpoint")]
    pub reg_endpoint: Url,
    /// Message id of the registration request.
    pub message_id: String,
    /// Registration challenge, standard base64.
    pub challenge: String,
    /// Load balancer cookie sent along with registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancer: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[allow(missing_docs)]
    pub time_added: DateTime<Utc>,
    /// Notifications attached when read through the manager. Never persisted.
    #[serde(skip)]
    pub notifications: Vec<PushNotification>,
}

impl fmt::Debug for PushMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushMechanism")
            .field("mechanism_uuid", &self.mechanism_uuid)
            .field("issuer", &self.issuer)
            .field("account_name", &self.account_name)
            .field("auth_endpoint", &self.auth_endpoint.as_str())
            .field("reg_endpoint", &self.reg_endpoint.as_str())
            .field("time_added", &self.time_added)
            .finish_non_exhaustive()
    }
}

impl From<&PushRegistrationUri> for PushMechanism {
    fn from(uri: &PushRegistrationUri) -> Self {
        Self {
            mechanism_uuid: uuid::Uuid::new_v4().to_string().to_uppercase(),
            issuer: uri.issuer.clone(),
            account_name: uri.account_name.clone(),
            secret: Zeroizing::new(uri.secret.clone()),
            auth_endpoint: uri.authentication_endpoint.clone(),
            reg_endpoint: uri.registration_endpoint.clone(),
            message_id: uri.message_id.clone(),
            challenge: uri.challenge.clone(),
            load_balancer: uri.load_balancer.clone(),
            time_added: Utc::now().trunc_subsecs(3),
            notifications: Vec::new(),
        }
    }
}

impl PushMechanism {
    /// `<issuer>-<accountName>-push`
    pub fn identifier(&self) -> String {
        format!("{}-{}-{MECHANISM_TYPE}", self.issuer, self.account_name)
    }

    /// Identifier of the owning [`Account`](crate::Account).
    pub fn account_identifier(&self) -> String {
        format!("{}-{}", self.issuer, self.account_name)
    }

    /// Always `push`.
    pub fn mechanism_type(&self) -> &'static str {
        MECHANISM_TYPE
    }

    pub(crate) fn secret(&self) -> &str {
        &self.secret
    }

    /// Notifications that can still be answered.
    pub fn pending_notifications(&self) -> impl Iterator<Item = &PushNotification> {
        self.notifications.iter().filter(|n| n.is_pending())
    }

    /// The registration endpoint with `_action=register` swapped for `_action=refresh`.
    pub fn update_endpoint(&self) -> Url {
        let mut url = self.reg_endpoint.clone();
        if url.query().is_none() {
            return url;
        }
        let pairs: Vec<(String, String)> = self
            .reg_endpoint
            .query_pairs()
            .map(|(name, value)| {
                let value = if name == "_action" && value == "register" {
                    "refresh".to_owned()
                } else {
                    value.into_owned()
                };
                (name.into_owned(), value)
            })
            .collect();
        url.query_pairs_mut().clear().extend_pairs(pairs);
        url
    }

    fn device_claims(
        &self,
        device: &DeviceRegistration,
    ) -> Result<Map<String, Value>, AuthenticatorError> {
        let mut claims = Map::new();
        claims.insert(
            "response".into(),
            jwt::challenge_response(&self.challenge, self.secret())?.into(),
        );
        claims.insert("mechanismUid".into(), self.mechanism_uuid.clone().into());
        claims.insert("deviceId".into(), device.device_token.clone().into());
        claims.insert("deviceType".into(), device.device_type.clone().into());
        claims.insert(
            "communicationType".into(),
            device.communication_type.clone().into(),
        );
        Ok(claims)
    }

    fn device_request(
        &self,
        url: &Url,
        device: &DeviceRegistration,
    ) -> Result<Request, AuthenticatorError> {
        let claims = self.device_claims(device)?;
        let jwt = jwt::sign(self.secret(), &claims)?;
        let mut request = Request::new(Method::Post, url.as_str())
            .header(ACCEPT_API_VERSION, PUSH_API_VERSION)
            .json(json!({ "messageId": self.message_id, "jwt": jwt }));
        if let Some(load_balancer) = &self.load_balancer {
            request.set_header("Set-Cookie", load_balancer.as_str());
        }
        Ok(request)
    }

    /// Register this device with AM.
    pub async fn register<T: Transport + ?Sized>(
        &self,
        device: &DeviceRegistration,
        transport: &T,
    ) -> Result<(), AuthenticatorError> {
        log::debug!("Registering push mechanism {}", self.identifier());
        let request = self.device_request(&self.reg_endpoint, device)?;
        transport
            .invoke(request, Action::new(ActionType::PushRegister))
            .await?;
        log::debug!("Push mechanism {} registered", self.identifier());
        Ok(())
    }

    /// Send a new device token to AM for this mechanism.
    pub async fn update_device_token<T: Transport + ?Sized>(
        &self,
        device: &DeviceRegistration,
        transport: &T,
    ) -> Result<(), AuthenticatorError> {
        log::debug!("Updating device token of push mechanism {}", self.identifier());
        let request = self.device_request(&self.update_endpoint(), device)?;
        transport
            .invoke(request, Action::new(ActionType::PushRegister))
            .await
            .map_err(|e| {
                log::warn!("Device token update of {} failed: {e}", self.identifier());
                MechanismError::FailedToUpdateInformation(e.to_string())
            })?;
        Ok(())
    }
}
