use chrono::{DateTime, Duration, SubsecRound, Utc};
use frauth_transport::{Action, ActionType, Method, Request, Transport};
use frauth_types::encoding;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{
    mechanism::{ACCEPT_API_VERSION, PUSH_API_VERSION},
    PushMechanism,
};
use crate::{jwt, AuthenticatorError, AuthenticatorStore, PushNotificationError};

/// Which answers a notification accepts.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PushType {
    /// Plain approve or deny.
    #[default]
    Default,
    /// The user picks the number shown on the login screen.
    Challenge,
    /// Approval requires local biometric verification.
    Biometric,
}

/// One push authentication request delivered to this device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushNotification {
    /// Message id AM expects back in the answer.
    pub message_id: String,
    /// The mechanism this notification was sent for.
    #[serde(rename = "mechanismUID")]
    pub mechanism_uuid: String,
    /// Load balancer cookie, e.g. `amlbcookie=01`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balance_key: Option<String>,
    /// Seconds the notification can be answered for.
    pub ttl: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[allow(missing_docs)]
    pub time_added: DateTime<Utc>,
    challenge: String,
    #[serde(default)]
    #[allow(missing_docs)]
    pub push_type: PushType,
    /// Comma separated numbers offered for a [`PushType::Challenge`] notification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numbers_challenge: Option<String>,
    /// Text to show to the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// JSON context of the login attempt, e.g. location and user agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_info: Option<String>,
    pending: bool,
    approved: bool,
}

fn claim<'a>(payload: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    payload.get(name).and_then(Value::as_str)
}

impl PushNotification {
    /// Build a notification from the claims of the JWT AM delivered with `message_id`.
    pub fn from_payload(
        message_id: impl Into<String>,
        payload: &Map<String, Value>,
    ) -> Result<Self, PushNotificationError> {
        let invalid = |what: &str| PushNotificationError::InvalidPayload(what.to_owned());
        let challenge = claim(payload, "c").ok_or_else(|| invalid("missing challenge"))?;
        let load_balance_key =
            claim(payload, "l").ok_or_else(|| invalid("missing load balance key"))?;
        let ttl = claim(payload, "t")
            .and_then(|ttl| ttl.parse::<u64>().ok())
            .ok_or_else(|| invalid("missing or invalid ttl"))?;
        let mechanism_uuid = claim(payload, "u").ok_or_else(|| invalid("missing Mechanism UUID"))?;
        let push_type = match claim(payload, "k") {
            Some(k) => k
                .parse()
                .map_err(|_| PushNotificationError::InvalidPushType(k.to_owned()))?,
            None => PushType::Default,
        };

        Ok(Self {
            message_id: message_id.into(),
            mechanism_uuid: mechanism_uuid.to_owned(),
            load_balance_key: encoding::decode_to_string(load_balance_key),
            ttl,
            time_added: Utc::now().trunc_subsecs(3),
            challenge: encoding::url_safe_to_standard(challenge),
            push_type,
            numbers_challenge: claim(payload, "n").map(str::to_owned),
            message: claim(payload, "m").map(str::to_owned),
            context_info: claim(payload, "x").map(str::to_owned),
            pending: true,
            approved: false,
        })
    }

    /// `<mechanismUUID>-<timeAdded in milliseconds>`
    pub fn identifier(&self) -> String {
        format!(
            "{}-{}",
            self.mechanism_uuid,
            self.time_added.timestamp_millis()
        )
    }

    /// The challenge, standard base64.
    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    /// Still unanswered but past its time to live.
    pub fn is_expired(&self) -> bool {
        let deadline = i64::try_from(self.ttl)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| self.time_added.checked_add_signed(ttl));
        self.pending && deadline.is_some_and(|deadline| Utc::now() > deadline)
    }

    /// Unanswered and not expired.
    pub fn is_pending(&self) -> bool {
        self.pending && !self.is_expired()
    }

    #[allow(missing_docs)]
    pub fn is_approved(&self) -> bool {
        !self.pending && self.approved
    }

    #[allow(missing_docs)]
    pub fn is_denied(&self) -> bool {
        !self.pending && !self.approved
    }

    /// The numbers of a [`PushType::Challenge`] notification.
    pub fn numbers(&self) -> Vec<u32> {
        self.numbers_challenge
            .as_deref()
            .map(|numbers| {
                numbers
                    .split(',')
                    .filter_map(|n| n.trim().parse().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn ensure_type(&self, expected: PushType) -> Result<(), PushNotificationError> {
        if self.push_type != expected {
            return Err(PushNotificationError::InvalidPushType(
                self.push_type.to_string(),
            ));
        }
        Ok(())
    }

    /// Approve a [`PushType::Default`] notification.
    pub async fn accept<T: Transport + ?Sized>(
        &mut self,
        store: &AuthenticatorStore,
        transport: &T,
    ) -> Result<(), AuthenticatorError> {
        self.ensure_type(PushType::Default)?;
        self.answer(true, None, store, transport).await
    }

    /// Approve a [`PushType::Challenge`] notification with the number the user picked.
    pub async fn accept_with_challenge<T: Transport + ?Sized>(
        &mut self,
        challenge_response: &str,
        store: &AuthenticatorStore,
        transport: &T,
    ) -> Result<(), AuthenticatorError> {
        self.ensure_type(PushType::Challenge)?;
        self.answer(true, Some(challenge_response), store, transport)
            .await
    }

    /// Approve a [`PushType::Biometric`] notification once the user passed local verification.
    pub async fn accept_with_biometric<T: Transport + ?Sized>(
        &mut self,
        store: &AuthenticatorStore,
        transport: &T,
    ) -> Result<(), AuthenticatorError> {
        self.ensure_type(PushType::Biometric)?;
        self.answer(true, None, store, transport).await
    }

    /// Deny the notification, whatever its type.
    pub async fn deny<T: Transport + ?Sized>(
        &mut self,
        store: &AuthenticatorStore,
        transport: &T,
    ) -> Result<(), AuthenticatorError> {
        self.answer(false, None, store, transport).await
    }

    async fn answer<T: Transport + ?Sized>(
        &mut self,
        approved: bool,
        challenge_response: Option<&str>,
        store: &AuthenticatorStore,
        transport: &T,
    ) -> Result<(), AuthenticatorError> {
        if !self.is_pending() {
            return Err(PushNotificationError::NotificationInvalidStatus.into());
        }
        let Some(mechanism) = store.mechanism(&self.mechanism_uuid)? else {
            log::error!(
                "Failed to retrieve PushMechanism for notification {}",
                self.identifier()
            );
            return Err(PushNotificationError::StorageError(format!(
                "Failed to retrieve PushMechanism object with given UUID: {}",
                self.mechanism_uuid
            ))
            .into());
        };
        if let Some(account) = store.account(&mechanism.account_identifier())? {
            account.ensure_unlocked()?;
        }
        let request = self.request(approved, challenge_response, &mechanism)?;

        self.pending = false;
        self.approved = approved;
        if let Err(e) = store.set_notification(self) {
            log::warn!("Failed to save PushNotification {}: {e}", self.identifier());
        }

        match transport
            .invoke(request, Action::new(ActionType::PushAuthenticate))
            .await
        {
            Ok(_) => {
                log::debug!("PushNotification {} answered", self.identifier());
                Ok(())
            }
            Err(e) => {
                log::info!("PushNotification authentication failed: {e}");
                self.pending = true;
                self.approved = false;
                if let Err(e) = store.set_notification(self) {
                    log::warn!("Failed to save PushNotification {}: {e}", self.identifier());
                }
                Err(e.into())
            }
        }
    }

    fn request(
        &self,
        approved: bool,
        challenge_response: Option<&str>,
        mechanism: &PushMechanism,
    ) -> Result<Request, AuthenticatorError> {
        let mut claims = Map::new();
        claims.insert(
            "response".into(),
            jwt::challenge_response(&self.challenge, mechanism.secret())?.into(),
        );
        if let Some(number) = challenge_response {
            claims.insert("challengeResponse".into(), number.into());
        }
        if !approved {
            claims.insert("deny".into(), true.into());
        }
        let jwt = jwt::sign(mechanism.secret(), &claims)?;

        let mut request = Request::new(Method::Post, mechanism.auth_endpoint.as_str())
            .header(ACCEPT_API_VERSION, PUSH_API_VERSION)
            .json(json!({ "messageId": self.message_id, "jwt": jwt }));
        if let Some(key) = &self.load_balance_key {
            request.set_header("Set-Cookie", key.as_str());
        }
        Ok(request)
    }

    #[cfg(test)]
    pub(crate) fn added_at(mut self, time_added: DateTime<Utc>) -> Self {
        self.time_added = time_added;
        self
    }
}
