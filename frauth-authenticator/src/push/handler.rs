use serde_json::Value;

use super::PushNotification;
use crate::{jwt, AuthenticatorError, AuthenticatorStore, CryptoError, PushNotificationError};

/// Turn a remote notification into a stored [`PushNotification`].
///
/// `user_info` is the notification dictionary, `{"aps": {"messageId": .., "data": <jwt>}}`.
/// Gives `Ok(None)` when it isn't an AM push authentication message at all. The JWT is read
/// unverified to find its mechanism, then verified with that mechanism's secret before anything
/// is stored.
pub fn handle_notification(
    store: &AuthenticatorStore,
    user_info: &Value,
) -> Result<Option<PushNotification>, AuthenticatorError> {
    let aps = user_info.get("aps");
    let jwt = aps.and_then(|aps| aps.get("data")).and_then(Value::as_str);
    let message_id = aps.and_then(|aps| aps.get("messageId")).and_then(Value::as_str);
    let (Some(jwt), Some(message_id)) = (jwt, message_id) else {
        log::info!("Remote-notification is not a valid format for AM push authentication; ignoring it");
        return Ok(None);
    };

    let payload = jwt::extract_payload(jwt)?;
    let notification = PushNotification::from_payload(message_id, &payload)?;

    let Some(mechanism) = store.mechanism(&notification.mechanism_uuid)? else {
        log::error!("Failed to retrieve PushMechanism {}", notification.mechanism_uuid);
        return Err(PushNotificationError::StorageError(format!(
            "Failed to retrieve PushMechanism object with given UUID: {}",
            notification.mechanism_uuid
        ))
        .into());
    };
    if !jwt::verify(mechanism.secret(), jwt)? {
        log::error!("Failed to verify JWT of remote-notification {message_id}");
        return Err(CryptoError::InvalidJwt("signature does not match".into()).into());
    }

    if let Err(e) = store.set_notification(&notification) {
        log::warn!("PushNotification failed to be stored: {e}");
    }
    log::debug!("PushNotification {} received", notification.identifier());
    Ok(Some(notification))
}
