use std::{collections::HashMap, fmt, sync::Arc};

use serde_json::Value;

use super::{webauthn::WebAuthnKind, Callback, CallbackType, CustomCallback};
use crate::AuthError;

/// Builds a registered callback from its JSON.
pub type CallbackDecoder =
    Arc<dyn Fn(&Value) -> Result<Box<dyn CustomCallback>, AuthError> + Send + Sync>;

/// Maps callback `type` tags to decoders.
///
/// Registered decoders take precedence over the built-in set, so an app may replace how a
/// built-in type is handled. Types that are neither registered nor built in are rejected with
/// [`AuthError::UnsupportedCallback`].
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    custom: HashMap<String, CallbackDecoder>,
}

impl CallbackRegistry {
    /// A registry with only the built-in callbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoder for `callback_type`, replacing any earlier one.
    pub fn register<F>(&mut self, callback_type: impl Into<String>, decoder: F)
    where
        F: Fn(&Value) -> Result<Box<dyn CustomCallback>, AuthError> + Send + Sync + 'static,
    {
        let callback_type = callback_type.into();
        log::debug!("Registering decoder for {callback_type}");
        self.custom.insert(callback_type, Arc::new(decoder));
    }

    /// Whether callbacks of this type can be decoded.
    pub fn is_supported(&self, callback_type: &str) -> bool {
        self.custom.contains_key(callback_type) || callback_type.parse::<CallbackType>().is_ok()
    }

    /// Decode one entry of a step's `callbacks` array.
    pub fn decode(&self, json: &Value) -> Result<Callback, AuthError> {
        let wire_type = json
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::InvalidCallbackResponse(format!("missing type: {json}")))?;

        let callback_type: &str = match WebAuthnKind::of(json) {
            Some(WebAuthnKind::Registration) if wire_type == "MetadataCallback" => {
                CallbackType::WebAuthnRegistrationCallback.into()
            }
            Some(WebAuthnKind::Authentication) if wire_type == "MetadataCallback" => {
                CallbackType::WebAuthnAuthenticationCallback.into()
            }
            _ => wire_type,
        };

        if let Some(decoder) = self.custom.get(callback_type) {
            return decoder(json).map(Callback::Custom);
        }
        let builtin = callback_type
            .parse::<CallbackType>()
            .map_err(|_| AuthError::UnsupportedCallback(callback_type.to_owned()))?;
        Callback::decode_builtin(builtin, json)
    }

    /// Decode a whole `callbacks` array, failing on the first bad entry.
    pub fn decode_all(&self, callbacks: &[Value]) -> Result<Vec<Callback>, AuthError> {
        callbacks.iter().map(|json| self.decode(json)).collect()
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}
