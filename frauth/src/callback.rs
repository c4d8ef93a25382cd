//! The callbacks of a tree step.
//!
//! AM describes every input and output of a step as a callback: a `type` tag, an `output` array
//! of named values, and an `input` array of named slots the client fills. Each [`Callback`]
//! variant keeps the JSON it was decoded from, so [`Callback::build_response`] only swaps the
//! input values and hands back the rest exactly as the server sent it.
//!
//! Types unknown to the SDK can be handled by registering a decoder for them in a
//! [`CallbackRegistry`]. Anything that is neither built in nor registered fails the decode.

use std::{any::Any, fmt};

use serde_json::Value;

use crate::AuthError;

mod input;
mod output;
mod registry;
mod validated;
mod webauthn;

pub use self::{
    input::{
        ChoiceCallback, ConfirmationCallback, HiddenValueCallback, KbaCreateCallback,
        OptionType, ReCaptchaCallback, SingleValueCallback, TermsAndConditionsCallback,
    },
    output::{MessageType, MetadataCallback, PollingWaitCallback, TextOutputCallback},
    registry::{CallbackDecoder, CallbackRegistry},
    validated::{FailedPolicy, StringAttributeInputCallback, ValidatedCallback},
    webauthn::{WebAuthnAuthenticationCallback, WebAuthnRegistrationCallback},
};

/// The callback types the SDK decodes without registration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString, strum::Display, strum::IntoStaticStr,
)]
#[allow(missing_docs)]
pub enum CallbackType {
    NameCallback,
    PasswordCallback,
    ChoiceCallback,
    ConfirmationCallback,
    TextOutputCallback,
    PollingWaitCallback,
    HiddenValueCallback,
    MetadataCallback,
    ValidatedCreateUsernameCallback,
    ValidatedCreatePasswordCallback,
    StringAttributeInputCallback,
    TermsAndConditionsCallback,
    KbaCreateCallback,
    ReCaptchaCallback,
    WebAuthnRegistrationCallback,
    WebAuthnAuthenticationCallback,
}

/// A callback type added by the app through [`CallbackRegistry::register`].
pub trait CustomCallback: fmt::Debug + Send + Sync {
    /// The wire `type` this callback was registered for.
    fn callback_type(&self) -> &str;

    /// The JSON sent back to AM for this callback.
    fn build_response(&self) -> Value;

    /// Access to the concrete type, see [`Callback::downcast_mut`].
    fn as_any(&self) -> &dyn Any;

    #[allow(missing_docs)]
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// One callback of a [`Node`](crate::Node).
#[derive(Debug)]
#[allow(missing_docs)]
pub enum Callback {
    Name(SingleValueCallback),
    Password(SingleValueCallback),
    Choice(ChoiceCallback),
    Confirmation(ConfirmationCallback),
    TextOutput(TextOutputCallback),
    PollingWait(PollingWaitCallback),
    HiddenValue(HiddenValueCallback),
    Metadata(MetadataCallback),
    ValidatedCreateUsername(ValidatedCallback),
    ValidatedCreatePassword(ValidatedCallback),
    StringAttributeInput(StringAttributeInputCallback),
    TermsAndConditions(TermsAndConditionsCallback),
    KbaCreate(KbaCreateCallback),
    ReCaptcha(ReCaptchaCallback),
    WebAuthnRegistration(WebAuthnRegistrationCallback),
    WebAuthnAuthentication(WebAuthnAuthenticationCallback),
    Custom(Box<dyn CustomCallback>),
}

impl Callback {
    pub(crate) fn decode_builtin(ty: CallbackType, json: &Value) -> Result<Self, AuthError> {
        Ok(match ty {
            CallbackType::NameCallback => Callback::Name(SingleValueCallback::from_json(json)?),
            CallbackType::PasswordCallback => {
                Callback::Password(SingleValueCallback::from_json(json)?)
            }
            CallbackType::ChoiceCallback => Callback::Choice(ChoiceCallback::from_json(json)?),
            CallbackType::ConfirmationCallback => {
                Callback::Confirmation(ConfirmationCallback::from_json(json)?)
            }
            CallbackType::TextOutputCallback => {
                Callback::TextOutput(TextOutputCallback::from_json(json)?)
            }
            CallbackType::PollingWaitCallback => {
                Callback::PollingWait(PollingWaitCallback::from_json(json)?)
            }
            CallbackType::HiddenValueCallback => {
                Callback::HiddenValue(HiddenValueCallback::from_json(json)?)
            }
            CallbackType::MetadataCallback => Callback::Metadata(MetadataCallback::from_json(json)?),
            CallbackType::ValidatedCreateUsernameCallback => {
                Callback::ValidatedCreateUsername(ValidatedCallback::from_json(json)?)
            }
            CallbackType::ValidatedCreatePasswordCallback => {
                Callback::ValidatedCreatePassword(ValidatedCallback::from_json(json)?)
            }
            CallbackType::StringAttributeInputCallback => {
                Callback::StringAttributeInput(StringAttributeInputCallback::from_json(json)?)
            }
            CallbackType::TermsAndConditionsCallback => {
                Callback::TermsAndConditions(TermsAndConditionsCallback::from_json(json)?)
            }
            CallbackType::KbaCreateCallback => Callback::KbaCreate(KbaCreateCallback::from_json(json)?),
            CallbackType::ReCaptchaCallback => Callback::ReCaptcha(ReCaptchaCallback::from_json(json)?),
            CallbackType::WebAuthnRegistrationCallback => {
                Callback::WebAuthnRegistration(WebAuthnRegistrationCallback::from_json(json)?)
            }
            CallbackType::WebAuthnAuthenticationCallback => {
                Callback::WebAuthnAuthentication(WebAuthnAuthenticationCallback::from_json(json)?)
            }
        })
    }

    /// The callback type, e.g. `NameCallback`.
    ///
    /// WebAuthn callbacks report their WebAuthn type even though AM sends them as
    /// `MetadataCallback`.
    pub fn callback_type(&self) -> &str {
        let ty = match self {
            Callback::Name(_) => CallbackType::NameCallback,
            Callback::Password(_) => CallbackType::PasswordCallback,
            Callback::Choice(_) => CallbackType::ChoiceCallback,
            Callback::Confirmation(_) => CallbackType::ConfirmationCallback,
            Callback::TextOutput(_) => CallbackType::TextOutputCallback,
            Callback::PollingWait(_) => CallbackType::PollingWaitCallback,
            Callback::HiddenValue(_) => CallbackType::HiddenValueCallback,
            Callback::Metadata(_) => CallbackType::MetadataCallback,
            Callback::ValidatedCreateUsername(_) => CallbackType::ValidatedCreateUsernameCallback,
            Callback::ValidatedCreatePassword(_) => CallbackType::ValidatedCreatePasswordCallback,
            Callback::StringAttributeInput(_) => CallbackType::StringAttributeInputCallback,
            Callback::TermsAndConditions(_) => CallbackType::TermsAndConditionsCallback,
            Callback::KbaCreate(_) => CallbackType::KbaCreateCallback,
            Callback::ReCaptcha(_) => CallbackType::ReCaptchaCallback,
            Callback::WebAuthnRegistration(_) => CallbackType::WebAuthnRegistrationCallback,
            Callback::WebAuthnAuthentication(_) => CallbackType::WebAuthnAuthenticationCallback,
            Callback::Custom(custom) => return custom.callback_type(),
        };
        let name: &'static str = ty.into();
        name
    }

    /// The JSON sent back to AM: the callback as received with its input values filled in.
    pub fn build_response(&self) -> Value {
        match self {
            Callback::Name(cb) | Callback::Password(cb) => cb.build_response(),
            Callback::Choice(cb) => cb.build_response(),
            Callback::Confirmation(cb) => cb.build_response(),
            Callback::TextOutput(cb) => cb.build_response(),
            Callback::PollingWait(cb) => cb.build_response(),
            Callback::HiddenValue(cb) => cb.build_response(),
            Callback::Metadata(cb) => cb.build_response(),
            Callback::ValidatedCreateUsername(cb) | Callback::ValidatedCreatePassword(cb) => {
                cb.build_response()
            }
            Callback::StringAttributeInput(cb) => cb.build_response(),
            Callback::TermsAndConditions(cb) => cb.build_response(),
            Callback::KbaCreate(cb) => cb.build_response(),
            Callback::ReCaptcha(cb) => cb.build_response(),
            Callback::WebAuthnRegistration(cb) => cb.build_response(),
            Callback::WebAuthnAuthentication(cb) => cb.build_response(),
            Callback::Custom(cb) => cb.build_response(),
        }
    }

    /// The registered callback as its concrete type, if it is one.
    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        match self {
            Callback::Custom(custom) => custom.as_any_mut().downcast_mut(),
            _ => None,
        }
    }
}

/// The `value` of the output named `name`.
pub(crate) fn output<'a>(json: &'a Value, name: &str) -> Option<&'a Value> {
    json.get("output")?
        .as_array()?
        .iter()
        .find(|o| o.get("name").and_then(Value::as_str) == Some(name))?
        .get("value")
}

pub(crate) fn output_str<'a>(json: &'a Value, name: &str) -> Option<&'a str> {
    output(json, name).and_then(Value::as_str)
}

/// Names of the input slots, in order.
pub(crate) fn input_names(json: &Value) -> Vec<&str> {
    json.get("input")
        .and_then(Value::as_array)
        .map(|inputs| {
            inputs
                .iter()
                .filter_map(|i| i.get("name").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn input_value<'a>(json: &'a Value, name: &str) -> Option<&'a Value> {
    json.get("input")?
        .as_array()?
        .iter()
        .find(|i| i.get("name").and_then(Value::as_str) == Some(name))?
        .get("value")
}

/// Replace the value of the input slot named `name`, leaving everything else untouched.
pub(crate) fn set_input(json: &mut Value, name: &str, value: Value) {
    let Some(inputs) = json.get_mut("input").and_then(Value::as_array_mut) else {
        return;
    };
    if let Some(input) = inputs
        .iter_mut()
        .find(|i| i.get("name").and_then(Value::as_str) == Some(name))
        .and_then(Value::as_object_mut)
    {
        input.insert("value".into(), value);
    }
}

pub(crate) fn invalid(json: &Value) -> AuthError {
    AuthError::InvalidCallbackResponse(json.to_string())
}
