use serde_json::{json, Value};

use super::{input_names, input_value, invalid, output, output_str, set_input};
use crate::AuthError;

/// A callback with a single input slot, e.g. `NameCallback` or `PasswordCallback`.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleValueCallback {
    raw: Value,
    input_name: String,
    prompt: Option<String>,
    value: Value,
}

impl SingleValueCallback {
    pub(crate) fn from_json(json: &Value) -> Result<Self, AuthError> {
        let input_name = input_names(json)
            .into_iter()
            .find(|name| !name.ends_with("validateOnly"))
            .ok_or_else(|| invalid(json))?
            .to_owned();
        let value = input_value(json, &input_name).cloned().unwrap_or(Value::Null);
        Ok(Self {
            raw: json.clone(),
            prompt: output_str(json, "prompt").map(str::to_owned),
            input_name,
            value,
        })
    }

    /// The label AM wants shown next to the input.
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    /// Name of the input slot, e.g. `IDToken1`.
    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    #[allow(missing_docs)]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[allow(missing_docs)]
    pub fn set_value(&mut self, value: impl Into<Value>) {
        self.value = value.into();
    }

    /// The callback JSON as AM sent it.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub(crate) fn build_response(&self) -> Value {
        let mut json = self.raw.clone();
        set_input(&mut json, &self.input_name, self.value.clone());
        json
    }
}

/// A list of choices answered with the index of the selected one.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceCallback {
    inner: SingleValueCallback,
    choices: Vec<String>,
    default_choice: u64,
}

impl ChoiceCallback {
    pub(crate) fn from_json(json: &Value) -> Result<Self, AuthError> {
        let choices = strings(output(json, "choices")).ok_or_else(|| invalid(json))?;
        let default_choice = output(json, "defaultChoice")
            .and_then(Value::as_u64)
            .unwrap_or_default();
        let mut inner = SingleValueCallback::from_json(json)?;
        inner.set_value(default_choice);
        Ok(Self {
            inner,
            choices,
            default_choice,
        })
    }

    #[allow(missing_docs)]
    pub fn prompt(&self) -> Option<&str> {
        self.inner.prompt()
    }

    #[allow(missing_docs)]
    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    #[allow(missing_docs)]
    pub fn default_choice(&self) -> u64 {
        self.default_choice
    }

    /// The index currently selected.
    pub fn selected(&self) -> Option<u64> {
        self.inner.value().as_u64()
    }

    /// Select a choice by index. Out of range indices are refused.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.choices.len() {
            return false;
        }
        self.inner.set_value(index);
        true
    }

    pub(crate) fn build_response(&self) -> Value {
        self.inner.build_response()
    }
}

/// How the options of a [`ConfirmationCallback`] are meant to be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum OptionType {
    Unspecified,
    YesNo,
    YesNoCancel,
    OkCancel,
}

impl TryFrom<i64> for OptionType {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(OptionType::Unspecified),
            0 => Ok(OptionType::YesNo),
            1 => Ok(OptionType::YesNoCancel),
            2 => Ok(OptionType::OkCancel),
            other => Err(other),
        }
    }
}

/// A set of options answered with the index of the chosen one.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationCallback {
    inner: SingleValueCallback,
    prompt: Option<String>,
    options: Vec<String>,
    option_type: OptionType,
    message_type: super::MessageType,
    default_option: i64,
}

impl ConfirmationCallback {
    pub(crate) fn from_json(json: &Value) -> Result<Self, AuthError> {
        let options = strings(output(json, "options")).ok_or_else(|| invalid(json))?;
        let int = |name| output(json, name).and_then(Value::as_i64);
        let option_type = int("optionType")
            .and_then(|v| OptionType::try_from(v).ok())
            .ok_or_else(|| invalid(json))?;
        let message_type = int("messageType")
            .and_then(|v| super::MessageType::try_from(v).ok())
            .ok_or_else(|| invalid(json))?;
        let default_option = int("defaultOption").unwrap_or(-1);
        let mut inner = SingleValueCallback::from_json(json)?;
        if default_option >= 0 {
            inner.set_value(default_option);
        }
        Ok(Self {
            inner,
            prompt: output_str(json, "prompt").map(str::to_owned),
            options,
            option_type,
            message_type,
            default_option,
        })
    }

    #[allow(missing_docs)]
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    #[allow(missing_docs)]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[allow(missing_docs)]
    pub fn option_type(&self) -> OptionType {
        self.option_type
    }

    #[allow(missing_docs)]
    pub fn message_type(&self) -> super::MessageType {
        self.message_type
    }

    /// Index of the default option, `-1` when none.
    pub fn default_option(&self) -> i64 {
        self.default_option
    }

    /// Choose an option by index. Out of range indices are refused.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.options.len() {
            return false;
        }
        self.inner.set_value(index);
        true
    }

    pub(crate) fn build_response(&self) -> Value {
        self.inner.build_response()
    }
}

/// A value the server hands to the client, optionally expecting one back.
///
/// The WebAuthn nodes use the one with id `webAuthnOutcome` to receive the ceremony result.
#[derive(Debug, Clone, PartialEq)]
pub struct HiddenValueCallback {
    inner: SingleValueCallback,
    id: String,
}

impl HiddenValueCallback {
    /// Id of the hidden value that carries a WebAuthn outcome.
    pub const WEBAUTHN_OUTCOME: &'static str = "webAuthnOutcome";

    pub(crate) fn from_json(json: &Value) -> Result<Self, AuthError> {
        let id = output_str(json, "id").ok_or_else(|| invalid(json))?.to_owned();
        let mut inner = SingleValueCallback::from_json(json)?;
        if inner.value().is_null() {
            if let Some(value) = output(json, "value") {
                inner.set_value(value.clone());
            }
        }
        Ok(Self { inner, id })
    }

    #[allow(missing_docs)]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[allow(missing_docs)]
    pub fn value(&self) -> Option<&str> {
        self.inner.value().as_str()
    }

    #[allow(missing_docs)]
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.inner.set_value(value.into());
    }

    #[allow(missing_docs)]
    pub fn is_webauthn_outcome(&self) -> bool {
        self.id == Self::WEBAUTHN_OUTCOME
    }

    pub(crate) fn build_response(&self) -> Value {
        self.inner.build_response()
    }
}

/// Terms the user accepts by answering `true`.
#[derive(Debug, Clone, PartialEq)]
pub struct TermsAndConditionsCallback {
    inner: SingleValueCallback,
    version: String,
    terms: String,
    create_date: String,
}

impl TermsAndConditionsCallback {
    pub(crate) fn from_json(json: &Value) -> Result<Self, AuthError> {
        let field = |name| output_str(json, name).map(str::to_owned).ok_or_else(|| invalid(json));
        let mut inner = SingleValueCallback::from_json(json)?;
        inner.set_value(false);
        Ok(Self {
            version: field("version")?,
            terms: field("terms")?,
            create_date: field("createDate")?,
            inner,
        })
    }

    #[allow(missing_docs)]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[allow(missing_docs)]
    pub fn terms(&self) -> &str {
        &self.terms
    }

    #[allow(missing_docs)]
    pub fn create_date(&self) -> &str {
        &self.create_date
    }

    #[allow(missing_docs)]
    pub fn accept(&mut self, accepted: bool) {
        self.inner.set_value(accepted);
    }

    pub(crate) fn build_response(&self) -> Value {
        self.inner.build_response()
    }
}

/// A reCAPTCHA challenge answered with the token the widget produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ReCaptchaCallback {
    inner: SingleValueCallback,
    site_key: String,
}

impl ReCaptchaCallback {
    pub(crate) fn from_json(json: &Value) -> Result<Self, AuthError> {
        let site_key = output_str(json, "recaptchaSiteKey")
            .ok_or_else(|| invalid(json))?
            .to_owned();
        Ok(Self {
            inner: SingleValueCallback::from_json(json)?,
            site_key,
        })
    }

    #[allow(missing_docs)]
    pub fn site_key(&self) -> &str {
        &self.site_key
    }

    #[allow(missing_docs)]
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.inner.set_value(token.into());
    }

    pub(crate) fn build_response(&self) -> Value {
        self.inner.build_response()
    }
}

/// Creation of a security question and its answer.
#[derive(Debug, Clone, PartialEq)]
pub struct KbaCreateCallback {
    raw: Value,
    prompt: Option<String>,
    predefined_questions: Vec<String>,
    question_input: String,
    answer_input: String,
    question: Option<String>,
    answer: Option<String>,
}

impl KbaCreateCallback {
    pub(crate) fn from_json(json: &Value) -> Result<Self, AuthError> {
        let predefined_questions =
            strings(output(json, "predefinedQuestions")).ok_or_else(|| invalid(json))?;
        let names = input_names(json);
        let find = |part: &str| {
            names
                .iter()
                .find(|name| name.contains(part))
                .map(|name| (*name).to_owned())
                .ok_or_else(|| invalid(json))
        };
        Ok(Self {
            raw: json.clone(),
            prompt: output_str(json, "prompt").map(str::to_owned),
            predefined_questions,
            question_input: find("question")?,
            answer_input: find("answer")?,
            question: None,
            answer: None,
        })
    }

    #[allow(missing_docs)]
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    #[allow(missing_docs)]
    pub fn predefined_questions(&self) -> &[String] {
        &self.predefined_questions
    }

    /// Set the question, either one of the predefined ones or a custom one.
    pub fn set_question(&mut self, question: impl Into<String>) {
        self.question = Some(question.into());
    }

    #[allow(missing_docs)]
    pub fn set_answer(&mut self, answer: impl Into<String>) {
        self.answer = Some(answer.into());
    }

    pub(crate) fn build_response(&self) -> Value {
        let mut json = self.raw.clone();
        if let Some(question) = &self.question {
            set_input(&mut json, &self.question_input, json!(question));
        }
        if let Some(answer) = &self.answer {
            set_input(&mut json, &self.answer_input, json!(answer));
        }
        json
    }
}

/// A non-empty array of strings.
fn strings(value: Option<&Value>) -> Option<Vec<String>> {
    let list = value?
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_owned))
        .collect::<Option<Vec<_>>>()?;
    (!list.is_empty()).then_some(list)
}
