use serde_json::{Map, Value};

use super::{input_names, invalid, output, output_str, set_input, SingleValueCallback};
use crate::AuthError;

/// A single-value callback validated against IDM policies, e.g.
/// `ValidatedCreateUsernameCallback`.
///
/// With [`validate_only`](Self::set_validate_only) set, AM checks the value against the policies
/// and returns the same step with any [`FailedPolicy`] instead of moving on.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCallback {
    inner: SingleValueCallback,
    policies: Option<Map<String, Value>>,
    failed_policies: Vec<FailedPolicy>,
    validate_only: bool,
    validate_only_input: Option<String>,
}

impl ValidatedCallback {
    pub(crate) fn from_json(json: &Value) -> Result<Self, AuthError> {
        let mut inner = SingleValueCallback::from_json(json)?;
        if let Some(value) = output(json, "value") {
            inner.set_value(value.clone());
        }

        let failed_policies = match output(json, "failedPolicies").and_then(Value::as_array) {
            Some(failed) if !failed.is_empty() => {
                let property = inner.prompt().ok_or_else(|| invalid(json))?;
                let failed = failed
                    .iter()
                    .map(|policy| FailedPolicy::from_json_string(property, policy))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| {
                        AuthError::InvalidCallbackResponse(format!(
                            "Failed to parse FailedPolicies from callback response: {json}"
                        ))
                    })?;
                log::warn!(
                    "{} is returned with {} failed policies",
                    json.get("type").and_then(Value::as_str).unwrap_or_default(),
                    failed.len()
                );
                failed
            }
            _ => Vec::new(),
        };

        let validate_only_input = input_names(json)
            .into_iter()
            .find(|name| is_validate_only_input(name))
            .map(str::to_owned);

        Ok(Self {
            inner,
            policies: output(json, "policies").and_then(Value::as_object).cloned(),
            failed_policies,
            validate_only: output(json, "validateOnly")
                .and_then(Value::as_bool)
                .unwrap_or_default(),
            validate_only_input,
        })
    }

    #[allow(missing_docs)]
    pub fn prompt(&self) -> Option<&str> {
        self.inner.prompt()
    }

    #[allow(missing_docs)]
    pub fn value(&self) -> &Value {
        self.inner.value()
    }

    #[allow(missing_docs)]
    pub fn set_value(&mut self, value: impl Into<Value>) {
        self.inner.set_value(value);
    }

    /// The policies the value is checked against.
    pub fn policies(&self) -> Option<&Map<String, Value>> {
        self.policies.as_ref()
    }

    /// The policies the previously submitted value failed.
    pub fn failed_policies(&self) -> &[FailedPolicy] {
        &self.failed_policies
    }

    #[allow(missing_docs)]
    pub fn validate_only(&self) -> bool {
        self.validate_only
    }

    #[allow(missing_docs)]
    pub fn set_validate_only(&mut self, validate_only: bool) {
        self.validate_only = validate_only;
    }

    pub(crate) fn build_response(&self) -> Value {
        let mut json = self.inner.build_response();
        if let Some(name) = &self.validate_only_input {
            set_input(&mut json, name, Value::Bool(self.validate_only));
        }
        json
    }
}

/// `IDToken<n>validateOnly` with a one or two digit `n`.
fn is_validate_only_input(name: &str) -> bool {
    name.strip_prefix("IDToken")
        .and_then(|rest| rest.strip_suffix("validateOnly"))
        .is_some_and(|digits| {
            (1..=2).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
        })
}

/// An IDM attribute collected through a validated input, e.g. `givenName`.
#[derive(Debug, Clone, PartialEq)]
pub struct StringAttributeInputCallback {
    validated: ValidatedCallback,
    name: String,
    required: bool,
}

impl StringAttributeInputCallback {
    pub(crate) fn from_json(json: &Value) -> Result<Self, AuthError> {
        let name = output_str(json, "name").ok_or_else(|| invalid(json))?.to_owned();
        let required = output(json, "required")
            .and_then(Value::as_bool)
            .ok_or_else(|| invalid(json))?;
        Ok(Self {
            validated: ValidatedCallback::from_json(json)?,
            name,
            required,
        })
    }

    /// The attribute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    #[allow(missing_docs)]
    pub fn required(&self) -> bool {
        self.required
    }

    #[allow(missing_docs)]
    pub fn validated(&self) -> &ValidatedCallback {
        &self.validated
    }

    #[allow(missing_docs)]
    pub fn validated_mut(&mut self) -> &mut ValidatedCallback {
        &mut self.validated
    }

    pub(crate) fn build_response(&self) -> Value {
        self.validated.build_response()
    }
}

/// One policy a submitted value failed.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedPolicy {
    /// The prompt of the callback the policy belongs to.
    pub property_name: String,
    /// The policy id, e.g. `MIN_LENGTH`.
    pub policy_requirement: String,
    /// Parameters of the policy, e.g. `{"minLength": 8}`.
    pub params: Option<Map<String, Value>>,
}

impl FailedPolicy {
    /// AM sends each failed policy as a JSON document inside a string.
    fn from_json_string(property_name: &str, policy: &Value) -> Option<Self> {
        let policy: Value = serde_json::from_str(policy.as_str()?).ok()?;
        Some(Self {
            property_name: property_name.to_owned(),
            policy_requirement: policy.get("policyRequirement")?.as_str()?.to_owned(),
            params: policy.get("params").and_then(Value::as_object).cloned(),
        })
    }

    /// A readable explanation of the failure in English.
    pub fn failed_description(&self) -> String {
        let Some(template) = description_template(&self.policy_requirement) else {
            return format!(
                "{}: Unknown policy requirement - {}",
                self.property_name, self.policy_requirement
            );
        };
        let mut description = template.replace("%{propertyName}", &self.property_name);
        for (key, value) in self.params.iter().flatten() {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            description = description.replace(&format!("%{{{key}}}"), &value);
        }
        description
    }
}

fn description_template(requirement: &str) -> Option<&'static str> {
    Some(match requirement {
        "REQUIRED" => "%{propertyName} is required",
        "UNIQUE" => "%{propertyName} must be unique",
        "MATCH_REGEXP" | "VALID_TYPE" | "VALID_QUERY_FILTER" | "VALID_ARRAY_ITEMS"
        | "MINIMUM_NUMBER_VALUE" | "MAXIMUM_NUMBER_VALUE" => "",
        "VALID_DATE" => "Invalid date",
        "VALID_EMAIL_ADDRESS_FORMAT" => "Invalid Email format",
        "VALID_NAME_FORMAT" => "Invalid name format",
        "VALID_PHONE_FORMAT" => "Invalid phone number",
        "AT_LEAST_X_CAPITAL_LETTERS" => {
            "%{propertyName} must contain at least %{numCaps} capital letter(s)"
        }
        "AT_LEAST_X_NUMBERS" => "%{propertyName} must contain at least %{numNums} numeric value(s)",
        "VALID_NUMBER" => "Invalid number",
        "MIN_LENGTH" => "%{propertyName} must be at least %{minLength} character(s)",
        "MAX_LENGTH" => "%{propertyName} must be at most %{maxLength} character(s)",
        "CANNOT_CONTAIN_OTHERS" => "%{propertyName} must not contain: %{disallowedFields}",
        "CANNOT_CONTAIN_CHARACTERS" => {
            "%{propertyName} must not contain following characters: %{forbiddenChars}"
        }
        "CANNOT_CONTAIN_DUPLICATES" => {
            "%{propertyName} must not contain duplicates: %{duplicateValue}"
        }
        _ => return None,
    })
}
