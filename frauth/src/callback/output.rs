use std::time::Duration;

use serde_json::Value;

use super::{invalid, output, output_str};
use crate::AuthError;

/// Severity of a message shown by a [`TextOutputCallback`] or a confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum MessageType {
    Information,
    Warning,
    Error,
    /// The message is a script for a browser to run.
    Script,
}

impl TryFrom<i64> for MessageType {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, i64> {
        match value {
            0 => Ok(MessageType::Information),
            1 => Ok(MessageType::Warning),
            2 => Ok(MessageType::Error),
            4 => Ok(MessageType::Script),
            other => Err(other),
        }
    }
}

/// A message to display. Nothing is sent back besides the callback itself.
#[derive(Debug, Clone, PartialEq)]
pub struct TextOutputCallback {
    raw: Value,
    message: String,
    message_type: MessageType,
}

impl TextOutputCallback {
    pub(crate) fn from_json(json: &Value) -> Result<Self, AuthError> {
        let message = output_str(json, "message").ok_or_else(|| invalid(json))?;
        let message_type = output(json, "messageType")
            .and_then(|v| v.as_i64().or_else(|| v.as_str()?.parse().ok()))
            .and_then(|v| MessageType::try_from(v).ok())
            .ok_or_else(|| invalid(json))?;
        Ok(Self {
            raw: json.clone(),
            message: message.to_owned(),
            message_type,
        })
    }

    #[allow(missing_docs)]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[allow(missing_docs)]
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub(crate) fn build_response(&self) -> Value {
        self.raw.clone()
    }
}

/// Asks the client to wait before submitting the step again.
#[derive(Debug, Clone, PartialEq)]
pub struct PollingWaitCallback {
    raw: Value,
    wait_time: Duration,
    message: String,
}

impl PollingWaitCallback {
    pub(crate) fn from_json(json: &Value) -> Result<Self, AuthError> {
        let wait_time = output_str(json, "waitTime")
            .and_then(|ms| ms.parse::<u64>().ok())
            .ok_or_else(|| invalid(json))?;
        let message = output_str(json, "message").ok_or_else(|| invalid(json))?;
        Ok(Self {
            raw: json.clone(),
            wait_time: Duration::from_millis(wait_time),
            message: message.to_owned(),
        })
    }

    #[allow(missing_docs)]
    pub fn wait_time(&self) -> Duration {
        self.wait_time
    }

    #[allow(missing_docs)]
    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn build_response(&self) -> Value {
        self.raw.clone()
    }
}

/// Arbitrary data from a node, sent back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataCallback {
    raw: Value,
    data: Value,
}

impl MetadataCallback {
    pub(crate) fn from_json(json: &Value) -> Result<Self, AuthError> {
        let data = output(json, "data").ok_or_else(|| invalid(json))?;
        Ok(Self {
            raw: json.clone(),
            data: data.clone(),
        })
    }

    #[allow(missing_docs)]
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// The stage name a page node publishes through its metadata.
    pub fn stage(&self) -> Option<&str> {
        self.data.get("stage").and_then(Value::as_str)
    }

    pub(crate) fn build_response(&self) -> Value {
        self.raw.clone()
    }
}
