/// Errors produced by WebAuthn ceremonies.
///
/// The variants mirror the DOMException names WebAuthn uses, each with the numeric code the SDK
/// reports and the error type AM expects in a failed outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum WebAuthnError {
    /// Provided data is inadequate.
    #[error("Provided data is inadequate")]
    BadData,
    /// The operation was started twice or after it stopped.
    #[error("The operation failed for operation-specific reason")]
    BadOperation,
    /// The object is in an invalid state.
    #[error("The object is in an invalid state")]
    InvalidState,
    /// A constraint was not satisfied, e.g. an excluded credential exists.
    #[error("A mutation operation in a transaction failed because a constraint was not satisfied")]
    Constraint,
    /// The operation was cancelled by the caller or the user.
    #[error("The operation is cancelled")]
    Cancelled,
    /// The lifetime timer expired.
    #[error("The operation timed out")]
    Timeout,
    /// The authenticator is unavailable or holds no matching credential.
    #[error("The request is not allowed by the user agent or the platform in the current context")]
    NotAllowed,
    /// The authenticator cannot satisfy the Relying Party's requirements.
    #[error("The operation is not supported")]
    Unsupported,
    /// The authenticator output was malformed.
    #[error("The operation failed for an unknown reason")]
    Unknown,
}

impl WebAuthnError {
    /// The SDK error code.
    pub fn code(&self) -> u32 {
        match self {
            WebAuthnError::BadData => 1600001,
            WebAuthnError::BadOperation => 1600002,
            WebAuthnError::InvalidState => 1600003,
            WebAuthnError::Constraint => 1600004,
            WebAuthnError::Cancelled => 1600005,
            WebAuthnError::Timeout => 1600006,
            WebAuthnError::NotAllowed => 1600007,
            WebAuthnError::Unsupported => 1600008,
            WebAuthnError::Unknown => 1600099,
        }
    }

    /// The error name AM understands.
    pub fn am_error_type(&self) -> &'static str {
        match self {
            WebAuthnError::BadData => "DataError",
            WebAuthnError::InvalidState => "InvalidStateError",
            WebAuthnError::Constraint => "ConstraintError",
            WebAuthnError::Timeout => "TimeoutError",
            WebAuthnError::NotAllowed => "NotAllowedError",
            WebAuthnError::Unsupported => "NotSupportedError",
            WebAuthnError::BadOperation | WebAuthnError::Cancelled | WebAuthnError::Unknown => {
                "UnknownError"
            }
        }
    }

    /// The value written into the `webAuthnOutcome` hidden value when the ceremony fails.
    pub fn outcome(&self) -> String {
        match self {
            WebAuthnError::Unsupported => "unsupported".to_owned(),
            other => format!("ERROR::{}:", other.am_error_type()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::WebAuthnError;

    #[test]
    fn outcome_strings() {
        assert_eq!(WebAuthnError::Unsupported.outcome(), "unsupported");
        assert_eq!(WebAuthnError::NotAllowed.outcome(), "ERROR::NotAllowedError:");
        assert_eq!(WebAuthnError::Cancelled.outcome(), "ERROR::UnknownError:");
        assert_eq!(WebAuthnError::Timeout.outcome(), "ERROR::TimeoutError:");
    }

    #[test]
    fn codes() {
        assert_eq!(WebAuthnError::BadData.code(), 1600001);
        assert_eq!(WebAuthnError::Unsupported.code(), 1600008);
        assert_eq!(WebAuthnError::Unknown.code(), 1600099);
    }
}
