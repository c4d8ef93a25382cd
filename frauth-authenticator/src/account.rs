use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::{oath::OathMechanism, push::PushMechanism, AccountError};

/// A user's account at one issuer, holding its registered mechanisms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Issuer as given by the registration URI.
    pub issuer: String,
    /// Username at the issuer.
    pub account_name: String,
    /// Issuer name chosen by the user, shown instead of `issuer`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_issuer: Option<String>,
    /// Account name chosen by the user, shown instead of `account_name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_account_name: Option<String>,
    /// Logo of the issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Hex colour code for the account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[allow(missing_docs)]
    pub time_added: DateTime<Utc>,
    /// JSON object of the policies the issuer attached at registration, keyed by policy name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policies: Option<String>,
    /// Name of the policy that locked this account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_policy: Option<String>,
    #[serde(default)]
    lock: bool,
    /// Push mechanisms attached when the account is read through the manager. Never persisted.
    #[serde(skip)]
    pub mechanisms: Vec<PushMechanism>,
    /// HOTP and TOTP mechanisms, attached the same way.
    #[serde(skip)]
    pub oath_mechanisms: Vec<OathMechanism>,
}

impl Account {
    /// A new, unlocked account added now.
    pub fn new(issuer: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            account_name: account_name.into(),
            display_issuer: None,
            display_account_name: None,
            image_url: None,
            background_color: None,
            time_added: Utc::now().trunc_subsecs(3),
            policies: None,
            lock_policy: None,
            lock: false,
            mechanisms: Vec::new(),
            oath_mechanisms: Vec::new(),
        }
    }

    /// `<issuer>-<accountName>`
    pub fn identifier(&self) -> String {
        format!("{}-{}", self.issuer, self.account_name)
    }

    /// Whether a policy currently locks the account.
    pub fn is_locked(&self) -> bool {
        self.lock
    }

    /// Fail with [`AccountError::AccountLocked`] if the account is locked.
    pub fn ensure_unlocked(&self) -> Result<(), AccountError> {
        if self.lock {
            let policy = self.lock_policy.clone().unwrap_or_default();
            return Err(AccountError::AccountLocked(policy));
        }
        Ok(())
    }

    /// Lock the account under `policy`, which must be one of the policies attached at
    /// registration.
    pub fn lock(&mut self, policy: &str) -> Result<(), AccountError> {
        if policy.is_empty() {
            return Err(AccountError::FailToLockMissingPolicyName);
        }
        if self.lock {
            return Err(AccountError::FailToLockAccountAlreadyLocked);
        }
        if !self.has_policy(policy) {
            return Err(AccountError::FailToLockInvalidPolicy);
        }
        log::debug!("Locking account {} by {policy}", self.identifier());
        self.lock = true;
        self.lock_policy = Some(policy.to_owned());
        Ok(())
    }

    /// Lift a lock.
    pub fn unlock(&mut self) -> Result<(), AccountError> {
        if !self.lock {
            return Err(AccountError::FailToUnlockAccountNotLocked);
        }
        self.lock = false;
        self.lock_policy = None;
        Ok(())
    }

    fn has_policy(&self, policy: &str) -> bool {
        self.policies
            .as_deref()
            .and_then(|policies| serde_json::from_str::<serde_json::Value>(policies).ok())
            .and_then(|policies| policies.as_object().map(|p| p.contains_key(policy)))
            .unwrap_or(false)
    }
}
