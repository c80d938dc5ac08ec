//! Credential store types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Active two-factor method for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TwoFactorMethod {
    None,
    Totp,
    Sms,
}

impl TwoFactorMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TwoFactorMethod::None => "none",
            TwoFactorMethod::Totp => "totp",
            TwoFactorMethod::Sms => "sms",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(TwoFactorMethod::None),
            "totp" => Some(TwoFactorMethod::Totp),
            "sms" => Some(TwoFactorMethod::Sms),
            _ => None,
        }
    }
}

impl std::fmt::Display for TwoFactorMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable per-user two-factor configuration.
///
/// One row per user; owned exclusively by the credential store. The
/// state machine derives the user's 2FA state from this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSecurityRecord {
    /// Opaque user identifier (foreign relation to the user entity).
    pub user_id: String,
    /// True only after a successful verify-and-enable transition.
    pub two_factor_enabled: bool,
    /// Exactly one active method at a time; `None` when disabled.
    pub method: TwoFactorMethod,
    /// Shared TOTP secret, base32 at rest. Present only while the method
    /// is TOTP (enabled or setup-pending).
    pub totp_secret: Option<String>,
    /// Single-use recovery codes; empty when never issued or all consumed.
    pub backup_codes: Vec<String>,
    /// Dial target for the SMS method.
    pub phone_number: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl UserSecurityRecord {
    /// Fresh record for a user with no 2FA history.
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            two_factor_enabled: false,
            method: TwoFactorMethod::None,
            totp_secret: None,
            backup_codes: Vec::new(),
            phone_number: None,
            updated_at: Utc::now(),
        }
    }

    /// Merge a partial update into this record (unspecified fields keep
    /// their current value).
    pub fn apply(mut self, update: SecurityRecordUpdate) -> Self {
        if let Some(enabled) = update.two_factor_enabled {
            self.two_factor_enabled = enabled;
        }
        if let Some(method) = update.method {
            self.method = method;
        }
        if let Some(secret) = update.totp_secret {
            self.totp_secret = secret;
        }
        if let Some(codes) = update.backup_codes {
            self.backup_codes = codes.unwrap_or_default();
        }
        if let Some(phone) = update.phone_number {
            self.phone_number = phone;
        }
        self.updated_at = Utc::now();
        self
    }
}

/// Partial update for a [`UserSecurityRecord`].
///
/// Outer `None` leaves the field unchanged; for nullable columns the inner
/// `Option` distinguishes "set" from "clear", so `Some(None)` writes NULL.
#[derive(Debug, Clone, Default)]
pub struct SecurityRecordUpdate {
    pub two_factor_enabled: Option<bool>,
    pub method: Option<TwoFactorMethod>,
    pub totp_secret: Option<Option<String>>,
    pub backup_codes: Option<Option<Vec<String>>>,
    pub phone_number: Option<Option<String>>,
}
