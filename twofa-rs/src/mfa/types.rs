//! 2FA domain types

use serde::{Deserialize, Serialize};

use crate::store::{TwoFactorMethod, UserSecurityRecord};

/// Where a user sits in the enrollment lifecycle.
///
/// Never stored: always derived from the security record, so the record
/// stays the single source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TwoFactorState {
    Disabled,
    PendingTotp,
    PendingSms,
    EnabledTotp,
    EnabledSms,
}

impl TwoFactorState {
    pub fn derive(record: &UserSecurityRecord) -> Self {
        if record.two_factor_enabled {
            match record.method {
                TwoFactorMethod::Totp => TwoFactorState::EnabledTotp,
                TwoFactorMethod::Sms => TwoFactorState::EnabledSms,
                // Unreachable through the manager; read as disabled
                // rather than invent a sixth state.
                TwoFactorMethod::None => TwoFactorState::Disabled,
            }
        } else {
            match record.method {
                TwoFactorMethod::Totp if record.totp_secret.is_some() => {
                    TwoFactorState::PendingTotp
                }
                TwoFactorMethod::Sms if record.phone_number.is_some() => {
                    TwoFactorState::PendingSms
                }
                _ => TwoFactorState::Disabled,
            }
        }
    }
}

/// Everything a caller needs to finish TOTP enrollment.
#[derive(Debug, Clone, Serialize)]
pub struct TotpEnrollment {
    /// Base32 shared secret, for manual authenticator entry.
    pub secret: String,
    /// otpauth:// URI that authenticator apps import.
    pub provisioning_uri: String,
    /// PNG data URI rendering of the provisioning URI.
    pub qr_code: String,
    /// Fresh single-use recovery codes.
    pub backup_codes: Vec<String>,
}

/// How a login verification succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Matched the current TOTP window.
    Totp,
    /// Consumed a backup code; `remaining` are left.
    BackupCode { remaining: usize },
}

impl VerifyOutcome {
    pub fn method(&self) -> &'static str {
        match self {
            VerifyOutcome::Totp => "totp",
            VerifyOutcome::BackupCode { .. } => "backup",
        }
    }
}

/// Snapshot of a user's 2FA configuration.
#[derive(Debug, Clone, Serialize)]
pub struct TwoFactorStatus {
    pub state: TwoFactorState,
    pub enabled: bool,
    pub method: TwoFactorMethod,
    pub backup_codes_remaining: usize,
    pub phone_number: Option<String>,
}

impl TwoFactorStatus {
    pub fn from_record(record: &UserSecurityRecord) -> Self {
        TwoFactorStatus {
            state: TwoFactorState::derive(record),
            enabled: record.two_factor_enabled,
            method: record.method,
            backup_codes_remaining: record.backup_codes.len(),
            phone_number: record.phone_number.clone(),
        }
    }

    /// Status for a user with no security record.
    pub fn disabled() -> Self {
        TwoFactorStatus {
            state: TwoFactorState::Disabled,
            enabled: false,
            method: TwoFactorMethod::None,
            backup_codes_remaining: 0,
            phone_number: None,
        }
    }
}
