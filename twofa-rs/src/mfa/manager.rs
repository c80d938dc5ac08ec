//! 2FA orchestration
//!
//! `TwoFactorManager` drives the enrollment state machine: it owns the
//! credential store and delegates code checks to the TOTP engine and the
//! SMS challenge manager. Every operation loads the user's record, applies
//! the transition guards, and persists the result.

use tracing::{info, warn};

use crate::backup::{self, BACKUP_CODE_COUNT};
use crate::error::{Result, TwoFactorError};
use crate::sms::SmsChallengeManager;
use crate::store::{SecurityRecordUpdate, SqliteCredentialStore, TwoFactorMethod};
use crate::totp::TotpEngine;

use super::types::{TotpEnrollment, TwoFactorStatus, VerifyOutcome};

/// Orchestrator for per-user two-factor state.
pub struct TwoFactorManager {
    store: SqliteCredentialStore,
    totp: TotpEngine,
    sms: SmsChallengeManager,
}

impl TwoFactorManager {
    pub fn new(store: SqliteCredentialStore, totp: TotpEngine, sms: SmsChallengeManager) -> Self {
        TwoFactorManager { store, totp, sms }
    }

    /// Begin TOTP enrollment: generate a secret plus a fresh set of backup
    /// codes and persist them unconfirmed. Re-running setup while still
    /// pending replaces both.
    pub async fn setup_totp(&self, user_id: &str, account_label: &str) -> Result<TotpEnrollment> {
        if let Some(record) = self.store.load(user_id).await? {
            if record.two_factor_enabled {
                return Err(TwoFactorError::AlreadyEnabled);
            }
        }

        let setup = self.totp.setup(account_label)?;
        let backup_codes = backup::generate(BACKUP_CODE_COUNT);

        self.store
            .save(
                user_id,
                SecurityRecordUpdate {
                    two_factor_enabled: Some(false),
                    method: Some(TwoFactorMethod::Totp),
                    totp_secret: Some(Some(setup.secret.clone())),
                    backup_codes: Some(Some(backup_codes.clone())),
                    ..Default::default()
                },
            )
            .await?;

        info!(user_id = %user_id, "totp enrollment started");

        Ok(TotpEnrollment {
            secret: setup.secret,
            provisioning_uri: setup.provisioning_uri,
            qr_code: setup.qr_code,
            backup_codes,
        })
    }

    /// Confirm TOTP enrollment with a code from the authenticator app.
    pub async fn enable_totp(&self, user_id: &str, code: &str) -> Result<()> {
        let record = match self.store.load(user_id).await? {
            Some(r) => r,
            None => return Err(TwoFactorError::NotSetUp),
        };

        if record.two_factor_enabled {
            return Err(TwoFactorError::AlreadyEnabled);
        }

        let secret = record
            .totp_secret
            .as_deref()
            .ok_or(TwoFactorError::NotSetUp)?;

        if !self.totp.verify(secret, code) {
            warn!(user_id = %user_id, "totp enable rejected: invalid code");
            return Err(TwoFactorError::InvalidCode);
        }

        self.store
            .save(
                user_id,
                SecurityRecordUpdate {
                    two_factor_enabled: Some(true),
                    method: Some(TwoFactorMethod::Totp),
                    ..Default::default()
                },
            )
            .await?;

        info!(user_id = %user_id, "totp enabled");
        Ok(())
    }

    /// Begin SMS enrollment: persist the phone number, then text it a
    /// code. The phone and challenge are recorded before the send, so a
    /// gateway failure leaves a verifiable challenge behind.
    pub async fn setup_sms(&self, user_id: &str, phone_number: &str) -> Result<()> {
        if let Some(record) = self.store.load(user_id).await? {
            if record.two_factor_enabled {
                return Err(TwoFactorError::AlreadyEnabled);
            }
        }

        self.store
            .save(
                user_id,
                SecurityRecordUpdate {
                    two_factor_enabled: Some(false),
                    method: Some(TwoFactorMethod::Sms),
                    phone_number: Some(Some(phone_number.to_string())),
                    ..Default::default()
                },
            )
            .await?;

        self.sms.issue(user_id, phone_number).await?;

        info!(user_id = %user_id, "sms enrollment started");
        Ok(())
    }

    /// Confirm SMS enrollment with the code that was texted.
    pub async fn verify_sms(&self, user_id: &str, otp: &str) -> Result<()> {
        let record = match self.store.load(user_id).await? {
            Some(r) => r,
            None => return Err(TwoFactorError::NotSetUp),
        };

        if record.two_factor_enabled {
            return Err(TwoFactorError::AlreadyEnabled);
        }

        if record.phone_number.is_none() {
            return Err(TwoFactorError::NotSetUp);
        }

        self.sms.verify(user_id, otp).await?;

        // SMS becomes the active method: the TOTP secret goes, backup
        // codes stay usable.
        self.store
            .save(
                user_id,
                SecurityRecordUpdate {
                    two_factor_enabled: Some(true),
                    method: Some(TwoFactorMethod::Sms),
                    totp_secret: Some(None),
                    ..Default::default()
                },
            )
            .await?;

        info!(user_id = %user_id, "sms 2fa enabled");
        Ok(())
    }

    /// Second-factor check at login.
    ///
    /// TOTP is tried first so a valid authenticator code can never burn a
    /// coincidentally-matching backup code; backup codes are the fallback.
    /// The state is unchanged except for the consumed code.
    pub async fn verify_login(&self, user_id: &str, code: &str) -> Result<VerifyOutcome> {
        let record = match self.store.load(user_id).await? {
            Some(r) => r,
            None => return Err(TwoFactorError::NotSetUp),
        };

        if !record.two_factor_enabled {
            return Err(TwoFactorError::NotSetUp);
        }

        if let Some(secret) = record.totp_secret.as_deref() {
            if self.totp.verify(secret, code) {
                info!(user_id = %user_id, method = "totp", "second factor accepted");
                return Ok(VerifyOutcome::Totp);
            }
        }

        if let Some(remaining) = self.store.consume_backup_code(user_id, code).await? {
            info!(user_id = %user_id, method = "backup", remaining, "second factor accepted");
            return Ok(VerifyOutcome::BackupCode { remaining });
        }

        warn!(user_id = %user_id, "second factor rejected");
        Err(TwoFactorError::InvalidCode)
    }

    /// Turn 2FA off for a TOTP user. Requires a valid current code and
    /// wipes the secret along with every backup code.
    pub async fn disable_totp(&self, user_id: &str, code: &str) -> Result<()> {
        let record = match self.store.load(user_id).await? {
            Some(r) => r,
            None => return Err(TwoFactorError::AlreadyDisabled),
        };

        if !record.two_factor_enabled {
            return Err(TwoFactorError::AlreadyDisabled);
        }

        if record.method != TwoFactorMethod::Totp {
            return Err(TwoFactorError::NotSetUp);
        }

        let secret = record
            .totp_secret
            .as_deref()
            .ok_or(TwoFactorError::NotSetUp)?;

        if !self.totp.verify(secret, code) {
            warn!(user_id = %user_id, "totp disable rejected: invalid code");
            return Err(TwoFactorError::InvalidCode);
        }

        self.store
            .save(
                user_id,
                SecurityRecordUpdate {
                    two_factor_enabled: Some(false),
                    method: Some(TwoFactorMethod::None),
                    totp_secret: Some(None),
                    backup_codes: Some(None),
                    ..Default::default()
                },
            )
            .await?;

        info!(user_id = %user_id, "totp disabled");
        Ok(())
    }

    /// Turn 2FA off for an SMS user. This path never re-checks a code,
    /// an asymmetry with the TOTP path that is kept on purpose.
    pub async fn disable_sms(&self, user_id: &str) -> Result<()> {
        let record = match self.store.load(user_id).await? {
            Some(r) => r,
            None => return Err(TwoFactorError::AlreadyDisabled),
        };

        if !record.two_factor_enabled {
            return Err(TwoFactorError::AlreadyDisabled);
        }

        if record.method != TwoFactorMethod::Sms {
            return Err(TwoFactorError::NotSetUp);
        }

        self.store
            .save(
                user_id,
                SecurityRecordUpdate {
                    two_factor_enabled: Some(false),
                    method: Some(TwoFactorMethod::None),
                    phone_number: Some(None),
                    ..Default::default()
                },
            )
            .await?;

        info!(user_id = %user_id, "sms 2fa disabled");
        Ok(())
    }

    /// Replace the backup code set wholesale; old codes stop verifying
    /// immediately.
    pub async fn regenerate_backup_codes(&self, user_id: &str) -> Result<Vec<String>> {
        if self.store.load(user_id).await?.is_none() {
            return Err(TwoFactorError::NotSetUp);
        }

        let codes = backup::generate(BACKUP_CODE_COUNT);

        self.store
            .save(
                user_id,
                SecurityRecordUpdate {
                    backup_codes: Some(Some(codes.clone())),
                    ..Default::default()
                },
            )
            .await?;

        info!(user_id = %user_id, "backup codes regenerated");
        Ok(codes)
    }

    /// Current unconsumed backup codes, for the download artifact.
    pub async fn backup_codes(&self, user_id: &str) -> Result<Vec<String>> {
        let record = self
            .store
            .load(user_id)
            .await?
            .ok_or(TwoFactorError::NotSetUp)?;

        if record.backup_codes.is_empty() {
            return Err(TwoFactorError::NotFound("no backup codes issued".to_string()));
        }

        Ok(record.backup_codes)
    }

    /// Snapshot of the user's 2FA configuration.
    pub async fn status(&self, user_id: &str) -> Result<TwoFactorStatus> {
        Ok(match self.store.load(user_id).await? {
            Some(record) => TwoFactorStatus::from_record(&record),
            None => TwoFactorStatus::disabled(),
        })
    }

    /// Whether the user has a confirmed second factor.
    pub async fn is_enabled(&self, user_id: &str) -> Result<bool> {
        Ok(self
            .store
            .load(user_id)
            .await?
            .map(|r| r.two_factor_enabled)
            .unwrap_or(false))
    }
}
