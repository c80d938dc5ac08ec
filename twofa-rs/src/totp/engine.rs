//! TOTP engine (RFC 6238)
//!
//! Generates shared secrets and verifies time-based codes within a
//! configurable skew window.

use totp_rs::{Algorithm, Secret, TOTP};
use tracing::warn;

use crate::error::{Result, TwoFactorError};

/// TOTP engine configuration.
#[derive(Debug, Clone)]
pub struct TotpEngineConfig {
    /// Issuer name (shown in authenticator apps).
    pub issuer: String,
    /// Number of digits in the code.
    pub digits: usize,
    /// Time step in seconds.
    pub step: u64,
    /// Accepted clock drift, in steps before/after the current one.
    pub skew: u8,
    pub algorithm: Algorithm,
}

impl Default for TotpEngineConfig {
    fn default() -> Self {
        Self {
            issuer: "AZsubay.dev".to_string(),
            digits: 6,
            step: 30,
            skew: 1,
            algorithm: Algorithm::SHA1,
        }
    }
}

impl From<&crate::config::TotpConfig> for TotpEngineConfig {
    fn from(cfg: &crate::config::TotpConfig) -> Self {
        Self {
            issuer: cfg.issuer.clone(),
            digits: cfg.digits,
            step: cfg.step,
            skew: cfg.skew,
            algorithm: Algorithm::SHA1,
        }
    }
}

/// Data returned when provisioning a new TOTP secret.
#[derive(Debug, Clone)]
pub struct TotpSetup {
    /// Base32-encoded secret (what the credential store persists).
    pub secret: String,
    /// otpauth:// URI that authenticator apps import.
    pub provisioning_uri: String,
    /// QR rendering of the URI as a data URI (base64 PNG).
    pub qr_code: String,
}

/// TOTP engine for generating secrets and validating codes.
pub struct TotpEngine {
    config: TotpEngineConfig,
}

impl TotpEngine {
    pub fn new(config: TotpEngineConfig) -> Self {
        Self { config }
    }

    /// Generate a new random shared secret (160 bits, base32-encoded).
    pub fn generate_secret(&self) -> String {
        Secret::generate_secret().to_encoded().to_string()
    }

    /// Provision a fresh secret for an account: secret, otpauth URI and a
    /// QR code ready for display during enrollment.
    pub fn setup(&self, account_label: &str) -> Result<TotpSetup> {
        let secret = self.generate_secret();
        let totp = self.build(&secret, account_label)?;

        let provisioning_uri = totp.get_url();
        let qr_code = totp
            .get_qr_base64()
            .map_err(|e| TwoFactorError::Totp(format!("failed to generate QR code: {}", e)))?;

        Ok(TotpSetup {
            secret,
            provisioning_uri,
            qr_code: format!("data:image/png;base64,{}", qr_code),
        })
    }

    /// Check a submitted code against a stored secret for the current
    /// time step ± the configured skew.
    ///
    /// Returns `false` for a mismatch, malformed or empty input, or an
    /// unusable secret — verification never leaks why it failed.
    pub fn verify(&self, secret_base32: &str, code: &str) -> bool {
        let code = clean_code(code);
        if code.is_empty() {
            return false;
        }

        match self.build(secret_base32, "") {
            Ok(totp) => totp.check_current(&code).unwrap_or(false),
            Err(e) => {
                warn!("TOTP verification with unusable secret: {}", e);
                false
            }
        }
    }

    /// Like [`verify`](Self::verify) but against an explicit Unix
    /// timestamp. Deterministic; what the tests drive.
    pub fn verify_at(&self, secret_base32: &str, code: &str, time: u64) -> bool {
        let code = clean_code(code);
        if code.is_empty() {
            return false;
        }

        match self.build(secret_base32, "") {
            Ok(totp) => totp.check(&code, time),
            Err(_) => false,
        }
    }

    /// Compute the code valid at an explicit Unix timestamp.
    pub fn generate_at(&self, secret_base32: &str, time: u64) -> Result<String> {
        Ok(self.build(secret_base32, "")?.generate(time))
    }

    /// Compute the code valid right now.
    pub fn generate_current(&self, secret_base32: &str) -> Result<String> {
        self.build(secret_base32, "")?
            .generate_current()
            .map_err(|e| TwoFactorError::Totp(format!("failed to generate code: {}", e)))
    }

    fn build(&self, secret_base32: &str, account_label: &str) -> Result<TOTP> {
        let secret = Secret::Encoded(secret_base32.to_string())
            .to_bytes()
            .map_err(|e| TwoFactorError::Totp(format!("invalid secret: {}", e)))?;

        TOTP::new(
            self.config.algorithm,
            self.config.digits,
            self.config.skew,
            self.config.step,
            secret,
            Some(self.config.issuer.clone()),
            account_label.to_string(),
        )
        .map_err(|e| TwoFactorError::Totp(format!("failed to create TOTP: {}", e)))
    }
}

impl Default for TotpEngine {
    fn default() -> Self {
        Self::new(TotpEngineConfig::default())
    }
}

/// Strip the separators users paste along with their codes.
fn clean_code(code: &str) -> String {
    code.trim().replace([' ', '-'], "")
}
