//! twofa-rs: Two-factor authentication service
//!
//! A standalone 2FA service for the marketplace backend: TOTP enrollment
//! with QR provisioning, SMS challenges delivered through Twilio, and
//! single-use backup codes, fronted by a JWT-authenticated REST API.
//!
//! # Features
//!
//! - **TOTP**: RFC 6238 codes with a configurable skew window
//! - **SMS**: short-lived 6-digit challenges, one slot per user
//! - **Backup codes**: five single-use recovery codes per issue
//! - **Storage**: SQLite credential records with atomic code consumption
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use twofa_rs::mfa::TwoFactorManager;
//! use twofa_rs::sms::{InMemoryChallengeStore, NullGateway, SmsChallengeManager};
//! use twofa_rs::store::SqliteCredentialStore;
//! use twofa_rs::totp::TotpEngine;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = sqlx::SqlitePool::connect("sqlite::memory:").await?;
//!     let store = SqliteCredentialStore::new(pool);
//!     store.init_db().await?;
//!
//!     let sms = SmsChallengeManager::new(
//!         Arc::new(InMemoryChallengeStore::new()),
//!         Arc::new(NullGateway),
//!         "AZsubay.dev",
//!         5,
//!     );
//!
//!     let manager = TwoFactorManager::new(store, TotpEngine::default(), sms);
//!     let enrollment = manager.setup_totp("user-1", "user-1").await?;
//!     println!("scan this: {}", enrollment.provisioning_uri);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling
//! - [`store`]: Durable per-user credential records
//! - [`totp`]: TOTP secret generation and verification
//! - [`backup`]: Single-use recovery codes
//! - [`sms`]: SMS challenge issuance and verification
//! - [`mfa`]: The 2FA state machine tying it all together
//! - [`api`]: REST surface

pub mod api;
pub mod backup;
pub mod config;
pub mod error;
pub mod mfa;
pub mod sms;
pub mod store;
pub mod totp;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, TwoFactorError};
pub use mfa::TwoFactorManager;
