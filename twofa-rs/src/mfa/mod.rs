//! Two-factor authentication state machine
//!
//! States per user, derived from the security record:
//! `Disabled`, `PendingTotp`, `PendingSms`, `EnabledTotp`, `EnabledSms`.
//! The manager enforces the legal transitions between them; exactly one
//! method is active at a time.

pub mod manager;
pub mod types;

pub use manager::TwoFactorManager;
pub use types::{TotpEnrollment, TwoFactorState, TwoFactorStatus, VerifyOutcome};
