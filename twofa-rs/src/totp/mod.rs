//! TOTP engine (RFC 6238)

pub mod engine;

pub use engine::{TotpEngine, TotpEngineConfig, TotpSetup};
