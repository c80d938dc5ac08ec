//! Credential store
//!
//! Durable per-user 2FA configuration. The state machine is the only
//! writer; everything here is keyed by the caller-supplied user id.

pub mod sqlite;
pub mod types;

pub use sqlite::SqliteCredentialStore;
pub use types::*;
