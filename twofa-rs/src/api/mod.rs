//! REST API module for twofa-rs
//!
//! HTTP surface over the 2FA state machine: JWT-authenticated 2FA
//! management routes plus a public health endpoint.

pub mod auth;
pub mod mfa;
pub mod server;

pub use server::ApiServer;
