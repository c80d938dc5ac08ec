//! SMS challenge management
//!
//! Short-lived numeric codes delivered out-of-band. Challenges live in
//! an ephemeral keyed store behind the `ChallengeStore` trait, one slot
//! per user, and expire five minutes after issuance by default.

pub mod challenge;
pub mod gateway;
pub mod types;

pub use challenge::{ChallengeStore, InMemoryChallengeStore, SmsChallengeManager};
pub use gateway::{NullGateway, SmsGateway, TwilioGateway};
pub use types::SmsChallenge;
