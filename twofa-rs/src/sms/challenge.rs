use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Result, TwoFactorError};

use super::gateway::SmsGateway;
use super::types::SmsChallenge;

/// Ephemeral keyed storage for pending challenges. One slot per user;
/// `put` for a user who already has a challenge replaces it.
#[async_trait::async_trait]
pub trait ChallengeStore: Send + Sync {
    async fn put(&self, user_id: &str, challenge: SmsChallenge);
    async fn get(&self, user_id: &str) -> Option<SmsChallenge>;
    async fn remove(&self, user_id: &str);
    /// Drop challenges past their window, returning how many were dropped.
    async fn purge_expired(&self, now: DateTime<Utc>) -> usize;
}

/// Process-local challenge store. Challenges are lost on restart, which
/// only costs the user a re-send.
#[derive(Clone)]
pub struct InMemoryChallengeStore {
    entries: Arc<RwLock<HashMap<String, SmsChallenge>>>,
}

impl InMemoryChallengeStore {
    pub fn new() -> Self {
        InMemoryChallengeStore {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryChallengeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ChallengeStore for InMemoryChallengeStore {
    async fn put(&self, user_id: &str, challenge: SmsChallenge) {
        let mut entries = self.entries.write().await;
        entries.insert(user_id.to_string(), challenge);
    }

    async fn get(&self, user_id: &str) -> Option<SmsChallenge> {
        let entries = self.entries.read().await;
        entries.get(user_id).cloned()
    }

    async fn remove(&self, user_id: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(user_id);
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, challenge| !challenge.is_expired(now));
        before - entries.len()
    }
}

/// Issues and verifies short-lived SMS codes.
pub struct SmsChallengeManager {
    store: Arc<dyn ChallengeStore>,
    gateway: Arc<dyn SmsGateway>,
    issuer: String,
    otp_ttl_minutes: i64,
}

impl SmsChallengeManager {
    pub fn new(
        store: Arc<dyn ChallengeStore>,
        gateway: Arc<dyn SmsGateway>,
        issuer: impl Into<String>,
        otp_ttl_minutes: i64,
    ) -> Self {
        SmsChallengeManager {
            store,
            gateway,
            issuer: issuer.into(),
            otp_ttl_minutes,
        }
    }

    /// Generate a fresh 6-digit code for `user_id`, replacing any pending
    /// challenge, and dispatch it to `phone_number`.
    ///
    /// The challenge is recorded before the send, so a gateway failure
    /// still leaves a verifiable code behind (the message may have gone
    /// out despite the error). The failure is surfaced to the caller.
    pub async fn issue(&self, user_id: &str, phone_number: &str) -> Result<SmsChallenge> {
        let otp = generate_otp();
        let challenge = SmsChallenge::new(otp, phone_number.to_string(), self.otp_ttl_minutes);

        self.store.put(user_id, challenge.clone()).await;

        let body = format!("Your {} 2FA code is: {}", self.issuer, challenge.otp);
        if let Err(e) = self.gateway.send(phone_number, &body).await {
            warn!(user_id = %user_id, "sms delivery failed, challenge kept: {}", e);
            return Err(e);
        }

        info!(user_id = %user_id, expires_at = %challenge.expires_at, "sms challenge issued");
        Ok(challenge)
    }

    /// Check `code` against the pending challenge for `user_id`.
    ///
    /// A missing challenge and a stale one are indistinguishable to the
    /// caller: both come back as `Expired`. Expired entries are left in
    /// place for the sweep; only a successful verification consumes the
    /// challenge.
    pub async fn verify(&self, user_id: &str, code: &str) -> Result<()> {
        let challenge = match self.store.get(user_id).await {
            Some(c) => c,
            None => return Err(TwoFactorError::Expired),
        };

        if challenge.is_expired(Utc::now()) {
            debug!(user_id = %user_id, "sms challenge expired");
            return Err(TwoFactorError::Expired);
        }

        if challenge.otp != code.trim() {
            debug!(user_id = %user_id, "sms code mismatch");
            return Err(TwoFactorError::InvalidCode);
        }

        self.store.remove(user_id).await;
        Ok(())
    }

    /// Sweep expired challenges. Verification already treats stale
    /// entries as expired, so this only reclaims memory.
    pub async fn purge_expired(&self) -> usize {
        let purged = self.store.purge_expired(Utc::now()).await;
        if purged > 0 {
            debug!(purged, "purged expired sms challenges");
        }
        purged
    }
}

/// Random 6-digit numeric code.
fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}
