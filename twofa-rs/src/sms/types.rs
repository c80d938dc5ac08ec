use chrono::{DateTime, Duration, Utc};

/// A pending SMS challenge. Ephemeral: lives in the challenge store,
/// never in the credential table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsChallenge {
    /// 6-digit numeric code.
    pub otp: String,
    /// Destination the code was sent to.
    pub phone_number: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SmsChallenge {
    pub fn new(otp: String, phone_number: String, ttl_minutes: i64) -> Self {
        let now = Utc::now();
        Self {
            otp,
            phone_number,
            issued_at: now,
            expires_at: now + Duration::minutes(ttl_minutes),
        }
    }

    /// Expired strictly after `expires_at`; the boundary instant still
    /// verifies.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
