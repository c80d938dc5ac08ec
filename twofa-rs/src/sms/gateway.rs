//! SMS delivery gateways
//!
//! The challenge manager only knows the `SmsGateway` trait; Twilio is
//! the production implementation and `NullGateway` covers local dev
//! where no Twilio credentials exist.

use tracing::{debug, info, warn};

use crate::error::{Result, TwoFactorError};

/// Outbound SMS delivery.
#[async_trait::async_trait]
pub trait SmsGateway: Send + Sync {
    /// Deliver `body` to `to` (E.164 phone number).
    async fn send(&self, to: &str, body: &str) -> Result<()>;
}

/// Twilio REST gateway.
pub struct TwilioGateway {
    account_sid: String,
    auth_token: String,
    from_number: String,
    client: reqwest::Client,
}

impl TwilioGateway {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        from_number: impl Into<String>,
    ) -> Self {
        Self {
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            from_number: from_number.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl SmsGateway for TwilioGateway {
    async fn send(&self, to: &str, body: &str) -> Result<()> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        );

        let params = [
            ("To", to),
            ("From", self.from_number.as_str()),
            ("Body", body),
        ];

        debug!(to = %to, "sending sms via twilio");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| TwoFactorError::Gateway(format!("twilio request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!("twilio rejected message: {} - {}", status, error_text);
            return Err(TwoFactorError::Gateway(format!(
                "twilio returned {}: {}",
                status, error_text
            )));
        }

        Ok(())
    }
}

/// Dev-mode gateway: logs the message instead of sending it, so the
/// flow stays testable without Twilio credentials.
pub struct NullGateway;

#[async_trait::async_trait]
impl SmsGateway for NullGateway {
    async fn send(&self, to: &str, body: &str) -> Result<()> {
        info!(to = %to, "sms gateway not configured, logging message: {}", body);
        Ok(())
    }
}
