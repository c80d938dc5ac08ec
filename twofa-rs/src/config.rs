use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub totp: TotpConfig,
    pub sms: SmsConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub listen_addr: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TotpConfig {
    /// Issuer shown in authenticator apps and used in SMS bodies.
    pub issuer: String,
    pub digits: usize,
    pub step: u64,
    /// Accepted clock drift, in time steps.
    pub skew: u8,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SmsConfig {
    /// Twilio credentials. When absent the service logs OTPs instead of
    /// dispatching them (development mode).
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    pub otp_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub database_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::TwoFactorError::Config(e.to_string()))?;

        toml::from_str(&content).map_err(|e| crate::error::TwoFactorError::Config(e.to_string()))
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig {
                listen_addr: "0.0.0.0:8080".to_string(),
            },
            auth: AuthConfig {
                jwt_secret: std::env::var("JWT_SECRET")
                    .unwrap_or_else(|_| "your-secret-key-azsubay-dev".to_string()),
                token_ttl_hours: 24,
            },
            totp: TotpConfig {
                issuer: "AZsubay.dev".to_string(),
                digits: 6,
                step: 30,
                skew: 1,
            },
            sms: SmsConfig {
                account_sid: std::env::var("TWILIO_ACCOUNT_SID").ok(),
                auth_token: std::env::var("TWILIO_AUTH_TOKEN").ok(),
                from_number: std::env::var("TWILIO_PHONE_NUMBER").ok(),
                otp_ttl_minutes: 5,
            },
            storage: StorageConfig {
                database_url: "sqlite://twofa.db".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
