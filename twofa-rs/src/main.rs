use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, Level};

use twofa_rs::api::auth::JwtConfig;
use twofa_rs::api::ApiServer;
use twofa_rs::config::Config;
use twofa_rs::mfa::TwoFactorManager;
use twofa_rs::sms::{
    InMemoryChallengeStore, NullGateway, SmsChallengeManager, SmsGateway, TwilioGateway,
};
use twofa_rs::store::SqliteCredentialStore;
use twofa_rs::totp::{TotpEngine, TotpEngineConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = if std::path::Path::new("config.toml").exists() {
        Config::from_file("config.toml")?
    } else {
        Config::default()
    };

    // Initialize logging
    let level = Level::from_str(&config.logging.level).unwrap_or(Level::INFO);
    if config.logging.format == "json" {
        tracing_subscriber::fmt().json().with_max_level(level).init();
    } else {
        tracing_subscriber::fmt().pretty().with_max_level(level).init();
    }

    info!("Starting twofa-rs service");
    info!("  API listening on: {}", config.server.listen_addr);
    info!("  Database: {}", config.storage.database_url);
    info!("  TOTP issuer: {}", config.totp.issuer);

    // Database pool + schema
    let options =
        SqliteConnectOptions::from_str(&config.storage.database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;

    let store = SqliteCredentialStore::new(pool);
    store.init_db().await?;

    let totp = TotpEngine::new(TotpEngineConfig::from(&config.totp));

    let gateway: Arc<dyn SmsGateway> = match (
        &config.sms.account_sid,
        &config.sms.auth_token,
        &config.sms.from_number,
    ) {
        (Some(sid), Some(token), Some(from)) => {
            info!("  SMS gateway: twilio ({})", from);
            Arc::new(TwilioGateway::new(sid.clone(), token.clone(), from.clone()))
        }
        _ => {
            info!("  SMS gateway: not configured, codes will be logged");
            Arc::new(NullGateway)
        }
    };

    let sms = SmsChallengeManager::new(
        Arc::new(InMemoryChallengeStore::new()),
        gateway,
        config.totp.issuer.clone(),
        config.sms.otp_ttl_minutes,
    );

    let manager = Arc::new(TwoFactorManager::new(store.clone(), totp, sms));

    let jwt_config = JwtConfig::new(config.auth.jwt_secret.clone(), config.auth.token_ttl_hours);
    let server = ApiServer::new(manager, store, jwt_config, config.server.listen_addr.clone());

    server.run().await?;

    Ok(())
}
