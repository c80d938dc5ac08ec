//! Integration tests for the 2FA enrollment state machine (TOTP path)

use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use uuid::Uuid;

use twofa_rs::error::TwoFactorError;
use twofa_rs::mfa::{TwoFactorManager, TwoFactorState, VerifyOutcome};
use twofa_rs::sms::{InMemoryChallengeStore, NullGateway, SmsChallengeManager};
use twofa_rs::store::{SqliteCredentialStore, TwoFactorMethod};
use twofa_rs::totp::TotpEngine;

async fn setup_manager() -> TwoFactorManager {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    let store = SqliteCredentialStore::new(pool);
    store.init_db().await.unwrap();

    let sms = SmsChallengeManager::new(
        Arc::new(InMemoryChallengeStore::new()),
        Arc::new(NullGateway),
        "AZsubay.dev",
        5,
    );

    TwoFactorManager::new(store, TotpEngine::default(), sms)
}

fn user() -> String {
    format!("user-{}", Uuid::new_v4())
}

#[tokio::test]
async fn test_totp_enrollment_happy_path() {
    let manager = setup_manager().await;
    let user = user();

    let enrollment = manager.setup_totp(&user, &user).await.unwrap();
    assert!(enrollment.provisioning_uri.starts_with("otpauth://totp/"));
    assert!(enrollment.qr_code.starts_with("data:image/png;base64,"));
    assert_eq!(enrollment.backup_codes.len(), 5);

    let status = manager.status(&user).await.unwrap();
    assert_eq!(status.state, TwoFactorState::PendingTotp);
    assert!(!status.enabled);

    // Confirm with a code computed from the returned secret, the way an
    // authenticator app would.
    let engine = TotpEngine::default();
    let code = engine.generate_current(&enrollment.secret).unwrap();
    manager.enable_totp(&user, &code).await.unwrap();

    let status = manager.status(&user).await.unwrap();
    assert_eq!(status.state, TwoFactorState::EnabledTotp);
    assert!(status.enabled);
    assert_eq!(status.method, TwoFactorMethod::Totp);
    assert_eq!(status.backup_codes_remaining, 5);
    assert!(manager.is_enabled(&user).await.unwrap());
}

#[tokio::test]
async fn test_enable_with_wrong_code_stays_pending() {
    let manager = setup_manager().await;
    let user = user();

    manager.setup_totp(&user, &user).await.unwrap();

    let result = manager.enable_totp(&user, "000000").await;
    assert!(matches!(result, Err(TwoFactorError::InvalidCode)));

    let status = manager.status(&user).await.unwrap();
    assert_eq!(status.state, TwoFactorState::PendingTotp);
    assert!(!status.enabled);
}

#[tokio::test]
async fn test_verify_login_with_totp_code() {
    let manager = setup_manager().await;
    let user = user();
    let engine = TotpEngine::default();

    let enrollment = manager.setup_totp(&user, &user).await.unwrap();
    let code = engine.generate_current(&enrollment.secret).unwrap();
    manager.enable_totp(&user, &code).await.unwrap();

    let code = engine.generate_current(&enrollment.secret).unwrap();
    let outcome = manager.verify_login(&user, &code).await.unwrap();
    assert_eq!(outcome, VerifyOutcome::Totp);

    assert!(matches!(
        manager.verify_login(&user, "000000").await,
        Err(TwoFactorError::InvalidCode)
    ));
}

#[tokio::test]
async fn test_verify_login_before_enable_fails() {
    let manager = setup_manager().await;
    let user = user();

    assert!(matches!(
        manager.verify_login(&user, "123456").await,
        Err(TwoFactorError::NotSetUp)
    ));

    // Pending enrollment is still not an enabled second factor.
    manager.setup_totp(&user, &user).await.unwrap();
    assert!(matches!(
        manager.verify_login(&user, "123456").await,
        Err(TwoFactorError::NotSetUp)
    ));
}

#[tokio::test]
async fn test_backup_code_single_use() {
    let manager = setup_manager().await;
    let user = user();
    let engine = TotpEngine::default();

    let enrollment = manager.setup_totp(&user, &user).await.unwrap();
    let code = engine.generate_current(&enrollment.secret).unwrap();
    manager.enable_totp(&user, &code).await.unwrap();

    let backup = enrollment.backup_codes[0].clone();
    let outcome = manager.verify_login(&user, &backup).await.unwrap();
    assert_eq!(outcome, VerifyOutcome::BackupCode { remaining: 4 });

    // Consumed code never verifies again
    assert!(matches!(
        manager.verify_login(&user, &backup).await,
        Err(TwoFactorError::InvalidCode)
    ));

    let status = manager.status(&user).await.unwrap();
    assert_eq!(status.backup_codes_remaining, 4);
}

#[tokio::test]
async fn test_disable_totp_requires_valid_code() {
    let manager = setup_manager().await;
    let user = user();
    let engine = TotpEngine::default();

    let enrollment = manager.setup_totp(&user, &user).await.unwrap();
    let code = engine.generate_current(&enrollment.secret).unwrap();
    manager.enable_totp(&user, &code).await.unwrap();

    // Wrong code: the state does not move
    assert!(matches!(
        manager.disable_totp(&user, "000000").await,
        Err(TwoFactorError::InvalidCode)
    ));
    assert_eq!(
        manager.status(&user).await.unwrap().state,
        TwoFactorState::EnabledTotp
    );

    // Right code: secret and backup codes are wiped
    let code = engine.generate_current(&enrollment.secret).unwrap();
    manager.disable_totp(&user, &code).await.unwrap();

    let status = manager.status(&user).await.unwrap();
    assert_eq!(status.state, TwoFactorState::Disabled);
    assert_eq!(status.method, TwoFactorMethod::None);
    assert_eq!(status.backup_codes_remaining, 0);

    assert!(matches!(
        manager.backup_codes(&user).await,
        Err(TwoFactorError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_regenerate_replaces_backup_codes_wholesale() {
    let manager = setup_manager().await;
    let user = user();
    let engine = TotpEngine::default();

    let enrollment = manager.setup_totp(&user, &user).await.unwrap();
    let code = engine.generate_current(&enrollment.secret).unwrap();
    manager.enable_totp(&user, &code).await.unwrap();

    let first = manager.regenerate_backup_codes(&user).await.unwrap();
    let second = manager.regenerate_backup_codes(&user).await.unwrap();

    assert_eq!(first.len(), 5);
    assert_eq!(second.len(), 5);
    assert_ne!(first, second);

    // Codes from the first set no longer verify
    assert!(matches!(
        manager.verify_login(&user, &first[0]).await,
        Err(TwoFactorError::InvalidCode)
    ));

    // Codes from the current set do
    let outcome = manager.verify_login(&user, &second[0]).await.unwrap();
    assert_eq!(outcome, VerifyOutcome::BackupCode { remaining: 4 });
}

#[tokio::test]
async fn test_setup_again_while_pending_replaces_enrollment() {
    let manager = setup_manager().await;
    let user = user();
    let engine = TotpEngine::default();

    let first = manager.setup_totp(&user, &user).await.unwrap();
    let second = manager.setup_totp(&user, &user).await.unwrap();
    assert_ne!(first.secret, second.secret);

    // Only the latest secret confirms the enrollment
    let stale = engine.generate_current(&first.secret).unwrap();
    let fresh = engine.generate_current(&second.secret).unwrap();
    if stale != fresh {
        assert!(matches!(
            manager.enable_totp(&user, &stale).await,
            Err(TwoFactorError::InvalidCode)
        ));
    }
    manager.enable_totp(&user, &fresh).await.unwrap();
}

#[tokio::test]
async fn test_users_are_independent() {
    let manager = setup_manager().await;
    let (alice, bob) = (user(), user());
    let engine = TotpEngine::default();

    let enrollment = manager.setup_totp(&alice, &alice).await.unwrap();
    let code = engine.generate_current(&enrollment.secret).unwrap();
    manager.enable_totp(&alice, &code).await.unwrap();

    assert!(manager.is_enabled(&alice).await.unwrap());
    assert!(!manager.is_enabled(&bob).await.unwrap());

    // Alice's backup code is worthless to Bob
    assert!(matches!(
        manager.verify_login(&bob, &enrollment.backup_codes[0]).await,
        Err(TwoFactorError::NotSetUp)
    ));
}
