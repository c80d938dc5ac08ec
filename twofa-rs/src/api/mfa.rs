//! API endpoints for 2FA management
//!
//! Thin wrappers: each handler pulls the authenticated user id from the
//! JWT claims, calls one `TwoFactorManager` operation and maps the typed
//! failure onto an HTTP status.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::api::auth::{Claims, JwtConfig};
use crate::api::server::RateLimiter;
use crate::backup;
use crate::error::TwoFactorError;
use crate::mfa::{TotpEnrollment, TwoFactorManager, TwoFactorStatus, VerifyOutcome};
use crate::store::SqliteCredentialStore;

/// Shared application state
pub struct AppState {
    pub manager: Arc<TwoFactorManager>,
    pub store: SqliteCredentialStore,
    pub jwt_config: JwtConfig,
    pub rate_limiter: RateLimiter,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(msg: &str) -> Self {
        Self {
            error: msg.to_string(),
        }
    }
}

/// Request body carrying a TOTP or backup code
#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub code: String,
}

/// Request body for SMS enrollment
#[derive(Debug, Deserialize)]
pub struct SmsSetupRequest {
    pub phone_number: String,
}

/// Request body for SMS confirmation
#[derive(Debug, Deserialize)]
pub struct SmsVerifyRequest {
    pub otp: String,
}

/// Generic confirmation response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(msg: &str) -> Json<Self> {
        Json(Self {
            message: msg.to_string(),
        })
    }
}

/// Login verification response
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub verified: bool,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_backup_codes: Option<usize>,
}

/// Backup codes response
#[derive(Debug, Serialize)]
pub struct BackupCodesResponse {
    pub backup_codes: Vec<String>,
    pub message: String,
}

/// Map a state-machine failure to an HTTP response.
///
/// The guard taxonomy is the caller's fault (400), a failed SMS dispatch
/// is the carrier's (502); everything else is ours (500) and the detail
/// stays in the log.
fn api_error(err: TwoFactorError) -> (StatusCode, Json<ApiError>) {
    let status = match &err {
        TwoFactorError::NotSetUp
        | TwoFactorError::InvalidCode
        | TwoFactorError::Expired
        | TwoFactorError::AlreadyEnabled
        | TwoFactorError::AlreadyDisabled => StatusCode::BAD_REQUEST,
        TwoFactorError::Gateway(_) => StatusCode::BAD_GATEWAY,
        TwoFactorError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("2fa operation failed: {}", err);
        return (status, Json(ApiError::new("Internal server error")));
    }

    (status, Json(ApiError::new(&err.to_string())))
}

/// POST /api/auth/2fa/setup - Start TOTP enrollment
pub async fn setup_totp(
    State(state): State<Arc<AppState>>,
    claims: Claims,
) -> Result<Json<TotpEnrollment>, (StatusCode, Json<ApiError>)> {
    let enrollment = state
        .manager
        .setup_totp(&claims.sub, &claims.sub)
        .await
        .map_err(api_error)?;

    Ok(Json(enrollment))
}

/// POST /api/auth/2fa/enable - Confirm TOTP enrollment
pub async fn enable_totp(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Json(payload): Json<CodeRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, Json<ApiError>)> {
    state
        .manager
        .enable_totp(&claims.sub, &payload.code)
        .await
        .map_err(api_error)?;

    Ok(MessageResponse::new("Two-factor authentication enabled"))
}

/// POST /api/auth/2fa/verify - Second-factor check (TOTP or backup code)
pub async fn verify_login(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Json(payload): Json<CodeRequest>,
) -> Result<Json<VerifyResponse>, (StatusCode, Json<ApiError>)> {
    let outcome = state
        .manager
        .verify_login(&claims.sub, &payload.code)
        .await
        .map_err(api_error)?;

    let remaining = match outcome {
        VerifyOutcome::BackupCode { remaining } => Some(remaining),
        VerifyOutcome::Totp => None,
    };

    Ok(Json(VerifyResponse {
        verified: true,
        method: outcome.method().to_string(),
        remaining_backup_codes: remaining,
    }))
}

/// POST /api/auth/2fa/disable - Turn TOTP 2FA off (code required)
pub async fn disable_totp(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Json(payload): Json<CodeRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, Json<ApiError>)> {
    state
        .manager
        .disable_totp(&claims.sub, &payload.code)
        .await
        .map_err(api_error)?;

    Ok(MessageResponse::new("Two-factor authentication disabled"))
}

/// POST /api/auth/2fa/backup-codes - Replace the backup code set
pub async fn regenerate_backup_codes(
    State(state): State<Arc<AppState>>,
    claims: Claims,
) -> Result<Json<BackupCodesResponse>, (StatusCode, Json<ApiError>)> {
    let codes = state
        .manager
        .regenerate_backup_codes(&claims.sub)
        .await
        .map_err(api_error)?;

    Ok(Json(BackupCodesResponse {
        backup_codes: codes,
        message: "New backup codes generated. Previous codes no longer work.".to_string(),
    }))
}

/// GET /api/auth/2fa/backup-codes/download - Backup codes as a text file
pub async fn download_backup_codes(
    State(state): State<Arc<AppState>>,
    claims: Claims,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiError>)> {
    let codes = state
        .manager
        .backup_codes(&claims.sub)
        .await
        .map_err(api_error)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=backup-codes.txt",
            ),
        ],
        backup::artifact(&codes),
    ))
}

/// POST /api/auth/2fa/sms/setup - Start SMS enrollment (sends the OTP)
pub async fn setup_sms(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Json(payload): Json<SmsSetupRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, Json<ApiError>)> {
    state
        .manager
        .setup_sms(&claims.sub, &payload.phone_number)
        .await
        .map_err(api_error)?;

    Ok(MessageResponse::new("OTP sent to your phone number"))
}

/// POST /api/auth/2fa/sms/verify - Confirm SMS enrollment
pub async fn verify_sms(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Json(payload): Json<SmsVerifyRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, Json<ApiError>)> {
    state
        .manager
        .verify_sms(&claims.sub, &payload.otp)
        .await
        .map_err(api_error)?;

    Ok(MessageResponse::new("SMS two-factor authentication enabled"))
}

/// POST /api/auth/2fa/sms/disable - Turn SMS 2FA off
pub async fn disable_sms(
    State(state): State<Arc<AppState>>,
    claims: Claims,
) -> Result<Json<MessageResponse>, (StatusCode, Json<ApiError>)> {
    state
        .manager
        .disable_sms(&claims.sub)
        .await
        .map_err(api_error)?;

    Ok(MessageResponse::new("SMS two-factor authentication disabled"))
}

/// GET /api/auth/2fa/status - Current 2FA configuration
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    claims: Claims,
) -> Result<Json<TwoFactorStatus>, (StatusCode, Json<ApiError>)> {
    let status = state.manager.status(&claims.sub).await.map_err(api_error)?;

    Ok(Json(status))
}

/// GET /api/health - Service health
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_healthy = state.store.health_check().await.is_ok();

    let status = if db_healthy { "healthy" } else { "unhealthy" };
    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": status,
            "service": "twofa-rs",
            "version": env!("CARGO_PKG_VERSION"),
            "checks": {
                "database": if db_healthy { "ok" } else { "failed" }
            }
        })),
    )
}
