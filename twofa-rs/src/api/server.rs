//! API server - HTTP surface for the 2FA service

use axum::{
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::auth::{Claims, JwtConfig};
use crate::api::mfa::{self, ApiError, AppState};
use crate::mfa::TwoFactorManager;
use crate::store::SqliteCredentialStore;

/// Fixed-window rate limiter for code-verification attempts.
///
/// Keyed by user id: a 6-digit code must not be brute-forceable by
/// hammering the verify endpoints.
pub struct RateLimiter {
    /// Map of key -> (attempt count, window start time)
    attempts: RwLock<HashMap<String, (u32, Instant)>>,
    /// Maximum attempts per window
    max_attempts: u32,
    /// Window duration
    window_duration: Duration,
}

impl RateLimiter {
    pub fn new(max_attempts: u32, window_seconds: u64) -> Self {
        Self {
            attempts: RwLock::new(HashMap::new()),
            max_attempts,
            window_duration: Duration::from_secs(window_seconds),
        }
    }

    /// Check whether another attempt is allowed for this key.
    pub async fn check_rate_limit(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut attempts = self.attempts.write().await;

        let entry = attempts.entry(key.to_string()).or_insert((0, now));

        // Reset if window has passed
        if now.duration_since(entry.1) > self.window_duration {
            entry.0 = 0;
            entry.1 = now;
        }

        if entry.0 >= self.max_attempts {
            return false;
        }

        entry.0 += 1;
        true
    }

    /// Drop stale windows (call periodically).
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut attempts = self.attempts.write().await;
        attempts.retain(|_, (_, start)| now.duration_since(*start) <= self.window_duration * 2);
    }
}

/// API server configuration
pub struct ApiServer {
    state: Arc<AppState>,
    addr: String,
}

impl ApiServer {
    pub fn new(
        manager: Arc<TwoFactorManager>,
        store: SqliteCredentialStore,
        jwt_config: JwtConfig,
        addr: String,
    ) -> Self {
        // 10 code attempts per minute per user
        let state = Arc::new(AppState {
            manager,
            store,
            jwt_config,
            rate_limiter: RateLimiter::new(10, 60),
        });

        Self { state, addr }
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        // Public routes (no auth required)
        let public_routes = Router::new().route("/health", get(mfa::health));

        // Code-checking routes get the attempt limiter on top of auth
        let code_routes = Router::new()
            .route("/auth/2fa/enable", post(mfa::enable_totp))
            .route("/auth/2fa/verify", post(mfa::verify_login))
            .route("/auth/2fa/disable", post(mfa::disable_totp))
            .route("/auth/2fa/sms/verify", post(mfa::verify_sms))
            .route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                rate_limit_middleware,
            ));

        // Protected routes (auth required)
        let protected_routes = Router::new()
            .route("/auth/2fa/setup", post(mfa::setup_totp))
            .route("/auth/2fa/backup-codes", post(mfa::regenerate_backup_codes))
            .route(
                "/auth/2fa/backup-codes/download",
                get(mfa::download_backup_codes),
            )
            .route("/auth/2fa/sms/setup", post(mfa::setup_sms))
            .route("/auth/2fa/sms/disable", post(mfa::disable_sms))
            .route("/auth/2fa/status", get(mfa::get_status))
            .merge(code_routes)
            .route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth_middleware,
            ));

        Router::new()
            .nest("/api", public_routes.merge(protected_routes))
            .layer(cors)
            .with_state(self.state.clone())
    }

    /// Start the API server
    pub async fn run(&self) -> std::io::Result<()> {
        let router = self.router();

        info!("Starting API server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}

/// Authentication middleware - validates the JWT bearer token
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(h) if h.starts_with("Bearer ") => &h[7..],
        _ => {
            warn!("Missing or invalid Authorization header");
            return (
                StatusCode::UNAUTHORIZED,
                Json(ApiError::new("Missing or invalid Authorization header")),
            )
                .into_response();
        }
    };

    match state.jwt_config.validate_token(token) {
        Ok(claims) => {
            // Store claims in request extensions for handlers
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => {
            warn!("Invalid JWT token: {}", e);
            (
                StatusCode::UNAUTHORIZED,
                Json(ApiError::new("Invalid or expired token")),
            )
                .into_response()
        }
    }
}

/// Attempt limiter for the code-verification endpoints. Runs inside the
/// auth middleware, so the claims are already in the extensions.
async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let key = req
        .extensions()
        .get::<Claims>()
        .map(|c| c.sub.clone())
        .unwrap_or_else(|| "anonymous".to_string());

    if !state.rate_limiter.check_rate_limit(&key).await {
        warn!(user_id = %key, "verification attempt rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiError::new("Too many attempts, try again later")),
        )
            .into_response();
    }

    next.run(req).await
}

/// Extract Claims from request (for handlers)
#[axum::async_trait]
impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ApiError>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Claims>().cloned().ok_or((
            StatusCode::UNAUTHORIZED,
            Json(ApiError::new("Not authenticated")),
        ))
    }
}
