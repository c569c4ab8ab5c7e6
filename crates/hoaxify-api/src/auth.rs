use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header},
    response::IntoResponse,
};
use tracing::info;

use hoaxify_db::Database;
use hoaxify_lifecycle::{AttachmentReaper, Clock, Gate, SessionManager, bearer_token};
use hoaxify_types::api::{LoginRequest, LoginResponse, MessageResponse};

use crate::error::{ApiError, ApiJson, blocking};
use crate::mail::Mailer;
use crate::storage::DiskStorage;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub sessions: Arc<SessionManager>,
    pub reaper: Arc<AttachmentReaper>,
    pub gate: Gate,
    /// Hoax attachments, served under `/attachments`.
    pub attachments: Arc<DiskStorage>,
    /// Profile images, served under `/images`.
    pub images: Arc<DiskStorage>,
    pub mailer: Arc<dyn Mailer>,
    pub clock: Arc<dyn Clock>,
}

/// POST /api/1.0/auth
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.email.is_empty() || req.password.is_empty() {
        return Err(ApiError::unauthorized("authentication_failure"));
    }

    let db = state.db.clone();
    let email = req.email.clone();
    let user = blocking(move || db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::unauthorized("authentication_failure"))?;

    if !verify_password(&req.password, &user.password)? {
        return Err(ApiError::unauthorized("authentication_failure"));
    }

    if user.inactive {
        return Err(ApiError::forbidden("inactive_authentication_failure"));
    }

    let sessions = state.sessions.clone();
    let user_id = user.id;
    let token = blocking(move || Ok(sessions.issue(user_id)?)).await?;

    info!(%user_id, "user logged in");
    Ok(Json(LoginResponse {
        id: user.id,
        username: user.username,
        image: user.image,
        token,
    }))
}

/// POST /api/1.0/logout: revokes the presented token, if any. Always 200.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_owned);

    if let Some(token) = token {
        let sessions = state.sessions.clone();
        blocking(move || Ok(sessions.revoke(&token)?)).await?;
    }

    Ok(Json(MessageResponse::new("logout_success")))
}

/// Hash a password with Argon2id.
pub(crate) fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::internal("password hash error", e))
}

fn verify_password(password: &str, stored: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(stored).map_err(|e| ApiError::internal("stored hash unreadable", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
