use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use tracing::{info, warn};
use uuid::Uuid;

use hoaxify_db::models::{NewUser, UserRow, UserSummaryRow};
use hoaxify_lifecycle::{BlobStore, Clock, Identity};
use hoaxify_types::api::{
    MessageResponse, Page, PasswordResetRequest, PasswordUpdateRequest, RegisterRequest,
    UserResponse, UserUpdateRequest,
};

use crate::auth::{AppState, hash_password};
use crate::error::{ApiError, ApiJson, blocking};
use crate::files::sniff_type;
use crate::mail::Mail;
use crate::pagination::{PageQuery, total_pages};
use crate::random_string;

const TOKEN_LEN: usize = 16;
const IMAGE_NAME_LEN: usize = 32;

/// Decoded profile images must stay under 2 MB.
pub const MAX_PROFILE_IMAGE_SIZE: usize = 2 * 1024 * 1024;

/// Body limit for `PUT /users/{id}`: a base64 image just under the cap plus
/// the rest of the JSON.
pub const MAX_USER_UPDATE_BODY: usize = 3 * 1024 * 1024;

/// POST /api/1.0/users
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_username(&req.username)?;
    validate_email(&req.email)?;
    validate_password(&req.password)?;

    let db = state.db.clone();
    let email = req.email.clone();
    if blocking(move || db.get_user_by_email(&email)).await?.is_some() {
        return Err(ApiError::bad_request("email_inuse"));
    }

    let password_hash = hash_password(&req.password)?;
    let activation_token = random_string(TOKEN_LEN);
    let user_id = Uuid::new_v4();
    let now = state.clock.now();

    let db = state.db.clone();
    let token = activation_token.clone();
    let (username, email) = (req.username.clone(), req.email.clone());
    blocking(move || {
        db.create_user(&NewUser {
            id: user_id,
            username: &username,
            email: &email,
            password_hash: &password_hash,
            activation_token: &token,
            created_at: now,
        })
    })
    .await?;

    if let Err(e) = state
        .mailer
        .send(Mail::account_activation(&req.email, &activation_token))
        .await
    {
        warn!(%user_id, "activation mail failed, rolling back registration: {}", e);
        let db = state.db.clone();
        blocking(move || db.delete_user(user_id)).await?;
        return Err(ApiError::new(StatusCode::BAD_GATEWAY, "email_failure"));
    }

    info!(%user_id, "user registered");
    Ok(Json(MessageResponse::new("user_create_success")))
}

/// POST /api/1.0/users/token/{token}
pub async fn activate(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    if !blocking(move || db.activate_user(&token)).await? {
        return Err(ApiError::bad_request("account_activation_failure"));
    }
    Ok(Json(MessageResponse::new("account_activation_success")))
}

/// GET /api/1.0/users: active users, paged, without the caller.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, size) = query.resolve();
    let offset = PageQuery::offset(page, size);
    let exclude = identity.user_id();

    let db = state.db.clone();
    let (rows, total) = blocking(move || {
        let rows = db.list_active_users(exclude, size, offset)?;
        let total = db.count_active_users(exclude)?;
        Ok((rows, total))
    })
    .await?;

    Ok(Json(Page {
        content: rows.into_iter().map(summary_response).collect::<Vec<_>>(),
        page,
        size,
        total_pages: total_pages(total, size),
    }))
}

/// GET /api/1.0/users/{id}: inactive accounts look the same as missing ones.
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    match blocking(move || db.get_user_by_id(user_id)).await? {
        Some(user) if !user.inactive => Ok(Json(user_response(user))),
        _ => Err(ApiError::not_found("user_not_found")),
    }
}

/// PUT /api/1.0/users/{id}: the owner changes their username and, optionally,
/// their profile image (base64 PNG or JPEG). A new image replaces and
/// deletes the old one.
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
    ApiJson(req): ApiJson<UserUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if identity.user_id() != Some(user_id) {
        return Err(ApiError::forbidden("unauthorized_user_update"));
    }
    validate_username(&req.username)?;
    let image = match req.image.as_deref().filter(|image| !image.is_empty()) {
        Some(encoded) => Some(decode_profile_image(encoded)?),
        None => None,
    };

    let db = state.db.clone();
    let current = blocking(move || db.get_user_by_id(user_id))
        .await?
        .ok_or(ApiError::forbidden("unauthorized_user_update"))?;

    let filename = match image {
        Some(bytes) => {
            let filename = random_string(IMAGE_NAME_LEN);
            state
                .images
                .save(&filename, &bytes)
                .await
                .map_err(|e| ApiError::internal("profile image write failed", e))?;
            Some(filename)
        }
        None => None,
    };

    let db = state.db.clone();
    let (username, new_image) = (req.username.clone(), filename.clone());
    blocking(move || db.update_user(user_id, &username, new_image.as_deref())).await?;

    if let (Some(_), Some(old)) = (&filename, &current.image) {
        remove_profile_image(&state, old).await;
    }

    info!(%user_id, image_changed = filename.is_some(), "user updated");
    Ok(Json(UserResponse {
        id: user_id,
        username: req.username,
        email: current.email,
        image: filename.or(current.image),
    }))
}

/// DELETE /api/1.0/users/{id}: only the account owner may do this.
///
/// Order matters: attachments are released while their hoaxes still point
/// at them, then every session is revoked, then the user row (and by
/// cascade the hoaxes) goes. The profile image is deleted last.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    if identity.user_id() != Some(user_id) {
        return Err(ApiError::forbidden("unauthorized_user_delete"));
    }

    let db = state.db.clone();
    let (image, hoax_ids) = blocking(move || {
        let image = db.get_user_by_id(user_id)?.and_then(|user| user.image);
        Ok((image, db.hoax_ids_for_user(user_id)?))
    })
    .await?;
    for hoax_id in hoax_ids {
        state
            .reaper
            .release_for_hoax(hoax_id)
            .await
            .map_err(|e| ApiError::internal("attachment release failed", e))?;
    }

    let sessions = state.sessions.clone();
    blocking(move || Ok(sessions.revoke_all(user_id)?)).await?;

    let db = state.db.clone();
    blocking(move || db.delete_user(user_id)).await?;

    if let Some(image) = image {
        remove_profile_image(&state, &image).await;
    }

    info!(%user_id, "user deleted");
    Ok(Json(MessageResponse::new("user_delete_success")))
}

/// POST /api/1.0/user/password: mail a reset token.
pub async fn request_password_reset(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PasswordResetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_email(&req.email)?;

    let db = state.db.clone();
    let email = req.email.clone();
    let user = blocking(move || db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::not_found("email_not_inuse"))?;

    let reset_token = random_string(TOKEN_LEN);
    let db = state.db.clone();
    let token = reset_token.clone();
    let user_id = user.id;
    blocking(move || db.set_password_reset_token(user_id, &token)).await?;

    state
        .mailer
        .send(Mail::password_reset(&user.email, &reset_token))
        .await
        .map_err(|e| {
            warn!(%user_id, "password reset mail failed: {}", e);
            ApiError::new(StatusCode::BAD_GATEWAY, "email_failure")
        })?;

    Ok(Json(MessageResponse::new("password_reset_request_success")))
}

/// PUT /api/1.0/user/password: consume a reset token and set a new
/// password. Every existing session of that user is revoked.
pub async fn update_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PasswordUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let token = req.password_reset_token.clone();
    if blocking(move || db.get_user_by_reset_token(&token)).await?.is_none() {
        return Err(ApiError::forbidden("unauthorized_password_reset"));
    }

    validate_password(&req.password)?;
    let password_hash = hash_password(&req.password)?;

    let db = state.db.clone();
    let token = req.password_reset_token.clone();
    let user_id = blocking(move || db.reset_password(&token, &password_hash))
        .await?
        .ok_or(ApiError::forbidden("unauthorized_password_reset"))?;

    let sessions = state.sessions.clone();
    blocking(move || Ok(sessions.revoke_all(user_id)?)).await?;

    info!(%user_id, "password reset");
    Ok(Json(MessageResponse::new("password_update_success")))
}

async fn remove_profile_image(state: &AppState, filename: &str) {
    if let Err(e) = state.images.delete(filename).await {
        warn!("Failed to delete profile image {}: {}", filename, e);
    }
}

fn user_response(user: UserRow) -> UserResponse {
    UserResponse {
        id: user.id,
        username: user.username,
        email: user.email,
        image: user.image,
    }
}

fn summary_response(user: UserSummaryRow) -> UserResponse {
    UserResponse {
        id: user.id,
        username: user.username,
        email: user.email,
        image: user.image,
    }
}

// -- Validation --

fn decode_profile_image(encoded: &str) -> Result<Vec<u8>, ApiError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|_| ApiError::bad_request("unsupported_image_file"))?;
    if bytes.len() >= MAX_PROFILE_IMAGE_SIZE {
        return Err(ApiError::bad_request("profile_image_size"));
    }
    match sniff_type(&bytes) {
        Some("image/png" | "image/jpeg") => Ok(bytes),
        _ => Err(ApiError::bad_request("unsupported_image_file")),
    }
}

fn validate_username(username: &str) -> Result<(), ApiError> {
    let len = username.chars().count();
    if username.trim().is_empty() {
        return Err(ApiError::bad_request("username_null"));
    }
    if !(4..=32).contains(&len) {
        return Err(ApiError::bad_request("username_size"));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.is_empty() {
        return Err(ApiError::bad_request("email_null"));
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid {
        return Err(ApiError::bad_request("email_invalid"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.is_empty() {
        return Err(ApiError::bad_request("password_null"));
    }
    if password.chars().count() < 6 {
        return Err(ApiError::bad_request("password_size"));
    }
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_upper && has_lower && has_digit) {
        return Err(ApiError::bad_request("password_pattern"));
    }
    Ok(())
}
