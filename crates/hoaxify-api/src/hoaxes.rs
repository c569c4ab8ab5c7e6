use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use hoaxify_db::models::HoaxListingRow;
use hoaxify_lifecycle::{Clock, Identity};
use hoaxify_types::api::{
    AttachmentInfo, HoaxAuthor, HoaxResponse, MessageResponse, Page, SubmitHoaxRequest,
};

use crate::auth::AppState;
use crate::error::{ApiError, ApiJson, blocking};
use crate::pagination::{PageQuery, total_pages};

/// POST /api/1.0/hoaxes
pub async fn submit(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(req): ApiJson<SubmitHoaxRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = identity
        .user_id()
        .ok_or(ApiError::unauthorized("unauthorized_hoax_submit"))?;

    let len = req.content.chars().count();
    if !(10..=5000).contains(&len) {
        return Err(ApiError::bad_request("hoax_content_size"));
    }

    let hoax_id = Uuid::new_v4();
    let now = state.clock.now();
    let db = state.db.clone();
    let content = req.content.clone();
    blocking(move || db.insert_hoax(hoax_id, user_id, &content, now)).await?;

    // A stale, foreign or malformed attachment id is ignored, never a failure.
    if let Some(attachment_id) = req.attachment_id() {
        let reaper = state.reaper.clone();
        blocking(move || Ok(reaper.claim(attachment_id, hoax_id)?)).await?;
    }

    info!(%hoax_id, %user_id, "hoax submitted");
    Ok(Json(MessageResponse::new("hoax_submit_success")))
}

/// GET /api/1.0/hoaxes
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(page_of(&state, None, &query).await?))
}

/// GET /api/1.0/users/{id}/hoaxes
pub async fn list_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    if blocking(move || db.get_user_by_id(user_id)).await?.is_none() {
        return Err(ApiError::not_found("user_not_found"));
    }
    Ok(Json(page_of(&state, Some(user_id), &query).await?))
}

/// DELETE /api/1.0/hoaxes/{id}: only the author may do this. The claimed
/// attachment goes with the hoax.
pub async fn delete(
    State(state): State<AppState>,
    Path(hoax_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(user_id) = identity.user_id() else {
        return Err(ApiError::forbidden("unauthorized_hoax_delete"));
    };

    let db = state.db.clone();
    let hoax = blocking(move || db.get_hoax(hoax_id)).await?;
    if hoax.is_none_or(|h| h.user_id != user_id) {
        return Err(ApiError::forbidden("unauthorized_hoax_delete"));
    }

    state
        .reaper
        .release_for_hoax(hoax_id)
        .await
        .map_err(|e| ApiError::internal("attachment release failed", e))?;

    let db = state.db.clone();
    blocking(move || db.delete_hoax(hoax_id)).await?;

    info!(%hoax_id, %user_id, "hoax deleted");
    Ok(Json(MessageResponse::new("hoax_delete_success")))
}

async fn page_of(
    state: &AppState,
    author: Option<Uuid>,
    query: &PageQuery,
) -> Result<Page<HoaxResponse>, ApiError> {
    let (page, size) = query.resolve();
    let offset = PageQuery::offset(page, size);

    let db = state.db.clone();
    let (rows, total) = blocking(move || {
        let rows = db.list_hoaxes(author, size, offset)?;
        let total = db.count_hoaxes(author)?;
        Ok((rows, total))
    })
    .await?;

    Ok(Page {
        content: rows.into_iter().map(to_response).collect(),
        page,
        size,
        total_pages: total_pages(total, size),
    })
}

fn to_response(row: HoaxListingRow) -> HoaxResponse {
    HoaxResponse {
        id: row.id,
        content: row.content,
        timestamp: row.created_at.timestamp_millis(),
        user: HoaxAuthor {
            id: row.user_id,
            username: row.username,
            email: row.email,
            image: row.image,
        },
        file_attachment: row.attachment_filename.map(|filename| AttachmentInfo {
            filename,
            file_type: row.attachment_file_type,
        }),
    }
}
