use axum::{
    Json,
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    response::IntoResponse,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use hoaxify_lifecycle::{BlobStore, Clock};
use hoaxify_types::{api::AttachmentUploadResponse, models::AttachmentRecord};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};
use crate::random_string;

/// 5 MB upload limit for attachments
pub const MAX_ATTACHMENT_SIZE: usize = 5 * 1024 * 1024;

const FILENAME_LEN: usize = 32;

/// POST /api/1.0/hoaxes/attachments: accepts raw bytes, stores them under a
/// generated name and records an unclaimed attachment. Anything not claimed
/// by a hoax within the grace period is reaped.
///
/// The route's body limit equals [`MAX_ATTACHMENT_SIZE`]; going over it is a
/// 400 like any other size violation, not a bare 413.
pub async fn upload_attachment(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = body.map_err(|rejection| {
        debug!(status = %rejection.status(), "Attachment body rejected: {}", rejection.body_text());
        ApiError::bad_request("attachment_size_limit")
    })?;
    if bytes.is_empty() {
        return Err(ApiError::bad_request("attachment_empty"));
    }
    if bytes.len() > MAX_ATTACHMENT_SIZE {
        return Err(ApiError::bad_request("attachment_size_limit"));
    }

    let file_type = sniff_type(&bytes);
    let filename = match file_type.and_then(extension) {
        Some(ext) => format!("{}.{}", random_string(FILENAME_LEN), ext),
        None => random_string(FILENAME_LEN),
    };

    state
        .attachments
        .save(&filename, &bytes)
        .await
        .map_err(|e| ApiError::internal("attachment write failed", e))?;

    let record = AttachmentRecord {
        id: Uuid::new_v4(),
        filename: filename.clone(),
        file_type: file_type.map(str::to_owned),
        uploaded_at: state.clock.now(),
        hoax_id: None,
    };
    let id = record.id;

    let db = state.db.clone();
    if let Err(e) = blocking(move || db.insert_attachment(&record)).await {
        if let Err(cleanup) = state.attachments.delete(&filename).await {
            warn!("Orphaned attachment file {}: {}", filename, cleanup);
        }
        return Err(e);
    }

    info!(%id, size = bytes.len(), "attachment uploaded");
    Ok(Json(AttachmentUploadResponse { id }))
}

pub(crate) fn sniff_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.starts_with(b"%PDF-") {
        Some("application/pdf")
    } else {
        None
    }
}

fn extension(file_type: &str) -> Option<&'static str> {
    match file_type {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "application/pdf" => Some("pdf"),
        _ => None,
    }
}
