use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// -- Generic --

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_pages: u32,
}

// -- Users --
//
// Missing and null text fields deserialize to "" so the handlers report
// them with their own validation keys.

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordUpdateRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub password: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub password_reset_token: String,
}

/// `image` is base64 file content. When absent the stored image is kept.
#[derive(Debug, Deserialize)]
pub struct UserUpdateRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub username: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub image: Option<String>,
}

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub id: Uuid,
    pub username: String,
    pub image: Option<String>,
    pub token: String,
}

// -- Hoaxes --

/// `file_attachment` is kept as raw JSON: an id that is not a known upload,
/// or not even a UUID, must not fail the submission.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitHoaxRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(default)]
    pub file_attachment: Option<serde_json::Value>,
}

impl SubmitHoaxRequest {
    pub fn attachment_id(&self) -> Option<Uuid> {
        self.file_attachment.as_ref()?.as_str()?.parse().ok()
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoaxResponse {
    pub id: Uuid,
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub user: HoaxAuthor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_attachment: Option<AttachmentInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HoaxAuthor {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub image: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentInfo {
    pub filename: String,
    pub file_type: Option<String>,
}

// -- Attachments --

#[derive(Debug, Serialize, Deserialize)]
pub struct AttachmentUploadResponse {
    pub id: Uuid,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
