/// Database row types: these map directly to SQLite rows.
/// Distinct from hoaxify-types API models to keep the DB layer independent.
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password: String,
    pub inactive: bool,
    pub activation_token: Option<String>,
    pub password_reset_token: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct NewUser<'a> {
    pub id: Uuid,
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub activation_token: &'a str,
    pub created_at: DateTime<Utc>,
}

/// Public view of an active user, for listings.
pub struct UserSummaryRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub image: Option<String>,
}

pub struct HoaxRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A hoax joined with its author and optional attachment, for listings.
pub struct HoaxListingRow {
    pub id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub image: Option<String>,
    pub attachment_filename: Option<String>,
    pub attachment_file_type: Option<String>,
}
