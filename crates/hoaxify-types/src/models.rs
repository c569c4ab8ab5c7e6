use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored session token. The raw bearer value never lives here, only its
/// digest, so a dump of the table cannot be replayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub token_hash: String,
    pub user_id: Uuid,
    pub last_active_at: DateTime<Utc>,
}

/// An uploaded file. `hoax_id` is unset until a hoax claims it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub id: Uuid,
    pub filename: String,
    pub file_type: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub hoax_id: Option<Uuid>,
}

impl AttachmentRecord {
    pub fn is_claimed(&self) -> bool {
        self.hoax_id.is_some()
    }
}
