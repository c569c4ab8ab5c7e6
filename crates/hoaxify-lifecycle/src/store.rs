//! The narrow store contracts the lifecycle components depend on.
//!
//! Each method maps to one atomic statement (or one transaction) on the
//! backing store. Implementations must not split a conditional method into a
//! read followed by a separate write: the conditional is what keeps a touch
//! from reviving an expired token and a claim from racing the reaper.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use hoaxify_types::models::AttachmentRecord;

pub trait TokenStore: Send + Sync {
    /// Inserts a new token row. Fails if the hash already exists.
    fn insert_token(&self, token_hash: &str, user_id: Uuid, now: DateTime<Utc>) -> Result<()>;

    /// Sets `last_active_at = now` on the row iff it exists and
    /// `last_active_at >= active_since`. Returns the owner when updated.
    fn touch_token(
        &self,
        token_hash: &str,
        active_since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>>;

    /// Returns whether a row was removed.
    fn delete_token(&self, token_hash: &str) -> Result<bool>;

    fn delete_tokens_for_user(&self, user_id: Uuid) -> Result<usize>;

    /// Deletes every row with `last_active_at < active_since`.
    fn delete_tokens_idle_before(&self, active_since: DateTime<Utc>) -> Result<usize>;
}

pub trait AttachmentStore: Send + Sync {
    /// Sets `hoax_id` iff the row exists, is unclaimed and is not condemned.
    /// Returns whether this call made the claim.
    fn claim_attachment(&self, attachment_id: Uuid, hoax_id: Uuid) -> Result<bool>;

    /// In one atomic step, condemns every unclaimed row uploaded before
    /// `uploaded_before` and returns all condemned rows, including those
    /// condemned by an earlier sweep that never finished. A condemned row can
    /// no longer be claimed.
    fn condemn_unclaimed(&self, uploaded_before: DateTime<Utc>) -> Result<Vec<AttachmentRecord>>;

    /// Rows currently claimed by `hoax_id`.
    fn attachments_for_hoax(&self, hoax_id: Uuid) -> Result<Vec<AttachmentRecord>>;

    /// Removes the row. Missing rows are not an error.
    fn delete_attachment(&self, attachment_id: Uuid) -> Result<()>;
}

/// Backing file storage for attachments.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Removes the blob stored under `key`. A blob that is already gone
    /// counts as removed.
    async fn delete(&self, key: &str) -> Result<()>;
}
