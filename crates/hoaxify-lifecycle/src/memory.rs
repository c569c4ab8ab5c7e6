//! In-memory stores for unit tests. One mutex per table gives the same
//! per-row atomicity the SQLite store gets from single statements.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use hoaxify_types::models::{AttachmentRecord, TokenRecord};

use crate::store::{AttachmentStore, BlobStore, TokenStore};

#[derive(Default)]
pub struct MemoryTokens {
    rows: Mutex<HashMap<String, TokenRecord>>,
    pub fail: AtomicBool,
}

impl MemoryTokens {
    pub fn get(&self, token_hash: &str) -> Option<TokenRecord> {
        self.rows.lock().unwrap().get(token_hash).cloned()
    }

    pub fn put(&self, record: TokenRecord) {
        self.rows
            .lock()
            .unwrap()
            .insert(record.token_hash.clone(), record);
    }

    pub fn count_for(&self, user_id: Uuid) -> usize {
        self.rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.user_id == user_id)
            .count()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    fn check(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("token table unavailable");
        }
        Ok(())
    }
}

impl TokenStore for MemoryTokens {
    fn insert_token(&self, token_hash: &str, user_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(token_hash) {
            bail!("duplicate token");
        }
        rows.insert(
            token_hash.to_string(),
            TokenRecord {
                token_hash: token_hash.to_string(),
                user_id,
                last_active_at: now,
            },
        );
        Ok(())
    }

    fn touch_token(
        &self,
        token_hash: &str,
        active_since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(token_hash) {
            Some(row) if row.last_active_at >= active_since => {
                row.last_active_at = now;
                Ok(Some(row.user_id))
            }
            _ => Ok(None),
        }
    }

    fn delete_token(&self, token_hash: &str) -> Result<bool> {
        self.check()?;
        Ok(self.rows.lock().unwrap().remove(token_hash).is_some())
    }

    fn delete_tokens_for_user(&self, user_id: Uuid) -> Result<usize> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|_, r| r.user_id != user_id);
        Ok(before - rows.len())
    }

    fn delete_tokens_idle_before(&self, active_since: DateTime<Utc>) -> Result<usize> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|_, r| r.last_active_at >= active_since);
        Ok(before - rows.len())
    }
}

#[derive(Default)]
pub struct MemoryAttachments {
    rows: Mutex<HashMap<Uuid, (AttachmentRecord, bool)>>,
    threads: Mutex<Vec<ThreadId>>,
}

impl MemoryAttachments {
    pub fn upload(&self, filename: &str, uploaded_at: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        let record = AttachmentRecord {
            id,
            filename: filename.to_string(),
            file_type: None,
            uploaded_at,
            hoax_id: None,
        };
        self.rows.lock().unwrap().insert(id, (record, false));
        id
    }

    pub fn get(&self, id: Uuid) -> Option<AttachmentRecord> {
        self.rows.lock().unwrap().get(&id).map(|(r, _)| r.clone())
    }

    /// Threads that ran condemn, lookup and delete calls.
    pub fn threads(&self) -> Vec<ThreadId> {
        self.threads.lock().unwrap().clone()
    }

    fn record_thread(&self) {
        self.threads.lock().unwrap().push(thread::current().id());
    }
}

impl AttachmentStore for MemoryAttachments {
    fn claim_attachment(&self, attachment_id: Uuid, hoax_id: Uuid) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&attachment_id) {
            Some((record, false)) if record.hoax_id.is_none() => {
                record.hoax_id = Some(hoax_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn condemn_unclaimed(&self, uploaded_before: DateTime<Utc>) -> Result<Vec<AttachmentRecord>> {
        self.record_thread();
        let mut rows = self.rows.lock().unwrap();
        let mut condemned = Vec::new();
        for (record, doomed) in rows.values_mut() {
            if record.hoax_id.is_none() && record.uploaded_at < uploaded_before {
                *doomed = true;
            }
            if *doomed {
                condemned.push(record.clone());
            }
        }
        Ok(condemned)
    }

    fn attachments_for_hoax(&self, hoax_id: Uuid) -> Result<Vec<AttachmentRecord>> {
        self.record_thread();
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|(r, _)| r.hoax_id == Some(hoax_id))
            .map(|(r, _)| r.clone())
            .collect())
    }

    fn delete_attachment(&self, attachment_id: Uuid) -> Result<()> {
        self.record_thread();
        self.rows.lock().unwrap().remove(&attachment_id);
        Ok(())
    }
}

/// Tracks which keys exist and which deletes were attempted.
#[derive(Default)]
pub struct MemoryBlobs {
    present: Mutex<HashSet<String>>,
    deleted: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl MemoryBlobs {
    pub fn put(&self, key: &str) {
        self.present.lock().unwrap().insert(key.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.present.lock().unwrap().contains(key)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobs {
    async fn delete(&self, key: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(key.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("permission denied: {key}"));
        }
        self.present.lock().unwrap().remove(key);
        Ok(())
    }
}
