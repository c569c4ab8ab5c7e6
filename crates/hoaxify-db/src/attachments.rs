//! SQLite-backed [`AttachmentStore`].
//!
//! Claim and condemn are both single conditional writes on the same row
//! predicate (`hoax_id IS NULL AND condemned = 0`), serialized by the
//! connection mutex, so for any row only the first of the two takes effect.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Row;
use uuid::Uuid;

use hoaxify_lifecycle::AttachmentStore;
use hoaxify_types::models::AttachmentRecord;

use crate::{Database, OptionalExt, from_millis, parse_uuid, to_millis};

const COLUMNS: &str = "id, filename, file_type, uploaded_at, hoax_id";

impl AttachmentStore for Database {
    fn claim_attachment(&self, attachment_id: Uuid, hoax_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE attachments SET hoax_id = ?2
                 WHERE id = ?1 AND hoax_id IS NULL AND condemned = 0",
                (attachment_id.to_string(), hoax_id.to_string()),
            )?;
            Ok(changed > 0)
        })
    }

    fn condemn_unclaimed(&self, uploaded_before: DateTime<Utc>) -> Result<Vec<AttachmentRecord>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE attachments SET condemned = 1
                 WHERE hoax_id IS NULL AND condemned = 0 AND uploaded_at < ?1",
                [to_millis(uploaded_before)],
            )?;

            let condemned = {
                let sql = format!("SELECT {COLUMNS} FROM attachments WHERE condemned = 1");
                let mut stmt = tx.prepare(&sql)?;
                stmt.query_map([], attachment_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            };

            tx.commit()?;
            Ok(condemned)
        })
    }

    fn attachments_for_hoax(&self, hoax_id: Uuid) -> Result<Vec<AttachmentRecord>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {COLUMNS} FROM attachments WHERE hoax_id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([hoax_id.to_string()], attachment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn delete_attachment(&self, attachment_id: Uuid) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM attachments WHERE id = ?1", [attachment_id.to_string()])?;
            Ok(())
        })
    }
}

impl Database {
    pub fn insert_attachment(&self, record: &AttachmentRecord) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO attachments (id, filename, file_type, uploaded_at, hoax_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    record.id.to_string(),
                    record.filename,
                    record.file_type,
                    to_millis(record.uploaded_at),
                    record.hoax_id.map(|id| id.to_string()),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_attachment(&self, id: Uuid) -> Result<Option<AttachmentRecord>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {COLUMNS} FROM attachments WHERE id = ?1");
            conn.query_row(&sql, [id.to_string()], attachment_from_row)
                .optional()
        })
    }
}

fn attachment_from_row(row: &Row<'_>) -> rusqlite::Result<AttachmentRecord> {
    let hoax_id: Option<String> = row.get(4)?;
    Ok(AttachmentRecord {
        id: parse_uuid(0, row.get(0)?)?,
        filename: row.get(1)?,
        file_type: row.get(2)?,
        uploaded_at: from_millis(row.get(3)?)?,
        hoax_id: hoax_id.map(|raw| parse_uuid(4, raw)).transpose()?,
    })
}
