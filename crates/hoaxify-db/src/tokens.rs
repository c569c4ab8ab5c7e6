//! SQLite-backed [`TokenStore`]. Every method is a single statement keyed on
//! an index, so the request path costs one primary-key lookup.

use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use hoaxify_lifecycle::TokenStore;
use hoaxify_types::models::TokenRecord;

use crate::{Database, OptionalExt, from_millis, parse_uuid, to_millis};

impl TokenStore for Database {
    fn insert_token(&self, token_hash: &str, user_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tokens (token_hash, user_id, last_active_at) VALUES (?1, ?2, ?3)",
                (token_hash, user_id.to_string(), to_millis(now)),
            )?;
            Ok(())
        })
    }

    fn touch_token(
        &self,
        token_hash: &str,
        active_since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>> {
        self.with_conn(|conn| {
            conn.query_row(
                "UPDATE tokens SET last_active_at = ?3
                 WHERE token_hash = ?1 AND last_active_at >= ?2
                 RETURNING user_id",
                (token_hash, to_millis(active_since), to_millis(now)),
                |row| parse_uuid(0, row.get(0)?),
            )
            .optional()
        })
    }

    fn delete_token(&self, token_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM tokens WHERE token_hash = ?1", [token_hash])?;
            Ok(changed > 0)
        })
    }

    fn delete_tokens_for_user(&self, user_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM tokens WHERE user_id = ?1", [user_id.to_string()])?)
        })
    }

    fn delete_tokens_idle_before(&self, active_since: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM tokens WHERE last_active_at < ?1",
                [to_millis(active_since)],
            )?)
        })
    }
}

impl Database {
    /// Raw row lookup, including rows that are expired but not yet swept.
    /// Not used for authentication.
    pub fn get_token(&self, token_hash: &str) -> Result<Option<TokenRecord>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT token_hash, user_id, last_active_at FROM tokens WHERE token_hash = ?1",
                [token_hash],
                |row| {
                    Ok(TokenRecord {
                        token_hash: row.get(0)?,
                        user_id: parse_uuid(1, row.get(1)?)?,
                        last_active_at: from_millis(row.get(2)?)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn count_tokens_for_user(&self, user_id: Uuid) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM tokens WHERE user_id = ?1",
                [user_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }
}
