use crate::models::{HoaxListingRow, HoaxRow, NewUser, UserRow, UserSummaryRow};
use crate::{Database, OptionalExt, from_millis, parse_uuid, to_millis};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, email, password, inactive, activation_token, \
                            password_reset_token, image, created_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser<'_>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password, inactive, activation_token, created_at)
                 VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)",
                rusqlite::params![
                    user.id.to_string(),
                    user.username,
                    user.email,
                    user.password_hash,
                    user.activation_token,
                    to_millis(user.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", &id.to_string()))
    }

    pub fn get_user_by_reset_token(&self, token: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "password_reset_token", token))
    }

    /// Activates the account holding `token`. Returns false if no account
    /// does.
    pub fn activate_user(&self, token: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET inactive = 0, activation_token = NULL WHERE activation_token = ?1",
                [token],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn set_password_reset_token(&self, id: Uuid, token: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET password_reset_token = ?2 WHERE id = ?1",
                (id.to_string(), token),
            )?;
            Ok(())
        })
    }

    /// Consumes `reset_token`: stores the new hash and also activates the
    /// account, since reading the reset mail proves the address.
    /// Returns the user id, or `None` if the token is unknown.
    pub fn reset_password(&self, reset_token: &str, password_hash: &str) -> Result<Option<Uuid>> {
        self.with_conn(|conn| {
            conn.query_row(
                "UPDATE users
                 SET password = ?2, password_reset_token = NULL,
                     inactive = 0, activation_token = NULL
                 WHERE password_reset_token = ?1
                 RETURNING id",
                (reset_token, password_hash),
                |row| parse_uuid(0, row.get(0)?),
            )
            .optional()
        })
    }

    /// Deletes the user and, by cascade, their hoaxes. Attachments and
    /// sessions are released by the caller first.
    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM users WHERE id = ?1", [id.to_string()])?;
            Ok(changed > 0)
        })
    }

    /// Active users ordered by username, optionally leaving one out (the
    /// caller).
    pub fn list_active_users(&self, exclude: Option<Uuid>, limit: u32, offset: u64) -> Result<Vec<UserSummaryRow>> {
        self.with_conn(|conn| {
            let exclude = exclude.map(|id| id.to_string());
            let mut stmt = conn.prepare(
                "SELECT id, username, email, image FROM users
                 WHERE inactive = 0 AND (?1 IS NULL OR id != ?1)
                 ORDER BY username, rowid
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![exclude, limit, offset as i64], |row| {
                    Ok(UserSummaryRow {
                        id: parse_uuid(0, row.get(0)?)?,
                        username: row.get(1)?,
                        email: row.get(2)?,
                        image: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_active_users(&self, exclude: Option<Uuid>) -> Result<u64> {
        self.with_conn(|conn| {
            let exclude = exclude.map(|id| id.to_string());
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE inactive = 0 AND (?1 IS NULL OR id != ?1)",
                [exclude],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    /// Sets the username and, when given, the profile image filename.
    /// Returns false if the user does not exist.
    pub fn update_user(&self, id: Uuid, username: &str, image: Option<&str>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET username = ?2, image = COALESCE(?3, image) WHERE id = ?1",
                (id.to_string(), username, image),
            )?;
            Ok(changed > 0)
        })
    }

    // -- Hoaxes --

    pub fn insert_hoax(&self, id: Uuid, user_id: Uuid, content: &str, created_at: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO hoaxes (id, user_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id.to_string(), user_id.to_string(), content, to_millis(created_at)],
            )?;
            Ok(())
        })
    }

    pub fn get_hoax(&self, id: Uuid) -> Result<Option<HoaxRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, content, created_at FROM hoaxes WHERE id = ?1",
                [id.to_string()],
                |row| {
                    Ok(HoaxRow {
                        id: parse_uuid(0, row.get(0)?)?,
                        user_id: parse_uuid(1, row.get(1)?)?,
                        content: row.get(2)?,
                        created_at: from_millis(row.get(3)?)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn hoax_ids_for_user(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM hoaxes WHERE user_id = ?1")?;
            let ids = stmt
                .query_map([user_id.to_string()], |row| parse_uuid(0, row.get(0)?))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    pub fn delete_hoax(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM hoaxes WHERE id = ?1", [id.to_string()])?;
            Ok(changed > 0)
        })
    }

    /// Newest first. `author` narrows the listing to one user.
    pub fn list_hoaxes(&self, author: Option<Uuid>, limit: u32, offset: u64) -> Result<Vec<HoaxListingRow>> {
        self.with_conn(|conn| {
            let author = author.map(|id| id.to_string());
            let mut stmt = conn.prepare(
                "SELECT h.id, h.content, h.created_at, u.id, u.username, u.email, u.image,
                        a.filename, a.file_type
                 FROM hoaxes h
                 JOIN users u ON h.user_id = u.id
                 LEFT JOIN attachments a ON a.hoax_id = h.id
                 WHERE ?1 IS NULL OR h.user_id = ?1
                 ORDER BY h.created_at DESC, h.rowid DESC
                 LIMIT ?2 OFFSET ?3",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![author, limit, offset as i64], |row| {
                    Ok(HoaxListingRow {
                        id: parse_uuid(0, row.get(0)?)?,
                        content: row.get(1)?,
                        created_at: from_millis(row.get(2)?)?,
                        user_id: parse_uuid(3, row.get(3)?)?,
                        username: row.get(4)?,
                        email: row.get(5)?,
                        image: row.get(6)?,
                        attachment_filename: row.get(7)?,
                        attachment_file_type: row.get(8)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn count_hoaxes(&self, author: Option<Uuid>) -> Result<u64> {
        self.with_conn(|conn| {
            let author = author.map(|id| id.to_string());
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM hoaxes WHERE ?1 IS NULL OR user_id = ?1",
                [author],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_row([value], user_from_row).optional()
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: parse_uuid(0, row.get(0)?)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        inactive: row.get(4)?,
        activation_token: row.get(5)?,
        password_reset_token: row.get(6)?,
        image: row.get(7)?,
        created_at: from_millis(row.get(8)?)?,
    })
}
