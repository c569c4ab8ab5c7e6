use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("DB: running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                    TEXT PRIMARY KEY,
                username              TEXT NOT NULL,
                email                 TEXT NOT NULL UNIQUE,
                password              TEXT NOT NULL,
                inactive              INTEGER NOT NULL DEFAULT 1,
                activation_token      TEXT,
                password_reset_token  TEXT,
                created_at            INTEGER NOT NULL
            );

            CREATE INDEX idx_users_activation ON users(activation_token);
            CREATE INDEX idx_users_reset ON users(password_reset_token);

            -- user_id is a plain reference: sessions are revoked explicitly
            -- before an account goes away, never by cascade.
            CREATE TABLE tokens (
                token_hash      TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL,
                last_active_at  INTEGER NOT NULL
            );

            CREATE INDEX idx_tokens_user ON tokens(user_id);
            CREATE INDEX idx_tokens_last_active ON tokens(last_active_at);

            CREATE TABLE hoaxes (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                content     TEXT NOT NULL,
                created_at  INTEGER NOT NULL
            );

            CREATE INDEX idx_hoaxes_user ON hoaxes(user_id, created_at);
            CREATE INDEX idx_hoaxes_created ON hoaxes(created_at);

            -- condemned = 1 once the reaper has decided to delete the row;
            -- such rows can never be claimed again.
            CREATE TABLE attachments (
                id           TEXT PRIMARY KEY,
                filename     TEXT NOT NULL UNIQUE,
                file_type    TEXT,
                uploaded_at  INTEGER NOT NULL,
                hoax_id      TEXT,
                condemned    INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX idx_attachments_unclaimed
                ON attachments(uploaded_at) WHERE hoax_id IS NULL;
            CREATE INDEX idx_attachments_hoax ON attachments(hoax_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("DB: running migration v2 (profile images)");
        conn.execute_batch(
            "
            ALTER TABLE users ADD COLUMN image TEXT;
            CREATE INDEX idx_users_active ON users(inactive, username);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
