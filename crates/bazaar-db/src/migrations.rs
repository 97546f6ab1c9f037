use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                  TEXT PRIMARY KEY,
                email               TEXT NOT NULL UNIQUE,
                name                TEXT,
                image               TEXT,
                password_hash       TEXT,
                google_id           TEXT UNIQUE,
                whatsapp_number     TEXT,
                is_subscribed       INTEGER NOT NULL DEFAULT 0,
                subscription_end    INTEGER,
                created_at          TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE projects (
                id              TEXT PRIMARY KEY,
                owner_id        TEXT NOT NULL REFERENCES users(id),
                title           TEXT NOT NULL,
                description     TEXT,
                public_code     INTEGER NOT NULL UNIQUE,
                media_url       TEXT,
                category        TEXT,
                place           TEXT,
                price           REAL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_projects_owner ON projects(owner_id);

            CREATE TABLE subscriptions (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id),
                receipt_url     TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'Pending'
                                CHECK (status IN ('Pending', 'Approved')),
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_subscriptions_status ON subscriptions(status);

            CREATE TABLE reviews (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id),
                project_id      TEXT REFERENCES projects(id),
                target_user_id  TEXT REFERENCES users(id),
                rating          INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                comment         TEXT,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_reviews_project ON reviews(project_id);
            CREATE INDEX idx_reviews_target_user ON reviews(target_user_id);

            CREATE TABLE follows (
                follower_id     TEXT NOT NULL REFERENCES users(id),
                following_id    TEXT NOT NULL REFERENCES users(id),
                PRIMARY KEY (follower_id, following_id)
            );

            CREATE INDEX idx_follows_following ON follows(following_id);

            CREATE TABLE sessions (
                token_hash      TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id),
                expires_at      INTEGER NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
