pub mod migrations;
pub mod models;
pub mod queries;

use anyhow::Result;
use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

pub use queries::{PUBLIC_CODE_ATTEMPTS, PublicCodeExhausted, random_public_code};

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Private in-memory database, used by tests and throwaway instances.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&mut conn)
    }

    /// Run `f` inside a transaction. Commits when `f` returns `Ok`; any error
    /// drops the transaction, which rolls it back.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let out = f(&tx)?;
            tx.commit()?;
            Ok(out)
        })
    }
}

/// True when the error (or anything in its source chain) is a SQLite
/// UNIQUE or PRIMARY KEY constraint violation.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use bazaar_types::models::SubscriptionStatus;
    use rusqlite::params;

    fn db_with_users(ids: &[&str]) -> Database {
        let db = Database::open_in_memory().unwrap();
        for id in ids {
            db.create_user(
                id,
                &NewUser {
                    email: format!("{id}@x.com"),
                    ..Default::default()
                },
            )
            .unwrap();
        }
        db
    }

    #[test]
    fn failed_transaction_discards_its_writes() {
        let db = db_with_users(&["a", "b"]);

        let result: Result<()> = db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO follows (follower_id, following_id) VALUES (?1, ?2)",
                params!["a", "b"],
            )?;
            Err(anyhow::anyhow!("abort after insert"))
        });

        assert!(result.is_err());
        assert!(!db.is_following("a", "b").unwrap());
        assert_eq!(db.count_followers("b").unwrap(), 0);
    }

    #[test]
    fn failing_second_statement_rolls_back_the_first() {
        let db = db_with_users(&["a"]);
        db.create_subscription("s1", "a", "https://receipts.example/1").unwrap();

        let result: Result<()> = db.with_tx(|tx| {
            tx.execute("UPDATE subscriptions SET status = 'Approved' WHERE id = ?1", ["s1"])?;
            tx.execute("UPDATE users SET no_such_column = 1 WHERE id = ?1", ["a"])?;
            Ok(())
        });

        assert!(result.is_err());
        let sub = db.get_subscription("s1").unwrap().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Pending);
        assert!(!db.get_user_by_id("a").unwrap().unwrap().is_subscribed);
    }

    #[test]
    fn successful_transaction_commits() {
        let db = db_with_users(&["a", "b"]);
        db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO follows (follower_id, following_id) VALUES (?1, ?2)",
                params!["a", "b"],
            )?;
            Ok(())
        })
        .unwrap();
        assert!(db.is_following("a", "b").unwrap());
    }
}
