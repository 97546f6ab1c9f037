use crate::models::{
    NewProject, NewReview, NewUser, ProjectFilter, ProjectRow, ReviewRow, SubscriptionRow, UserRow,
};
use crate::{Database, is_unique_violation};
use anyhow::{Result, anyhow};
use bazaar_types::models::{PUBLIC_CODE_MAX, PUBLIC_CODE_MIN, SubscriptionStatus};
use rand::Rng;
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, Row, params};
use tracing::warn;

/// Insert attempts for a new project: the first draw plus one retry after a
/// public code collision. The code space only holds 9000 values, so this
/// budget starts failing once a few thousand projects exist.
pub const PUBLIC_CODE_ATTEMPTS: u32 = 2;

const USER_COLUMNS: &str = "u.id, u.email, u.name, u.image, u.password_hash, u.google_id, \
     u.whatsapp_number, u.is_subscribed, u.subscription_end, u.created_at";

const PROJECT_COLUMNS: &str = "p.id, p.owner_id, p.title, p.description, p.public_code, \
     p.media_url, p.category, p.place, p.price, p.created_at";

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, receipt_url, status, created_at";

const REVIEW_COLUMNS: &str =
    "id, user_id, project_id, target_user_id, rating, comment, created_at";

/// Every draw collided with an existing project's public code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no free public code after {attempts} attempts")]
pub struct PublicCodeExhausted {
    pub attempts: u32,
}

/// Uniform draw from the public code range.
pub fn random_public_code() -> i64 {
    rand::rng().random_range(PUBLIC_CODE_MIN..=PUBLIC_CODE_MAX)
}

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, user: &NewUser) -> Result<UserRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, name, image, password_hash, google_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, user.email, user.name, user.image, user.password_hash, user.google_id],
            )?;
            query_user(conn, "u.id = ?1", id)?.ok_or_else(|| anyhow!("User vanished after insert: {}", id))
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "u.id = ?1", id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "u.email = ?1", email))
    }

    pub fn get_user_by_google_id(&self, google_id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "u.google_id = ?1", google_id))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users u ORDER BY u.created_at, u.id");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Attach a Google subject id to an existing account. Returns false when
    /// no user has that id.
    pub fn link_google_id(&self, user_id: &str, google_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET google_id = ?2 WHERE id = ?1",
                params![user_id, google_id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn set_whatsapp_number(&self, user_id: &str, number: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET whatsapp_number = ?2 WHERE id = ?1",
                params![user_id, number],
            )?;
            query_user(conn, "u.id = ?1", user_id)
        })
    }

    // -- Projects --

    /// Insert a project, drawing its public code from `next_code`. A UNIQUE
    /// violation on the code triggers a fresh draw, up to
    /// [`PUBLIC_CODE_ATTEMPTS`] inserts in total; any other failure is
    /// returned as-is.
    pub fn create_project(
        &self,
        id: &str,
        project: &NewProject,
        mut next_code: impl FnMut() -> i64,
    ) -> Result<ProjectRow> {
        self.with_conn(|conn| {
            for attempt in 1..=PUBLIC_CODE_ATTEMPTS {
                let code = next_code();
                let inserted = conn.execute(
                    "INSERT INTO projects
                        (id, owner_id, title, description, public_code, media_url, category, place, price)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        id,
                        project.owner_id,
                        project.title,
                        project.description,
                        code,
                        project.media_url,
                        project.category,
                        project.place,
                        project.price,
                    ],
                );

                match inserted {
                    Ok(_) => {
                        return query_project(conn, "p.id = ?1", id)?
                            .ok_or_else(|| anyhow!("Project vanished after insert: {}", id));
                    }
                    Err(e) if is_public_code_collision(&e) => {
                        warn!("Public code {} already taken (attempt {}/{})", code, attempt, PUBLIC_CODE_ATTEMPTS);
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            Err(PublicCodeExhausted { attempts: PUBLIC_CODE_ATTEMPTS }.into())
        })
    }

    pub fn get_project_by_id(&self, id: &str) -> Result<Option<ProjectRow>> {
        self.with_conn(|conn| query_project(conn, "p.id = ?1", id))
    }

    pub fn get_project_by_code(&self, public_code: i64) -> Result<Option<ProjectRow>> {
        self.with_conn(|conn| query_project(conn, "p.public_code = ?1", public_code))
    }

    pub fn list_projects_by_owner(&self, owner_id: &str) -> Result<Vec<ProjectRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.owner_id = ?1 ORDER BY p.created_at, p.id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([owner_id], project_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Marketplace listing: only projects whose owner currently holds a
    /// subscription are visible.
    pub fn list_projects(&self, filter: &ProjectFilter) -> Result<Vec<ProjectRow>> {
        self.with_conn(|conn| {
            let mut clauses = vec!["u.is_subscribed = 1".to_string()];
            let mut values: Vec<Value> = Vec::new();

            if let Some(category) = &filter.category {
                values.push(Value::Text(category.clone()));
                clauses.push(format!("p.category = ?{} COLLATE NOCASE", values.len()));
            }
            if let Some(place) = &filter.place {
                values.push(Value::Text(place.clone()));
                clauses.push(format!("p.place = ?{} COLLATE NOCASE", values.len()));
            }
            if let Some(min) = filter.min_price {
                values.push(Value::Real(min));
                clauses.push(format!("p.price >= ?{}", values.len()));
            }
            if let Some(max) = filter.max_price {
                values.push(Value::Real(max));
                clauses.push(format!("p.price <= ?{}", values.len()));
            }

            let sql = format!(
                "SELECT {PROJECT_COLUMNS}
                 FROM projects p
                 JOIN users u ON u.id = p.owner_id
                 WHERE {}
                 ORDER BY p.created_at DESC, p.id",
                clauses.join(" AND ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(values.iter()), project_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Subscriptions --

    pub fn create_subscription(&self, id: &str, user_id: &str, receipt_url: &str) -> Result<SubscriptionRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO subscriptions (id, user_id, receipt_url, status) VALUES (?1, ?2, ?3, ?4)",
                params![id, user_id, receipt_url, SubscriptionStatus::Pending.as_str()],
            )?;
            query_subscription(conn, id)?.ok_or_else(|| anyhow!("Subscription vanished after insert: {}", id))
        })
    }

    pub fn get_subscription(&self, id: &str) -> Result<Option<SubscriptionRow>> {
        self.with_conn(|conn| query_subscription(conn, id))
    }

    pub fn list_pending_subscriptions(&self) -> Result<Vec<SubscriptionRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE status = ?1 ORDER BY created_at, id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([SubscriptionStatus::Pending.as_str()], subscription_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Mark a subscription approved and flip its owner to subscribed, in one
    /// transaction. Re-approving re-applies both writes. Returns `None` when
    /// the subscription does not exist.
    pub fn approve_subscription(&self, id: &str, subscription_end: i64) -> Result<Option<SubscriptionRow>> {
        self.with_tx(|tx| {
            let Some(sub) = query_subscription(tx, id)? else {
                return Ok(None);
            };

            tx.execute(
                "UPDATE subscriptions SET status = ?2 WHERE id = ?1",
                params![id, SubscriptionStatus::Approved.as_str()],
            )?;
            tx.execute(
                "UPDATE users SET is_subscribed = 1, subscription_end = ?2 WHERE id = ?1",
                params![sub.user_id, subscription_end],
            )?;

            query_subscription(tx, id)
        })
    }

    // -- Reviews --

    pub fn create_review(&self, id: &str, review: &NewReview) -> Result<ReviewRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reviews (id, user_id, project_id, target_user_id, rating, comment)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    review.user_id,
                    review.project_id,
                    review.target_user_id,
                    review.rating,
                    review.comment,
                ],
            )?;
            let sql = format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = ?1");
            conn.query_row(&sql, [id], review_from_row).map_err(Into::into)
        })
    }

    pub fn reviews_for_project(&self, project_id: &str) -> Result<Vec<ReviewRow>> {
        self.with_conn(|conn| query_reviews(conn, "project_id", project_id))
    }

    pub fn reviews_for_user(&self, target_user_id: &str) -> Result<Vec<ReviewRow>> {
        self.with_conn(|conn| query_reviews(conn, "target_user_id", target_user_id))
    }

    pub fn average_rating(&self, project_id: &str) -> Result<Option<f64>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT AVG(rating) FROM reviews WHERE project_id = ?1",
                [project_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
        })
    }

    // -- Follows --

    /// Toggle a follow edge: removes it if present, inserts it if not.
    /// Returns true when the follower now follows the target.
    pub fn toggle_follow(&self, follower_id: &str, following_id: &str) -> Result<bool> {
        self.with_tx(|tx| {
            let existing = tx
                .query_row(
                    "SELECT 1 FROM follows WHERE follower_id = ?1 AND following_id = ?2",
                    params![follower_id, following_id],
                    |_| Ok(()),
                )
                .optional()?;

            if existing.is_some() {
                tx.execute(
                    "DELETE FROM follows WHERE follower_id = ?1 AND following_id = ?2",
                    params![follower_id, following_id],
                )?;
                return Ok(false);
            }

            match tx.execute(
                "INSERT INTO follows (follower_id, following_id) VALUES (?1, ?2)",
                params![follower_id, following_id],
            ) {
                Ok(_) => Ok(true),
                Err(e) => {
                    // The composite key has the last word: a concurrent insert
                    // means the edge exists.
                    let err = anyhow::Error::from(e);
                    if is_unique_violation(&err) { Ok(true) } else { Err(err) }
                }
            }
        })
    }

    pub fn is_following(&self, follower_id: &str, following_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM follows WHERE follower_id = ?1 AND following_id = ?2",
                    params![follower_id, following_id],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn count_followers(&self, user_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM follows WHERE following_id = ?1", [user_id], |r| r.get(0))
                .map_err(Into::into)
        })
    }

    pub fn count_following(&self, user_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM follows WHERE follower_id = ?1", [user_id], |r| r.get(0))
                .map_err(Into::into)
        })
    }

    // -- Sessions --

    pub fn create_session(&self, token_hash: &str, user_id: &str, expires_at: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (token_hash, user_id, expires_at) VALUES (?1, ?2, ?3)",
                params![token_hash, user_id, expires_at],
            )?;
            Ok(())
        })
    }

    /// User owning a live session. Sessions expiring at or before `now` are
    /// treated as absent.
    pub fn get_session_user(&self, token_hash: &str, now: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS}
                 FROM sessions s
                 JOIN users u ON u.id = s.user_id
                 WHERE s.token_hash = ?1 AND s.expires_at > ?2"
            );
            conn.query_row(&sql, params![token_hash, now], user_from_row).optional()
        })
    }

    pub fn delete_session(&self, token_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM sessions WHERE token_hash = ?1", [token_hash])?;
            Ok(removed > 0)
        })
    }

    pub fn purge_expired_sessions(&self, now: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [now])?;
            Ok(removed)
        })
    }
}

fn is_public_code_collision(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, msg) => {
            e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                && msg.as_deref().is_none_or(|m| m.contains("public_code"))
        }
        _ => false,
    }
}

fn query_user(conn: &Connection, predicate: &str, value: impl rusqlite::ToSql) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE {predicate}");
    conn.query_row(&sql, [value], user_from_row).optional()
}

fn query_project(conn: &Connection, predicate: &str, value: impl rusqlite::ToSql) -> Result<Option<ProjectRow>> {
    let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects p WHERE {predicate}");
    conn.query_row(&sql, [value], project_from_row).optional()
}

fn query_subscription(conn: &Connection, id: &str) -> Result<Option<SubscriptionRow>> {
    let sql = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = ?1");
    conn.query_row(&sql, [id], subscription_from_row).optional()
}

fn query_reviews(conn: &Connection, column: &str, value: &str) -> Result<Vec<ReviewRow>> {
    let sql = format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE {column} = ?1 ORDER BY created_at, id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([value], review_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        image: row.get(3)?,
        password_hash: row.get(4)?,
        google_id: row.get(5)?,
        whatsapp_number: row.get(6)?,
        is_subscribed: row.get(7)?,
        subscription_end: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<ProjectRow> {
    Ok(ProjectRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        public_code: row.get(4)?,
        media_url: row.get(5)?,
        category: row.get(6)?,
        place: row.get(7)?,
        price: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn subscription_from_row(row: &Row<'_>) -> rusqlite::Result<SubscriptionRow> {
    let status: String = row.get(3)?;
    Ok(SubscriptionRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        receipt_url: row.get(2)?,
        status: status
            .parse::<SubscriptionStatus>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?,
        created_at: row.get(4)?,
    })
}

fn review_from_row(row: &Row<'_>) -> rusqlite::Result<ReviewRow> {
    Ok(ReviewRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        project_id: row.get(2)?,
        target_user_id: row.get(3)?,
        rating: row.get(4)?,
        comment: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
