//! SQLite database operations
//!
//! All database access goes through this module.
//! Multi-statement writes run inside a transaction and roll back on error.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;

use super::models::*;
use crate::error::AppError;
use crate::metrics::record_db_query;

const POST_COLUMNS: &str = "p.id, p.body, p.timestamp, p.user_id, u.username AS author";

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        // sqlx enables foreign_keys on every pooled connection by default.
        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a new user
    ///
    /// A single statement, so concurrent registrations queue on SQLite's
    /// write lock instead of failing with `SQLITE_BUSY`. A duplicate username
    /// or e-mail surfaces as a unique violation, which maps to `Conflict`.
    pub async fn insert_user(&self, user: &NewUser, now: DateTime<Utc>) -> Result<User, AppError> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, about_me, last_seen, created_at)
            VALUES (?, ?, ?, NULL, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        record_db_query("INSERT", "users");

        Ok(created)
    }

    /// Get a user by ID
    pub async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        record_db_query("SELECT", "users");

        Ok(user)
    }

    /// Get a user by exact (case-sensitive) username
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        record_db_query("SELECT", "users");

        Ok(user)
    }

    /// Get a user by exact (case-sensitive) email
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        record_db_query("SELECT", "users");

        Ok(user)
    }

    /// Count registered users.
    pub async fn count_users(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Update username and bio together.
    ///
    /// A username already held by someone else is a unique violation and
    /// comes back as `Conflict`.
    ///
    /// # Returns
    /// The updated row, or `None` if no user has this ID.
    pub async fn update_user_profile(
        &self,
        user_id: i64,
        username: &str,
        about_me: Option<&str>,
    ) -> Result<Option<User>, AppError> {
        let updated = sqlx::query_as::<_, User>(
            "UPDATE users SET username = ?, about_me = ? WHERE id = ? RETURNING *",
        )
        .bind(username)
        .bind(about_me)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        record_db_query("UPDATE", "users");

        Ok(updated)
    }

    /// Replace a user's password hash and revoke all of their sessions.
    ///
    /// # Returns
    /// `true` if the user exists.
    pub async fn update_password_hash(
        &self,
        user_id: i64,
        password_hash: &str,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        record_db_query("UPDATE", "users");

        Ok(result.rows_affected() == 1)
    }

    /// Record that the user was active at `at`.
    pub async fn touch_last_seen(&self, user_id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_seen = ? WHERE id = ?")
            .bind(at)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        record_db_query("UPDATE", "users");

        Ok(())
    }

    // =========================================================================
    // Posts
    // =========================================================================

    /// Insert a post and return it with its author joined in.
    pub async fn insert_post(
        &self,
        user_id: i64,
        body: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Post, AppError> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO posts (body, timestamp, user_id) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(body)
        .bind(timestamp)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let post = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts p JOIN users u ON u.id = p.user_id WHERE p.id = ?"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        record_db_query("INSERT", "posts");

        Ok(post)
    }

    /// Posts by `user_id` or by anyone `user_id` follows, newest first.
    ///
    /// Filters on the author id set instead of joining through `followers`,
    /// so each post appears at most once.
    pub async fn get_followed_posts(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, AppError> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts p
            JOIN users u ON u.id = p.user_id
            WHERE p.user_id = ?
               OR p.user_id IN (SELECT followed_id FROM followers WHERE follower_id = ?)
            ORDER BY p.timestamp DESC, p.id DESC
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(user_id)
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        record_db_query("SELECT", "posts");

        Ok(posts)
    }

    /// Posts authored by `user_id`, newest first.
    pub async fn get_user_posts(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, AppError> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts p
            JOIN users u ON u.id = p.user_id
            WHERE p.user_id = ?
            ORDER BY p.timestamp DESC, p.id DESC
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        record_db_query("SELECT", "posts");

        Ok(posts)
    }

    /// All posts, newest first.
    pub async fn get_all_posts(&self, limit: i64, offset: i64) -> Result<Vec<Post>, AppError> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts p
            JOIN users u ON u.id = p.user_id
            ORDER BY p.timestamp DESC, p.id DESC
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        record_db_query("SELECT", "posts");

        Ok(posts)
    }

    // =========================================================================
    // Follow edges
    // =========================================================================

    /// Insert follow edge
    ///
    /// # Returns
    /// `true` if a new edge was created, `false` if it already existed.
    pub async fn insert_follow(
        &self,
        follower_id: i64,
        followed_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO followers (follower_id, followed_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(follower_id)
        .bind(followed_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        record_db_query("INSERT", "followers");

        Ok(result.rows_affected() > 0)
    }

    /// Delete follow edge
    ///
    /// # Returns
    /// `true` if an edge was removed.
    pub async fn delete_follow(&self, follower_id: i64, followed_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM followers WHERE follower_id = ? AND followed_id = ?")
            .bind(follower_id)
            .bind(followed_id)
            .execute(&self.pool)
            .await?;
        record_db_query("DELETE", "followers");

        Ok(result.rows_affected() > 0)
    }

    /// Check whether the edge `follower_id -> followed_id` exists
    pub async fn is_following(&self, follower_id: i64, followed_id: i64) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM followers WHERE follower_id = ? AND followed_id = ?)",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_one(&self.pool)
        .await?;
        record_db_query("SELECT", "followers");

        Ok(exists != 0)
    }

    /// Count users following `user_id`.
    pub async fn count_followers(&self, user_id: i64) -> Result<i64, AppError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM followers WHERE followed_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        record_db_query("SELECT", "followers");
        Ok(count)
    }

    /// Count users `user_id` follows.
    pub async fn count_following(&self, user_id: i64) -> Result<i64, AppError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM followers WHERE follower_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        record_db_query("SELECT", "followers");
        Ok(count)
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Insert a session record, pruning that user's expired sessions first.
    pub async fn insert_session(&self, session: &SessionRecord) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM sessions WHERE user_id = ? AND expires_at <= ?")
            .bind(session.user_id)
            .bind(session.created_at)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, remember, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(session.user_id)
        .bind(session.remember)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        record_db_query("INSERT", "sessions");

        Ok(())
    }

    /// Get a session record by ID
    pub async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>, AppError> {
        let session = sqlx::query_as::<_, SessionRecord>("SELECT * FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        record_db_query("SELECT", "sessions");

        Ok(session)
    }

    /// Delete a session record
    ///
    /// # Returns
    /// `true` if a session was removed.
    pub async fn delete_session(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        record_db_query("DELETE", "sessions");

        Ok(result.rows_affected() > 0)
    }

    /// Count live sessions for a user.
    pub async fn count_sessions(&self, user_id: i64) -> Result<i64, AppError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sessions WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
