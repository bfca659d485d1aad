//! SQLite database operations
//!
//! All database access goes through this module.
//! Uses SQLx with embedded migrations.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;

use super::models::*;
use crate::error::AppError;

/// Column named in a UNIQUE constraint failure, e.g. `username` for
/// "UNIQUE constraint failed: users.username".
pub fn unique_violation_column(error: &sqlx::Error) -> Option<String> {
    let sqlx::Error::Database(db_error) = error else {
        return None;
    };
    if !db_error.is_unique_violation() {
        return None;
    }

    let message = db_error.message();
    let column = message
        .rsplit(':')
        .next()?
        .split(',')
        .next()?
        .trim()
        .rsplit('.')
        .next()?;
    Some(column.to_string())
}

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
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

    /// Get user by ID
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Get user by username (exact match)
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool, AppError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM users WHERE username = ? LIMIT 1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool, AppError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM users WHERE email = ? COLLATE NOCASE LIMIT 1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.is_some())
    }

    /// Insert a user together with their empty profile.
    ///
    /// Both rows are written in one transaction. A taken username or email
    /// surfaces as a unique violation, see [`unique_violation_column`].
    pub async fn insert_user_with_profile(
        &self,
        user: &User,
        profile: &Profile,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, email, first_name, last_name, password_hash, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(db_timestamp(&user.created_at))
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO profiles (
                id, user_id, website, biography, phone_number, picture,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&profile.id)
        .bind(&profile.user_id)
        .bind(&profile.website)
        .bind(&profile.biography)
        .bind(&profile.phone_number)
        .bind(&profile.picture)
        .bind(db_timestamp(&profile.created_at))
        .bind(db_timestamp(&profile.updated_at))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn count_users(&self) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    /// Get the profile belonging to a user
    pub async fn get_profile_by_user(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(profile)
    }

    /// Write editable profile fields back
    ///
    /// The update is keyed on both the profile ID and its owner, so a
    /// profile can only be written through its own user.
    ///
    /// # Returns
    /// `true` if a row was updated
    pub async fn update_profile(&self, profile: &Profile) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET website = ?, biography = ?, phone_number = ?, picture = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(&profile.website)
        .bind(&profile.biography)
        .bind(&profile.phone_number)
        .bind(&profile.picture)
        .bind(db_timestamp(&profile.updated_at))
        .bind(&profile.id)
        .bind(&profile.user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Posts
    // =========================================================================

    /// Insert a new post
    pub async fn insert_post(&self, post: &Post) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, user_id, profile_id, title, photo, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.user_id)
        .bind(&post.profile_id)
        .bind(&post.title)
        .bind(&post.photo)
        .bind(db_timestamp(&post.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get post by ID, with author details
    pub async fn get_post_entry(&self, id: &str) -> Result<Option<FeedEntry>, AppError> {
        let entry = sqlx::query_as::<_, FeedEntry>(
            r#"
            SELECT p.id, p.user_id, p.title, p.photo, p.created_at,
                   u.username, u.first_name, u.last_name, pr.picture
            FROM posts p
            JOIN users u ON u.id = p.user_id
            LEFT JOIN profiles pr ON pr.user_id = p.user_id
            WHERE p.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    pub async fn count_posts(&self) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Get one page of the feed, newest first
    ///
    /// # Arguments
    /// * `limit` - Page size
    /// * `offset` - Number of newer posts to skip
    pub async fn get_feed_page(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<FeedEntry>, AppError> {
        let entries = sqlx::query_as::<_, FeedEntry>(
            r#"
            SELECT p.id, p.user_id, p.title, p.photo, p.created_at,
                   u.username, u.first_name, u.last_name, pr.picture
            FROM posts p
            JOIN users u ON u.id = p.user_id
            LEFT JOIN profiles pr ON pr.user_id = p.user_id
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Get all posts of one user, newest first
    pub async fn get_posts_by_user(&self, user_id: &str) -> Result<Vec<Post>, AppError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT * FROM posts
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    pub async fn insert_session(&self, session: &SessionRecord) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(db_timestamp(&session.created_at))
        .bind(db_timestamp(&session.expires_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a session that has not expired yet
    pub async fn get_active_session(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, AppError> {
        let session = sqlx::query_as::<_, SessionRecord>(
            "SELECT * FROM sessions WHERE id = ? AND expires_at > ?",
        )
        .bind(id)
        .bind(db_timestamp(&now))
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    pub async fn delete_session(&self, id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Remove sessions that expired before `now`
    ///
    /// # Returns
    /// Number of rows removed
    pub async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(db_timestamp(&now))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
