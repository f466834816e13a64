//! SQLite database operations
//!
//! All database access goes through this module.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Duration;

use super::models::User;
use crate::error::AppError;

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database connection pool wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Storage(sqlx::Error::Io(e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new().connect_with(options).await?;

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

    /// Close all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Map a provider identity to a local user id, creating the user on
    /// first sight.
    ///
    /// The insert is a no-op when `external_id` already exists, in which case
    /// the existing id is read back. Two concurrent first logins for the same
    /// identity both end up with the id of whichever insert won; the UNIQUE
    /// constraint on `external_id` is what keeps that consistent.
    ///
    /// Doing this as insert-then-select rather than a single upsert keeps
    /// lookups of known users from taking the write lock.
    pub async fn ensure_user(&self, external_id: &str) -> Result<i64, AppError> {
        let inserted = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (external_id)
            VALUES (?)
            ON CONFLICT(external_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(id) = inserted {
            crate::metrics::USERS_CREATED_TOTAL.inc();
            tracing::info!(user_id = id, external_id, "Created user");
            return Ok(id);
        }

        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE external_id = ?")
            .bind(external_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(id)
    }

    /// Get user by local id
    pub async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT id, external_id FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Get user by provider id
    pub async fn get_user_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<User>, AppError> {
        let user =
            sqlx::query_as::<_, User>("SELECT id, external_id FROM users WHERE external_id = ?")
                .bind(external_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(user)
    }

    /// Number of users
    pub async fn count_users(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
