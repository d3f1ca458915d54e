//! SQLite database operations
//!
//! All database access goes through this module.
//! Uses SQLx with runtime-checked queries.

use std::path::Path;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use super::models::*;
use crate::error::AppError;

const SESSION_TOKEN_HASH_PREFIX: &str = "sha256:";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_CONNECTIONS: u32 = 8;

/// Hash a raw session token for storage and lookup
pub(crate) fn hash_session_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!(
        "{}{}",
        SESSION_TOKEN_HASH_PREFIX,
        URL_SAFE_NO_PAD.encode(digest)
    )
}

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
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
            }
        }

        // WAL plus a busy timeout lets concurrent first logins queue up on the
        // write lock instead of failing with SQLITE_BUSY.
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        // Run migrations
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
    // Identities
    // =========================================================================

    /// Find the identity holding `external_id` for `provider`
    pub async fn find_identity_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Identity>, AppError> {
        let query = format!(
            "SELECT * FROM identities WHERE {} = ? LIMIT 1",
            provider.id_column()
        );
        let identity = sqlx::query_as::<_, Identity>(&query)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(identity)
    }

    /// Get identity by ID
    pub async fn get_identity(&self, id: &str) -> Result<Option<Identity>, AppError> {
        let identity = sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(identity)
    }

    /// Insert an identity unless one with the same provider id already exists.
    ///
    /// The UNIQUE constraints on the provider id columns make this atomic:
    /// of several concurrent inserts for the same external id exactly one
    /// succeeds.
    ///
    /// # Returns
    /// `true` if inserted, `false` if the external id was already taken.
    pub async fn insert_identity_if_absent(&self, identity: &Identity) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO identities (
                id, display_name, google_id, twitter_id, github_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&identity.id)
        .bind(&identity.display_name)
        .bind(&identity.google_id)
        .bind(&identity.twitter_id)
        .bind(&identity.github_id)
        .bind(identity.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(db_error)) if db_error.is_unique_violation() => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    /// Count identities (diagnostics and tests)
    pub async fn count_identities(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM identities")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Store a session row
    ///
    /// `record.token_hash` must come from [`hash_session_token`].
    pub async fn insert_session(&self, record: &SessionRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (token_hash, identity_id, created_at, expires_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&record.token_hash)
        .bind(&record.identity_id)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Look up a session by raw token
    ///
    /// Expired rows are returned as-is; callers decide what expiry means.
    pub async fn get_session(&self, token: &str) -> Result<Option<SessionRecord>, AppError> {
        let record =
            sqlx::query_as::<_, SessionRecord>("SELECT * FROM sessions WHERE token_hash = ?")
                .bind(hash_session_token(token))
                .fetch_optional(&self.pool)
                .await?;

        Ok(record)
    }

    /// Delete a session by raw token
    ///
    /// # Returns
    /// `true` if a row was removed
    pub async fn delete_session(&self, token: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(hash_session_token(token))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every session whose expiry has passed
    pub async fn delete_expired_sessions(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
