//! Runtime state tracking: shutdown detection.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::Database;

impl Database {
    /// Check if the last shutdown was unclean
    ///
    /// Returns true if the previous session did not call set_clean_shutdown(),
    /// indicating a crash or forced termination.
    pub async fn was_unclean_shutdown(&self) -> Result<bool> {
        let value: Option<String> = sqlx::query_scalar(
            r#"
            SELECT value FROM runtime_state WHERE key = 'clean_shutdown'
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to check shutdown state: {}",
                e
            )))
        })?;

        Ok(value.is_none_or(|v| v != "true"))
    }

    /// Mark that the application has started
    ///
    /// Called from MediaDownloader::new(). If shutdown() is not called before the next
    /// startup, was_unclean_shutdown() will return true.
    pub async fn set_clean_start(&self) -> Result<()> {
        self.set_shutdown_flag("false").await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to set clean start: {}",
                e
            )))
        })
    }

    /// Mark that the application is shutting down cleanly
    pub async fn set_clean_shutdown(&self) -> Result<()> {
        self.set_shutdown_flag("true").await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to set clean shutdown: {}",
                e
            )))
        })
    }

    async fn set_shutdown_flag(&self, value: &str) -> std::result::Result<(), sqlx::Error> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO runtime_state (key, value, updated_at)
            VALUES ('clean_shutdown', ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
