//! Burn counter operations.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::{BurnRow, Database};

impl Database {
    /// Add one failure to the counter for a URL hash
    ///
    /// Creates the row on the first failure. The statement runs in its own
    /// implicit transaction, so the new count is committed when this returns.
    /// Returns the updated failure count.
    pub async fn increment_burn(&self, hash: &str) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        let failures: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO burns (hash, failures, first_failed_at, last_failed_at)
            VALUES (?, 1, ?, ?)
            ON CONFLICT(hash) DO UPDATE SET
                failures = failures + 1,
                last_failed_at = excluded.last_failed_at
            RETURNING failures
            "#,
        )
        .bind(hash)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to record burn: {}",
                e
            )))
        })?;

        Ok(failures)
    }

    /// Recorded failures for a URL hash (0 if never failed)
    pub async fn burn_failures(&self, hash: &str) -> Result<i64> {
        let failures: Option<i64> = sqlx::query_scalar("SELECT failures FROM burns WHERE hash = ?")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to read burn counter: {}",
                    e
                )))
            })?;

        Ok(failures.unwrap_or(0))
    }

    /// Full burn record for a URL hash
    pub async fn get_burn(&self, hash: &str) -> Result<Option<BurnRow>> {
        let row = sqlx::query_as::<_, BurnRow>(
            "SELECT hash, failures, first_failed_at, last_failed_at FROM burns WHERE hash = ?",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get burn: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Number of hashes with at least `threshold` failures
    pub async fn count_burned(&self, threshold: u32) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM burns WHERE failures >= ?")
            .bind(i64::from(threshold))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count burns: {}",
                    e
                )))
            })?;

        Ok(count)
    }
}
