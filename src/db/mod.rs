//! Database layer for blog-image-archiver
//!
//! Handles SQLite persistence for the burn counters that survive across runs.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`]: database lifecycle and schema migrations
//! - [`burns`]: per-URL failure counters

use sqlx::{FromRow, sqlite::SqlitePool};

mod burns;
mod migrations;

/// Burn counter record from database
#[derive(Debug, Clone, FromRow)]
pub struct BurnRow {
    /// SHA-1 hex digest of the image URL
    pub hash: String,
    /// Number of recorded failures
    pub failures: i64,
    /// Unix timestamp of the first recorded failure
    pub first_failed_at: i64,
    /// Unix timestamp of the most recent recorded failure
    pub last_failed_at: i64,
}

/// Database handle for blog-image-archiver
pub struct Database {
    pool: SqlitePool,
}
