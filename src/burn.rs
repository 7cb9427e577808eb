//! Permanent skip list for image URLs that keep failing
//!
//! A URL is burned when its SHA-1 digest is on the static list compiled into
//! the binary, or when the burn database has recorded at least `threshold`
//! failures for it. Bookkeeping is best effort: a database that cannot be
//! opened, read or written is logged and treated as "no burn", it never stops
//! a run.

use crate::config::BurnConfig;
use crate::db::Database;
use crate::types::BurnRecord;
use crate::utils::{is_sha1_hex, sha1_hex};
use std::collections::HashSet;

const STATIC_BURNS: &str = include_str!("static_burns.txt");

/// Parse a burn list: one digest per line, `#` comments and blanks ignored
pub fn parse_burn_list(text: &str) -> HashSet<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter(|l| {
            let ok = is_sha1_hex(l);
            if !ok {
                tracing::warn!(entry = %l, "ignoring malformed static burn entry");
            }
            ok
        })
        .map(str::to_ascii_lowercase)
        .collect()
}

/// Burn lookups and failure recording
pub struct BurnStore {
    db: Option<Database>,
    static_burns: HashSet<String>,
    threshold: u32,
}

impl BurnStore {
    /// Open the burn database named in the configuration
    ///
    /// If the database cannot be opened the store still works from the static
    /// list alone and every `record_failure` reports `NotRecorded`.
    pub async fn open(config: &BurnConfig) -> Self {
        let db = match Database::new(&config.database_path).await {
            Ok(db) => Some(db),
            Err(e) => {
                tracing::warn!(
                    path = %config.database_path.display(),
                    error = %e,
                    "burn database unavailable, failures will not be remembered"
                );
                None
            }
        };
        Self::new(db, config.threshold)
    }

    /// Build a store over an already opened database
    pub fn new(db: Option<Database>, threshold: u32) -> Self {
        Self {
            db,
            static_burns: parse_burn_list(STATIC_BURNS),
            threshold: threshold.max(1),
        }
    }

    /// Replace the shipped static list
    pub fn with_static_burns(mut self, burns: HashSet<String>) -> Self {
        self.static_burns = burns;
        self
    }

    /// Number of entries on the static list
    pub fn static_len(&self) -> usize {
        self.static_burns.len()
    }

    /// URLs burned through the database (static list excluded)
    pub async fn recorded_burns(&self) -> i64 {
        let Some(db) = &self.db else {
            return 0;
        };
        db.count_burned(self.threshold).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "cannot count burns");
            0
        })
    }

    /// Whether a URL should be skipped for good
    pub async fn is_burned(&self, url: &str) -> bool {
        let hash = sha1_hex(url);
        if self.static_burns.contains(&hash) {
            return true;
        }

        let Some(db) = &self.db else {
            return false;
        };

        match db.burn_failures(&hash).await {
            Ok(failures) => failures >= i64::from(self.threshold),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "cannot read burn counter");
                false
            }
        }
    }

    /// Count one more failure for a URL
    ///
    /// Returns once the new count is durable, or with `NotRecorded` if it could
    /// not be written.
    pub async fn record_failure(&self, url: &str) -> BurnRecord {
        let hash = sha1_hex(url);

        let Some(db) = &self.db else {
            return BurnRecord::NotRecorded {
                reason: "burn database unavailable".into(),
            };
        };

        match db.increment_burn(&hash).await {
            Ok(failures) => {
                tracing::debug!(url = %url, hash = %hash, failures, "burn recorded");
                BurnRecord::Recorded {
                    failures: u32::try_from(failures).unwrap_or(u32::MAX),
                }
            }
            Err(e) => {
                tracing::warn!(url = %url, hash = %hash, error = %e, "cannot record burn");
                BurnRecord::NotRecorded {
                    reason: e.to_string(),
                }
            }
        }
    }
}
