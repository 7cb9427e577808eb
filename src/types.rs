//! Core types for blog-image-archiver

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A published post from the blog export
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Post title, already entity-decoded
    pub title: String,

    /// Permalink on the original blog
    pub link: String,

    /// Publication time (None for drafts/pages without a date)
    #[serde(default)]
    pub pub_date: Option<DateTime<Utc>>,

    /// HTML body
    #[serde(default)]
    pub content: String,

    /// Comments in thread order
    #[serde(default)]
    pub comments: Vec<Comment>,
}

/// A reader comment attached to a post
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Comment identifier within the export
    pub id: i64,

    /// Display name of the author
    #[serde(default)]
    pub author: String,

    /// Time the comment was posted
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,

    /// Comment body (HTML fragment or plain text)
    #[serde(default)]
    pub content: String,

    /// Parent comment id (0 = top level)
    #[serde(default)]
    pub parent_id: i64,

    /// Registered user id (0 = anonymous)
    #[serde(default)]
    pub user_id: i64,
}

/// Kind of terminal outcome, used as the statistics key
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeKind {
    /// Downloaded, validated and stored during this run
    Fetched,
    /// Already present in the image tree
    Cached,
    /// Rejected by the deny/allow rules
    Blacklisted,
    /// Skipped because of earlier failures or the static burn list
    Burned,
    /// Would have been fetched, but the run is a simulation
    DryRun,
    /// Fetch, validation or store failure
    Error,
}

impl OutcomeKind {
    /// Stable label used in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Fetched => "fetched",
            OutcomeKind::Cached => "cached",
            OutcomeKind::Blacklisted => "blacklisted",
            OutcomeKind::Burned => "burned",
            OutcomeKind::DryRun => "dry-run",
            OutcomeKind::Error => "error",
        }
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Terminal outcome of processing one image URL
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Downloaded, validated and stored
    Fetched,
    /// Already in the image tree, nothing done
    Cached,
    /// Rejected by the filter chain
    Blocked,
    /// Skipped by the burn store
    Burned,
    /// Simulation: every check passed, no fetch attempted
    DryRun,
    /// The origin could not deliver the URL
    FetchError(String),
    /// The origin delivered something that is not an image
    ValidationError(String),
    /// The image could not be written locally
    StoreError(String),
}

impl Outcome {
    /// Statistics bucket for this outcome
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Fetched => OutcomeKind::Fetched,
            Outcome::Cached => OutcomeKind::Cached,
            Outcome::Blocked => OutcomeKind::Blacklisted,
            Outcome::Burned => OutcomeKind::Burned,
            Outcome::DryRun => OutcomeKind::DryRun,
            Outcome::FetchError(_) | Outcome::ValidationError(_) | Outcome::StoreError(_) => {
                OutcomeKind::Error
            }
        }
    }

    /// Whether the origin delivered a body for this outcome
    ///
    /// Only these outcomes are followed by the inter-request pause.
    pub fn fetch_succeeded(&self) -> bool {
        matches!(
            self,
            Outcome::Fetched | Outcome::ValidationError(_) | Outcome::StoreError(_)
        )
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Fetched => f.write_str("fetched"),
            Outcome::Cached => f.write_str("cached"),
            Outcome::Blocked => f.write_str("blacklisted"),
            Outcome::Burned => f.write_str("burned"),
            Outcome::DryRun => f.write_str("dry run"),
            Outcome::FetchError(d) => write!(f, "can't fetch image: {}", d),
            Outcome::ValidationError(d) => write!(f, "invalid file type: {}", d),
            Outcome::StoreError(d) => write!(f, "can't store image: {}", d),
        }
    }
}

/// Per-kind outcome counters for one run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutcomeStats {
    counts: BTreeMap<OutcomeKind, usize>,
}

impl OutcomeStats {
    /// Count one processed URL
    pub fn record(&mut self, outcome: &Outcome) {
        *self.counts.entry(outcome.kind()).or_insert(0) += 1;
    }

    /// Count for one kind (0 if never seen)
    pub fn get(&self, kind: OutcomeKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// Total number of processed URLs
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Non-zero counters in report order
    pub fn iter(&self) -> impl Iterator<Item = (OutcomeKind, usize)> + '_ {
        self.counts.iter().map(|(k, v)| (*k, *v))
    }
}

impl std::fmt::Display for OutcomeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (kind, count) in self.iter() {
            writeln!(f, "{:>12}: {}", kind, count)?;
        }
        write!(f, "{:>12}: {}", "total", self.total())
    }
}

/// Result of trying to persist a burn
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BurnRecord {
    /// Counter durably incremented; holds the new failure count
    Recorded {
        /// Failures recorded so far for this URL
        failures: u32,
    },
    /// The burn database could not be written; the run continues
    NotRecorded {
        /// Why the write failed
        reason: String,
    },
}
