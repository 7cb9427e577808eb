//! # blog-image-archiver
//!
//! Recovers the images referenced by a private blog export into a local tree,
//! so the archived posts no longer depend on the access-restricted hosting.
//!
//! ## Pipeline
//!
//! For every distinct image URL found in the corpus:
//!
//! 1. skip it if the image is already stored ([`store`])
//! 2. apply the deny/allow rules ([`filter`])
//! 3. skip it if it failed before ([`burn`])
//! 4. fetch it with the session cookies ([`fetch`])
//! 5. check the body really is an image ([`validate`])
//! 6. write it atomically under a path derived from the URL ([`store`])
//!
//! The run is resumable: stored images and burn counters are both durable, so
//! running again after an interruption re-derives the same decisions.
//!
//! ## Quick Start
//!
//! ```no_run
//! use blog_image_archiver::{Config, Corpus, SessionContext, archive_images};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let session = SessionContext::load(Path::new("cookies.txt"))?;
//!     let corpus = Corpus::load(Path::new("posts.json"))?;
//!
//!     let stats = archive_images(&config, &corpus, &session).await?;
//!     println!("{}", stats);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Failure bookkeeping for image URLs
pub mod burn;
/// Configuration types
pub mod config;
/// Corpus loading and image reference collection
pub mod corpus;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Authenticated origin access
pub mod fetch;
/// Deny/allow rules
pub mod filter;
/// Per-URL pipeline and batch driver
pub mod orchestrator;
/// Image reference extraction
pub mod scanner;
/// Browser session cookies
pub mod session;
/// Atomic image storage
pub mod store;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;
/// Media type sniffing
pub mod validate;

// Re-export commonly used types
pub use burn::BurnStore;
pub use config::Config;
pub use corpus::{Corpus, ImageUsage, collect_image_urls, image_usage};
pub use db::Database;
pub use error::{DatabaseError, Error, FetchError, Result, StoreError, ToExitCode};
pub use fetch::{Fetcher, HttpFetcher};
pub use filter::{BlockReason, FilterChain, Verdict};
pub use orchestrator::{Acquirer, archive_images};
pub use scanner::ContentScanner;
pub use session::SessionContext;
pub use store::ImageStore;
pub use types::{BurnRecord, Comment, Outcome, OutcomeKind, OutcomeStats, Post};
pub use validate::MediaType;

/// Wait until the archive run is asked to stop
///
/// On unix this is SIGTERM or SIGINT. If neither handler can be registered
/// (some containers and test harnesses refuse), it falls back to
/// `tokio::signal::ctrl_c()`. Elsewhere only Ctrl+C is watched.
///
/// Stopping a run at any point is safe: an image is either fully stored or
/// absent, and burns are committed before the next URL starts.
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable");
            None
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::warn!(error = %e, "SIGINT handler unavailable");
            None
        }
    };

    let received = match (sigterm.as_mut(), sigint.as_mut()) {
        (Some(term), Some(int)) => tokio::select! {
            _ = term.recv() => "SIGTERM",
            _ = int.recv() => "SIGINT",
        },
        (Some(term), None) => {
            term.recv().await;
            "SIGTERM"
        }
        (None, Some(int)) => {
            int.recv().await;
            "SIGINT"
        }
        (None, None) => {
            tracing::error!("no signal handler registered, falling back to ctrl_c");
            tokio::signal::ctrl_c().await.ok();
            "Ctrl+C"
        }
    };

    tracing::info!(signal = received, "stopping image acquisition");
}

/// Wait until the archive run is asked to stop (Ctrl+C)
#[cfg(not(unix))]
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!(signal = "Ctrl+C", "stopping image acquisition"),
        Err(e) => tracing::error!(error = %e, "can't listen for Ctrl+C, stopping image acquisition"),
    }
}
