//! Per-URL acquisition pipeline and the batch driver
//!
//! Each URL walks a fixed sequence of checks and ends in exactly one
//! [`Outcome`]:
//!
//! ```text
//! cached? ─yes─> Cached
//!   │no
//! filter ─blocked─> Blocked
//!   │allowed
//! burned? ─yes─> Burned
//!   │no
//! dry run? ─yes─> DryRun
//!   │no
//! path? ─unmappable─> StoreError
//!   │ok
//! fetch ─fail─> burn, FetchError
//!   │ok
//! sniff ─not an image─> burn, ValidationError
//!   │image
//! store ─fail─> StoreError
//!   │ok
//! Fetched
//! ```
//!
//! URLs are processed one at a time. Nothing inside the pipeline aborts the
//! batch: every failure becomes an outcome and the next URL is processed.

use crate::burn::BurnStore;
use crate::config::Config;
use crate::corpus::{Corpus, collect_image_urls};
use crate::error::{Error, Result};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::filter::{FilterChain, Verdict};
use crate::scanner::ContentScanner;
use crate::session::SessionContext;
use crate::store::ImageStore;
use crate::types::{Outcome, OutcomeStats};
use crate::validate;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Drives image URLs through the acquisition pipeline
pub struct Acquirer {
    filter: FilterChain,
    fetcher: Arc<dyn Fetcher>,
    burns: BurnStore,
    store: ImageStore,
    dry_run: bool,
    burn_on_store_failure: bool,
    request_delay: Duration,
    shuffle_seed: Option<u64>,
}

impl Acquirer {
    /// Assemble the pipeline from its parts
    pub fn new(
        config: &Config,
        fetcher: Arc<dyn Fetcher>,
        burns: BurnStore,
        store: ImageStore,
    ) -> Self {
        Self {
            filter: FilterChain::new(&config.filter),
            fetcher,
            burns,
            store,
            dry_run: config.run.dry_run,
            burn_on_store_failure: config.burn.burn_on_store_failure,
            request_delay: config.run.request_delay,
            shuffle_seed: config.run.shuffle_seed,
        }
    }

    /// Pre-flight session check; trivially valid in dry-run mode
    pub async fn validate_session(&self) -> Result<()> {
        if self.dry_run {
            debug!("dry run, skipping session check");
            return Ok(());
        }
        self.fetcher.validate_session().await
    }

    /// Resolve one URL to its outcome
    pub async fn process(&self, url: &str) -> Outcome {
        if self.store.exists(url).await {
            debug!(url = %url, "cached");
            return Outcome::Cached;
        }

        if let Verdict::Blocked(reason) = self.filter.check(url) {
            info!(url = %url, reason = %reason, "blacklisted");
            return Outcome::Blocked;
        }

        if self.burns.is_burned(url).await {
            info!(url = %url, "burned");
            return Outcome::Burned;
        }

        if self.dry_run {
            info!(url = %url, "would fetch (dry run)");
            return Outcome::DryRun;
        }

        // Nowhere to put it, so don't spend a request on it
        if let Err(e) = self.store.path_for(url) {
            error!(url = %url, error = %e, "can't store image");
            return Outcome::StoreError(e.to_string());
        }

        let bytes = match self.fetcher.fetch(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(url = %url, error = %e, "can't fetch image");
                self.burns.record_failure(url).await;
                return Outcome::FetchError(e.to_string());
            }
        };

        let media = validate::sniff(&bytes);
        if !media.is_image() {
            warn!(url = %url, mime = media.mime(), bytes = bytes.len(), "invalid file type");
            self.burns.record_failure(url).await;
            return Outcome::ValidationError(media.mime().to_string());
        }

        let size = bytes.len();
        match self.store.save(url, bytes).await {
            Ok(path) => {
                info!(
                    url = %url,
                    path = %path.display(),
                    mime = media.mime(),
                    bytes = size,
                    "fetched"
                );
                Outcome::Fetched
            }
            Err(e) => {
                error!(url = %url, error = %e, "can't store image");
                if self.burn_on_store_failure {
                    self.burns.record_failure(url).await;
                }
                Outcome::StoreError(e.to_string())
            }
        }
    }

    /// Process a batch of URLs in shuffled order
    ///
    /// The pause between requests is taken only after outcomes where the
    /// origin actually served a body.
    pub async fn run<I>(&self, urls: I) -> OutcomeStats
    where
        I: IntoIterator<Item = String>,
    {
        let mut urls: Vec<String> = urls.into_iter().collect();
        let mut rng = match self.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        urls.shuffle(&mut rng);

        let total = urls.len();
        let mut stats = OutcomeStats::default();

        for (idx, url) in urls.iter().enumerate() {
            debug!("{}/{} {}", idx + 1, total, url);

            let outcome = self.process(url).await;
            stats.record(&outcome);

            if outcome.fetch_succeeded() && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
        }

        stats
    }
}

/// Acquire every image referenced by a corpus
///
/// Opens the burn database, checks the session against the origin, scans the
/// corpus and processes every distinct image URL.
///
/// # Errors
/// Only run-level failures are returned: an invalid configuration, or a session
/// that holds no cookie or that the origin rejects ([`Error::SessionInvalid`]).
/// Neither session check applies in dry-run mode. Per-URL failures are counted
/// in the returned statistics.
pub async fn archive_images(
    config: &Config,
    corpus: &Corpus,
    session: &SessionContext,
) -> Result<OutcomeStats> {
    let scanner = ContentScanner::new(&config.scan)?;
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config.fetch, session)?);
    let burns = BurnStore::open(&config.burn).await;
    info!(
        static_burns = burns.static_len(),
        recorded_burns = burns.recorded_burns().await,
        "burn list loaded"
    );
    let store = ImageStore::new(&config.store.output_dir);

    let acquirer = Acquirer::new(config, fetcher, burns, store);
    if !config.run.dry_run {
        session.require_cookies()?;
    }
    acquirer.validate_session().await?;

    let urls = collect_image_urls(corpus, &scanner);
    info!(posts = corpus.len(), images = urls.len(), "corpus scanned");

    if !config.run.dry_run {
        let root = acquirer.store.root();
        tokio::fs::create_dir_all(root).await.map_err(|e| {
            Error::Other(format!(
                "Failed to create output directory {}: {}",
                root.display(),
                e
            ))
        })?;
    }

    Ok(acquirer.run(urls).await)
}
