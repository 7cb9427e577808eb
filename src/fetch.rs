//! Authenticated fetches from the blog origin
//!
//! [`Fetcher`] is the seam between the orchestrator and the network. The
//! production implementation, [`HttpFetcher`], holds one HTTP client for the
//! whole run with the session cookies preloaded; tests substitute their own.

use crate::config::FetchConfig;
use crate::error::{Error, FetchError, Result};
use crate::session::SessionContext;
use async_trait::async_trait;
use regex::bytes::{Regex, RegexBuilder};

/// Retrieves raw resources from the authenticated origin
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET a URL and return the exact response body
    ///
    /// Redirects are followed. Any non-2xx final status, timeout or transport
    /// failure is a [`FetchError`]; the body is never transformed.
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError>;

    /// Check once, before any image fetch, that the session is accepted
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionInvalid`] if the probe resource cannot be
    /// fetched or comes back as an access-denied or login page.
    async fn validate_session(&self) -> Result<()>;
}

/// reqwest-backed fetcher carrying the session cookie jar
pub struct HttpFetcher {
    client: reqwest::Client,
    probe_url: String,
    denial_markers: Vec<Regex>,
}

impl HttpFetcher {
    /// Build the client for a run
    ///
    /// # Errors
    /// Returns error if a denial marker is not a valid pattern or the HTTP
    /// client cannot be created
    pub fn new(config: &FetchConfig, session: &SessionContext) -> Result<Self> {
        let denial_markers = config
            .denial_markers
            .iter()
            .map(|m| {
                RegexBuilder::new(m)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| Error::Config {
                        message: format!("invalid denial marker {:?}: {}", m, e),
                        key: Some("fetch.denial_markers".into()),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .cookie_provider(session.jar())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            probe_url: config.probe_url.clone(),
            denial_markers,
        })
    }

    /// First denial marker found in a body, if any
    fn denial_in(&self, body: &[u8]) -> Option<&Regex> {
        self.denial_markers.iter().find(|re| re.is_match(body))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        Ok(body.to_vec())
    }

    async fn validate_session(&self) -> Result<()> {
        let body = self
            .fetch(&self.probe_url)
            .await
            .map_err(|e| Error::SessionInvalid {
                reason: format!("probe {} failed: {}", self.probe_url, e),
            })?;

        if let Some(marker) = self.denial_in(&body) {
            return Err(Error::SessionInvalid {
                reason: format!(
                    "probe {} returned a login wall (matched {:?})",
                    self.probe_url,
                    marker.as_str()
                ),
            });
        }

        tracing::debug!(probe = %self.probe_url, bytes = body.len(), "session accepted");
        Ok(())
    }
}
