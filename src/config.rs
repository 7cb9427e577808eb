//! Configuration types for blog-image-archiver
//!
//! A [`Config`] is built once at startup (defaults, optionally a JSON file, then
//! command line overrides) and passed by reference into the filter chain, the
//! fetcher and the orchestrator. Nothing reads configuration from globals.

use crate::error::{Error, Result};
use crate::utils::is_sha1_hex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Host hashes of the blog's own media hosts
///
/// Used as the allow-list when third-party hosts are excluded. Shipped hashed so
/// the rule file does not spell out the private hostnames.
pub const FIRST_PARTY_HOST_HASHES: &[&str] = &[
    "a5ebcfcbf2c40f0b281230d90d016e002a3a31a0",
    "a6bbd2a3643af52dc61d8153a61a9a0def0bb5ab",
    "c0d8a5ddc695543da739000c21b9835517f3c7da",
    "b9cc3619507297511e54cd4260dc98a8e3952ea2",
    "cee7b1b87daed8be93d5bfd99630384d00743475",
    "13232157c18d9235962e61eb0bc9ecff47cd5555",
];

/// Deny/allow rules for hosts and URLs
///
/// Every entry is either a literal value or the lowercase SHA-1 hex digest of
/// one. Both forms are checked for each candidate.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Hosts that are never fetched from
    #[serde(default)]
    pub deny_hosts: Vec<String>,

    /// Full URLs that are never fetched
    #[serde(default)]
    pub deny_urls: Vec<String>,

    /// When non-empty, only these hosts are fetched from
    #[serde(default)]
    pub allow_hosts: Vec<String>,
}

/// Content scanning settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Host suffixes whose `w=`/`h=` resize query strings are stripped
    #[serde(default = "default_resize_hosts")]
    pub resize_hosts: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            resize_hosts: default_resize_hosts(),
        }
    }
}

/// HTTP settings for the authenticated origin
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User agent sent with every request (default: desktop Chrome)
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Origin-hosted resource fetched once to check the session
    #[serde(default = "default_probe_url")]
    pub probe_url: String,

    /// Case-insensitive patterns that mark a probe body as a login wall
    #[serde(default = "default_denial_markers")]
    pub denial_markers: Vec<String>,

    /// Maximum number of redirects followed per request (default: 10)
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Request timeout (None = transport default)
    #[serde(default, with = "optional_duration_serde")]
    pub timeout: Option<Duration>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            probe_url: default_probe_url(),
            denial_markers: default_denial_markers(),
            max_redirects: default_max_redirects(),
            timeout: None,
        }
    }
}

/// Image output settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root of the image tree (default: "./images")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

/// Burn bookkeeping settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BurnConfig {
    /// SQLite database holding the failure counters (default: "./burns.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Failures needed before a URL is skipped for good (default: 1)
    #[serde(default = "default_threshold")]
    pub threshold: u32,

    /// Also burn URLs whose image could not be written locally (default: false)
    ///
    /// A local write failure says nothing about the remote content, so by
    /// default it is reported but the URL stays eligible for the next run.
    #[serde(default)]
    pub burn_on_store_failure: bool,
}

impl Default for BurnConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            threshold: default_threshold(),
            burn_on_store_failure: false,
        }
    }
}

/// Batch behaviour
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    /// Decide but never touch the network or the image tree
    #[serde(default)]
    pub dry_run: bool,

    /// Pause after every successful fetch (default: 200ms)
    #[serde(default = "default_request_delay", with = "duration_serde")]
    pub request_delay: Duration,

    /// Seed for the processing order shuffle (None = fresh entropy)
    #[serde(default)]
    pub shuffle_seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            request_delay: default_request_delay(),
            shuffle_seed: None,
        }
    }
}

/// Main configuration for an archive run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Deny/allow rules
    #[serde(default)]
    pub filter: FilterConfig,

    /// Content scanning
    #[serde(default)]
    pub scan: ScanConfig,

    /// Origin access
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Image tree
    #[serde(default)]
    pub store: StoreConfig,

    /// Burn bookkeeping
    #[serde(default)]
    pub burn: BurnConfig,

    /// Batch behaviour
    #[serde(default)]
    pub run: RunConfig,
}

impl Config {
    /// Load a configuration file (JSON); missing keys take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| Error::Config {
            message: format!("cannot parse {}: {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Restrict fetching to the blog's own media hosts
    pub fn first_party_only(&mut self) {
        self.filter.allow_hosts = FIRST_PARTY_HOST_HASHES
            .iter()
            .map(|h| (*h).to_string())
            .collect();
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.burn.threshold == 0 {
            return Err(Error::Config {
                message: "burn threshold must be at least 1".into(),
                key: Some("burn.threshold".into()),
            });
        }

        if self.fetch.user_agent.trim().is_empty() {
            return Err(Error::Config {
                message: "user agent must not be empty".into(),
                key: Some("fetch.user_agent".into()),
            });
        }

        for marker in &self.fetch.denial_markers {
            regex::Regex::new(marker).map_err(|e| Error::Config {
                message: format!("invalid denial marker {:?}: {}", marker, e),
                key: Some("fetch.denial_markers".into()),
            })?;
        }

        let rule_lists = [
            ("filter.deny_hosts", &self.filter.deny_hosts),
            ("filter.deny_urls", &self.filter.deny_urls),
            ("filter.allow_hosts", &self.filter.allow_hosts),
        ];
        for (key, rules) in rule_lists {
            if let Some(bad) = rules.iter().find(|r| r.trim().is_empty()) {
                return Err(Error::Config {
                    message: format!("empty filter rule {:?}", bad),
                    key: Some(key.into()),
                });
            }
        }

        Ok(())
    }

    /// Number of filter entries given as hashes rather than literals
    pub fn hashed_rule_count(&self) -> usize {
        self.filter
            .deny_hosts
            .iter()
            .chain(&self.filter.deny_urls)
            .chain(&self.filter.allow_hosts)
            .filter(|r| is_sha1_hex(r))
            .count()
    }
}

// Default value functions
fn default_resize_hosts() -> Vec<String> {
    vec!["wordpress.com".into()]
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into()
}

fn default_probe_url() -> String {
    "https://goldtrail.files.wordpress.com/2015/11/speakeasy_banner.jpg".into()
}

fn default_denial_markers() -> Vec<String> {
    vec!["403: Access Denied".into(), "Private Site.*login".into()]
}

fn default_max_redirects() -> usize {
    10
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("images")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("burns.db")
}

fn default_threshold() -> u32 {
    1
}

fn default_request_delay() -> Duration {
    Duration::from_millis(200)
}

// Duration serialization helper (fractional seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<f64> = Option::deserialize(deserializer)?;
        secs.map(|s| Duration::try_from_secs_f64(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
