//! Deny/allow rules for image URLs
//!
//! Evaluation order is fixed: deny rules first (host, then full URL), then the
//! allow-list. The first rule that decides wins. Every rule entry may be the
//! literal value or its SHA-1 hex digest, so rule files can be shipped without
//! revealing the hosts or URLs they name.

use crate::config::FilterConfig;
use crate::utils::{host_of, sha1_hex};
use std::collections::HashSet;

/// Filter decision for one URL
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// The URL may be fetched
    Allowed,
    /// The URL must not be fetched
    Blocked(BlockReason),
}

/// Which rule blocked a URL
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockReason {
    /// Host is on the deny list
    DeniedHost,
    /// Full URL is on the deny list
    DeniedUrl,
    /// Allow-list is active and the host is not on it
    HostNotAllowed,
    /// Allow-list is active and the URL has no recognizable host
    NoHost,
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BlockReason::DeniedHost => "host denied",
            BlockReason::DeniedUrl => "url denied",
            BlockReason::HostNotAllowed => "host not in allow-list",
            BlockReason::NoHost => "no recognizable host",
        };
        f.write_str(s)
    }
}

/// One rule set (deny hosts, deny URLs or allow hosts)
#[derive(Debug, Default)]
struct RuleSet {
    entries: HashSet<String>,
}

impl RuleSet {
    fn new(entries: &[String]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .map(|e| {
                    if crate::utils::is_sha1_hex(&e) {
                        e.to_ascii_lowercase()
                    } else {
                        e
                    }
                })
                .collect(),
        }
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact match on the literal or on its digest
    fn matches(&self, value: &str) -> bool {
        !self.entries.is_empty()
            && (self.entries.contains(value) || self.entries.contains(&sha1_hex(value)))
    }
}

/// Compiled deny/allow rules
#[derive(Debug, Default)]
pub struct FilterChain {
    deny_hosts: RuleSet,
    deny_urls: RuleSet,
    allow_hosts: RuleSet,
}

impl FilterChain {
    /// Compile the rules from configuration
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            deny_hosts: RuleSet::new(&config.deny_hosts),
            deny_urls: RuleSet::new(&config.deny_urls),
            allow_hosts: RuleSet::new(&config.allow_hosts),
        }
    }

    /// Classify a URL
    pub fn check(&self, url: &str) -> Verdict {
        let host = host_of(url);

        if let Some(host) = host
            && self.deny_hosts.matches(host)
        {
            return Verdict::Blocked(BlockReason::DeniedHost);
        }

        if self.deny_urls.matches(url) {
            return Verdict::Blocked(BlockReason::DeniedUrl);
        }

        if !self.allow_hosts.is_empty() {
            match host {
                None => return Verdict::Blocked(BlockReason::NoHost),
                Some(host) if !self.allow_hosts.matches(host) => {
                    return Verdict::Blocked(BlockReason::HostNotAllowed);
                }
                Some(_) => {}
            }
        }

        Verdict::Allowed
    }

    /// Shorthand for `check(url) == Verdict::Allowed`
    pub fn allows(&self, url: &str) -> bool {
        self.check(url) == Verdict::Allowed
    }
}
