//! Utility functions for hashing and URL dissection

use sha1::{Digest, Sha1};

/// Lowercase hex SHA-1 digest of a string
///
/// This is the content hash used for burn keys and for redacted filter rules,
/// so the digest of a URL here must match what shipped rule files contain.
///
/// # Examples
///
/// ```
/// use blog_image_archiver::utils::sha1_hex;
///
/// assert_eq!(sha1_hex("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
/// ```
#[must_use]
pub fn sha1_hex(value: &str) -> String {
    let digest = Sha1::digest(value.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Whether a rule entry looks like a SHA-1 digest rather than a literal
#[must_use]
pub fn is_sha1_hex(value: &str) -> bool {
    value.len() == 40 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Extract the host part of a URL
///
/// The host is whatever sits between the first `//` and the next `/`, port
/// and credentials included. URLs without a path separator after the host, or
/// with an empty host, have no recognizable host.
///
/// # Examples
///
/// ```
/// use blog_image_archiver::utils::host_of;
///
/// assert_eq!(host_of("https://x.files.wordpress.com/2020/a.jpg"), Some("x.files.wordpress.com"));
/// assert_eq!(host_of("https://example.com"), None);
/// assert_eq!(host_of("not a url"), None);
/// ```
#[must_use]
pub fn host_of(url: &str) -> Option<&str> {
    let start = url.find("//")? + 2;
    let rest = &url[start..];
    let end = rest.find('/')?;
    let host = &rest[..end];
    (!host.is_empty()).then_some(host)
}

/// Strip a leading `http://` or `https://` (case-insensitive)
#[must_use]
pub fn strip_scheme(url: &str) -> Option<&str> {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    if lower.starts_with("https://") {
        Some(&url[8..])
    } else if lower.starts_with("http://") {
        Some(&url[7..])
    } else {
        None
    }
}
