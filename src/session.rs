//! Session context for the authenticated origin
//!
//! The blog is private, so every request carries the cookies of a logged-in
//! browser session. They are exported in the Netscape `cookies.txt` format:
//! one cookie per line, seven tab-separated fields
//! (`domain`, `include-subdomains`, `path`, `secure`, `expiry`, `name`, `value`).

use crate::error::{Error, Result};
use reqwest::cookie::Jar;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// One cookie from the jar file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionCookie {
    /// Cookie domain as written in the file (may start with '.')
    pub domain: String,
    /// Sent to subdomains of `domain` too
    pub include_subdomains: bool,
    /// Path scope
    pub path: String,
    /// Only sent over HTTPS
    pub secure: bool,
    /// Unix expiry time (0 = session cookie)
    pub expires: i64,
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
}

impl SessionCookie {
    /// Parse one line; `None` for comments, blanks and malformed lines
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let line = match line.strip_prefix(HTTP_ONLY_PREFIX) {
            Some(rest) => rest,
            None if line.trim().is_empty() || line.starts_with('#') => return None,
            None => line,
        };

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 7 {
            tracing::warn!(line = %line, "skipping malformed cookie line");
            return None;
        }

        let name = fields[5].trim();
        if fields[0].is_empty() || name.is_empty() {
            tracing::warn!(line = %line, "skipping cookie without domain or name");
            return None;
        }

        Some(Self {
            domain: fields[0].to_string(),
            include_subdomains: fields[1].eq_ignore_ascii_case("TRUE"),
            path: if fields[2].is_empty() { "/" } else { fields[2] }.to_string(),
            secure: fields[3].eq_ignore_ascii_case("TRUE"),
            expires: fields[4].trim().parse().unwrap_or(0),
            name: name.to_string(),
            value: fields[6..].join("\t"),
        })
    }

    fn is_expired(&self, now: i64) -> bool {
        self.expires != 0 && self.expires < now
    }

    /// Origin the cookie is scoped to, used when adding it to a jar
    fn origin(&self) -> Option<Url> {
        let scheme = if self.secure { "https" } else { "http" };
        let host = self.domain.trim_start_matches('.');
        Url::parse(&format!("{}://{}{}", scheme, host, self.path)).ok()
    }

    /// `Set-Cookie` style rendering understood by the jar
    fn set_cookie_header(&self) -> String {
        let mut header = format!("{}={}; Path={}", self.name, self.value, self.path);
        if self.include_subdomains {
            header.push_str("; Domain=");
            header.push_str(self.domain.trim_start_matches('.'));
        }
        if self.secure {
            header.push_str("; Secure");
        }
        header
    }
}

/// Cookies of an authenticated browser session
#[derive(Clone, Debug)]
pub struct SessionContext {
    path: PathBuf,
    cookies: Vec<SessionCookie>,
}

impl SessionContext {
    /// Load a `cookies.txt` file
    ///
    /// A readable jar with no usable cookie still loads; see
    /// [`require_cookies`](Self::require_cookies).
    ///
    /// # Errors
    /// [`Error::SessionMissing`] if the file cannot be read
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::SessionMissing {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let context = Self::parse(path, &raw);
        tracing::debug!(
            path = %path.display(),
            cookies = context.cookies.len(),
            "session context loaded"
        );
        Ok(context)
    }

    /// Parse jar text; expired and malformed cookies are dropped
    pub fn parse(path: &Path, text: &str) -> Self {
        let now = chrono::Utc::now().timestamp();
        let cookies = text
            .lines()
            .filter_map(SessionCookie::parse)
            .filter(|c| {
                let expired = c.is_expired(now);
                if expired {
                    tracing::debug!(name = %c.name, domain = %c.domain, "dropping expired cookie");
                }
                !expired
            })
            .collect();

        Self {
            path: path.to_path_buf(),
            cookies,
        }
    }

    /// Where the jar was read from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parsed cookies
    pub fn cookies(&self) -> &[SessionCookie] {
        &self.cookies
    }

    /// Number of usable cookies
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Whether no cookie survived parsing
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Reject a jar that cannot authenticate anything
    ///
    /// # Errors
    /// [`Error::SessionInvalid`] if no cookie survived parsing
    pub fn require_cookies(&self) -> Result<()> {
        if self.cookies.is_empty() {
            return Err(Error::SessionInvalid {
                reason: format!("no usable cookies in {}", self.path.display()),
            });
        }
        Ok(())
    }

    /// Cookie jar for the HTTP client
    pub fn jar(&self) -> Arc<Jar> {
        let jar = Jar::default();
        for cookie in &self.cookies {
            match cookie.origin() {
                Some(origin) => jar.add_cookie_str(&cookie.set_cookie_header(), &origin),
                None => {
                    tracing::warn!(domain = %cookie.domain, name = %cookie.name, "cookie domain is not a valid host")
                }
            }
        }
        Arc::new(jar)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::cookie::CookieStore;
    use tempfile::tempdir;

    const JAR: &str = "# Netscape HTTP Cookie File\n\
        # This is a generated file! Do not edit.\n\
        \n\
        .wordpress.com\tTRUE\t/\tTRUE\t0\twordpress_logged_in\tabc%7C123\n\
        #HttpOnly_goldtrail.wordpress.com\tFALSE\t/\tTRUE\t0\tprivate_session\ts3cr3t\n\
        broken line without tabs\n";

    fn header_for(jar: &Jar, url: &str) -> String {
        jar.cookies(&Url::parse(url).unwrap())
            .map(|h| h.to_str().unwrap().to_string())
            .unwrap_or_default()
    }

    #[test]
    fn parses_plain_and_http_only_cookies() {
        let ctx = SessionContext::parse(Path::new("cookies.txt"), JAR);
        assert_eq!(ctx.len(), 2);

        let first = &ctx.cookies()[0];
        assert_eq!(first.domain, ".wordpress.com");
        assert!(first.include_subdomains);
        assert!(first.secure);
        assert_eq!(first.name, "wordpress_logged_in");
        assert_eq!(first.value, "abc%7C123");

        let second = &ctx.cookies()[1];
        assert_eq!(second.domain, "goldtrail.wordpress.com");
        assert!(!second.include_subdomains);
        assert_eq!(second.name, "private_session");
    }

    #[test]
    fn expired_cookies_are_dropped() {
        let text = "example.com\tFALSE\t/\tFALSE\t1\told\tgone\n\
                    example.com\tFALSE\t/\tFALSE\t0\tfresh\tkept\n";
        let ctx = SessionContext::parse(Path::new("cookies.txt"), text);
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.cookies()[0].name, "fresh");
    }

    #[test]
    fn jar_sends_domain_cookie_to_subdomains() {
        let ctx = SessionContext::parse(Path::new("cookies.txt"), JAR);
        let jar = ctx.jar();

        let header = header_for(&jar, "https://goldtrail.files.wordpress.com/2015/a.jpg");
        assert!(header.contains("wordpress_logged_in=abc%7C123"), "{header}");
        assert!(!header.contains("private_session"), "{header}");

        let header = header_for(&jar, "https://goldtrail.wordpress.com/");
        assert!(header.contains("private_session=s3cr3t"), "{header}");
    }

    #[test]
    fn secure_cookie_not_sent_over_http() {
        let ctx = SessionContext::parse(Path::new("cookies.txt"), JAR);
        let jar = ctx.jar();
        assert!(header_for(&jar, "http://goldtrail.wordpress.com/").is_empty());
    }

    #[test]
    fn host_only_cookie_on_local_origin() {
        let text = "127.0.0.1\tFALSE\t/\tFALSE\t0\tsid\tlocal\n";
        let ctx = SessionContext::parse(Path::new("cookies.txt"), text);
        let jar = ctx.jar();
        assert_eq!(header_for(&jar, "http://127.0.0.1:8080/x.png"), "sid=local");
    }

    #[test]
    fn missing_file_is_session_missing() {
        let dir = tempdir().unwrap();
        let err = SessionContext::load(&dir.path().join("cookies.txt")).unwrap_err();
        assert!(matches!(err, Error::SessionMissing { .. }));
    }

    #[test]
    fn file_without_cookies_is_session_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        std::fs::write(&path, "# Netscape HTTP Cookie File\n\n").unwrap();

        let ctx = SessionContext::load(&path).unwrap();
        assert!(ctx.is_empty());
        let err = ctx.require_cookies().unwrap_err();
        assert!(matches!(err, Error::SessionInvalid { .. }));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        std::fs::write(&path, JAR).unwrap();

        let ctx = SessionContext::load(&path).unwrap();
        assert_eq!(ctx.path(), path.as_path());
        assert_eq!(ctx.len(), 2);
        assert!(!ctx.is_empty());
        ctx.require_cookies().unwrap();
    }
}
