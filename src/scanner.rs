//! Image reference extraction from post and comment bodies
//!
//! Two strategies run over every blob and their results are merged:
//!
//! 1. **Markup**: every `<img>` element's `src` attribute, entity-decoded by the
//!    HTML parser. Unterminated or broken tags are dropped by the parser rather
//!    than failing the scan.
//! 2. **Bare URLs**: markup is stripped and the remaining text is searched for
//!    `http(s)://…` tokens ending in `.png`, `.gif`, `.jpg` or `.jpeg`. When the
//!    blob has no markup at all the whole whitespace-delimited token must be the
//!    URL, so links glued to prose are ignored.
//!
//! Every URL is then canonicalized: a query made only of `w=`/`h=` resize
//! parameters on a recognized media host is stripped, so resized variants of
//! one asset collapse into a single entry.

use crate::config::ScanConfig;
use crate::error::{Error, Result};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeSet;

/// Extracts candidate image URLs from content blobs
pub struct ContentScanner {
    img: Selector,
    tag: Regex,
    bare_url: Regex,
    bare_token: Regex,
    resize: Option<Regex>,
}

impl ContentScanner {
    /// Build a scanner for the given resize hosts
    pub fn new(config: &ScanConfig) -> Result<Self> {
        let img = Selector::parse("img[src]").map_err(|e| Error::Config {
            message: format!("invalid image selector: {:?}", e),
            key: None,
        })?;

        let resize = if config.resize_hosts.is_empty() {
            None
        } else {
            let hosts = config
                .resize_hosts
                .iter()
                .map(|h| regex::escape(h))
                .collect::<Vec<_>>()
                .join("|");
            Some(compile(
                &format!(r"(?:{})/.*\?(?:[wh]=\d+&?)+$", hosts),
                "scan.resize_hosts",
            )?)
        };

        Ok(Self {
            img,
            tag: compile(r"<.*?>", "scan")?,
            bare_url: compile(r"(?i)https?://\S*\.(?:png|gif|jpe?g)", "scan")?,
            bare_token: compile(r"(?i)^https?://\S*\.(?:png|gif|jpe?g)$", "scan")?,
            resize,
        })
    }

    /// All image URLs referenced by a blob, canonicalized and deduplicated
    pub fn scan(&self, blob: &str) -> BTreeSet<String> {
        let mut out = BTreeSet::new();

        if blob.contains('<') {
            let fragment = Html::parse_fragment(blob);
            for element in fragment.select(&self.img) {
                if let Some(src) = element.value().attr("src")
                    && let Some(url) = absolutize(src)
                {
                    out.insert(self.canonicalize(&url));
                }
            }

            let text = self.tag.replace_all(blob, "");
            for m in self.bare_url.find_iter(&text) {
                out.insert(self.canonicalize(m.as_str()));
            }
        } else {
            for token in blob.split_whitespace() {
                if self.bare_token.is_match(token) {
                    out.insert(self.canonicalize(token));
                }
            }
        }

        out
    }

    /// Strip resize-only query strings on recognized media hosts
    pub fn canonicalize(&self, url: &str) -> String {
        match &self.resize {
            Some(re) if re.is_match(url) => match url.find('?') {
                Some(idx) => url[..idx].to_string(),
                None => url.to_string(),
            },
            _ => url.to_string(),
        }
    }
}

fn compile(pattern: &str, key: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::Config {
        message: format!("invalid pattern {:?}: {}", pattern, e),
        key: Some(key.into()),
    })
}

/// Keep only fetchable sources; protocol-relative ones get `https:`
fn absolutize(src: &str) -> Option<String> {
    let src = src.trim();
    if src.starts_with("//") {
        return Some(format!("https:{}", src));
    }
    let lower = src.get(..8).unwrap_or(src).to_ascii_lowercase();
    (lower.starts_with("http://") || lower.starts_with("https://")).then(|| src.to_string())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> ContentScanner {
        ContentScanner::new(&ScanConfig::default()).unwrap()
    }

    fn scan(blob: &str) -> Vec<String> {
        scanner().scan(blob).into_iter().collect()
    }

    #[test]
    fn double_quoted_src_is_extracted() {
        assert_eq!(
            scan(r#"<p>Look <img class="x" src="https://a.example/pic.png" alt=""></p>"#),
            vec!["https://a.example/pic.png"]
        );
    }

    #[test]
    fn single_quoted_src_is_extracted() {
        assert_eq!(
            scan("<img src='https://a.example/pic.gif'/>"),
            vec!["https://a.example/pic.gif"]
        );
    }

    #[test]
    fn src_is_entity_decoded() {
        assert_eq!(
            scan(r#"<img src="https://a.example/img?id=1&amp;size=large">"#),
            vec!["https://a.example/img?id=1&size=large"]
        );
    }

    #[test]
    fn resized_variants_collapse_to_one_url() {
        let blob = r#"<img src="https://x.files.wordpress.com/2020/a.jpg?w=600&h=400">
            <img src="https://x.files.wordpress.com/2020/a.jpg?w=150">"#;
        assert_eq!(scan(blob), vec!["https://x.files.wordpress.com/2020/a.jpg"]);
    }

    #[test]
    fn entity_encoded_resize_query_is_stripped() {
        assert_eq!(
            scan(r#"<img src="https://x.files.wordpress.com/a.jpg?w=600&amp;h=400">"#),
            vec!["https://x.files.wordpress.com/a.jpg"]
        );
    }

    #[test]
    fn non_resize_query_is_kept() {
        let s = scanner();
        assert_eq!(
            s.canonicalize("https://x.files.wordpress.com/a.jpg?w=600&crop=1"),
            "https://x.files.wordpress.com/a.jpg?w=600&crop=1"
        );
        assert_eq!(
            s.canonicalize("https://cdn.example/a.jpg?w=600"),
            "https://cdn.example/a.jpg?w=600"
        );
    }

    #[test]
    fn canonicalization_can_be_disabled() {
        let s = ContentScanner::new(&ScanConfig {
            resize_hosts: vec![],
        })
        .unwrap();
        assert_eq!(
            s.canonicalize("https://x.files.wordpress.com/a.jpg?w=600"),
            "https://x.files.wordpress.com/a.jpg?w=600"
        );
    }

    #[test]
    fn bare_url_inside_markup_is_found() {
        assert_eq!(
            scan("<p>Chart here: https://charts.example/gold.PNG.</p>"),
            vec!["https://charts.example/gold.PNG"]
        );
    }

    #[test]
    fn tags_are_stripped_before_bare_scan() {
        // The anchor href is markup and must not be picked up as a bare URL
        assert!(scan(r#"<a href="https://a.example/b.jpg">link</a>"#).is_empty());
    }

    #[test]
    fn plain_text_requires_whitespace_bounded_url() {
        assert_eq!(
            scan("see https://a.example/one.jpeg\nand https://a.example/two.gif"),
            vec!["https://a.example/one.jpeg", "https://a.example/two.gif"]
        );
        assert!(scan("glued:https://a.example/one.jpg").is_empty());
        assert!(scan("trailing https://a.example/one.jpg.").is_empty());
    }

    #[test]
    fn plain_text_url_at_edges() {
        assert_eq!(scan("http://a.example/x.jpg"), vec!["http://a.example/x.jpg"]);
    }

    #[test]
    fn non_image_urls_are_ignored() {
        assert!(scan("read https://a.example/post.html today").is_empty());
        assert!(scan("<p>https://a.example/post.html</p>").is_empty());
    }

    #[test]
    fn data_and_relative_sources_are_skipped() {
        let blob = r#"<img src="data:image/png;base64,AAAA"><img src="/local/a.png"><img src="">"#;
        assert!(scan(blob).is_empty());
    }

    #[test]
    fn protocol_relative_source_gets_https() {
        assert_eq!(
            scan(r#"<img src="//a.example/p.png">"#),
            vec!["https://a.example/p.png"]
        );
    }

    #[test]
    fn unterminated_tag_does_not_fail_the_scan() {
        let found = scan(r#"<img src="http://a.example/b.jpg""#);
        assert_eq!(found, vec!["http://a.example/b.jpg"]);
        assert!(scan("<<<>>> < img").is_empty());
    }

    #[test]
    fn duplicates_across_strategies_are_merged() {
        let blob = r#"<img src="https://a.example/p.png"> https://a.example/p.png"#;
        assert_eq!(scan(blob), vec!["https://a.example/p.png"]);
    }
}
