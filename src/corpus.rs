//! The exported blog corpus and the image references it contains
//!
//! The corpus is produced by the export step as a JSON object keyed by post
//! identifier. This module only reads it; acquiring images never changes it.

use crate::error::{Error, Result};
use crate::scanner::ContentScanner;
use crate::types::Post;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Posts keyed by identifier
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Corpus {
    posts: BTreeMap<String, Post>,
}

impl Corpus {
    /// Load the corpus from a JSON file
    ///
    /// # Errors
    /// - [`Error::CorpusMissing`] if the file does not exist
    /// - [`Error::InvalidCorpus`] if it cannot be read or decoded
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::CorpusMissing {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => {
                return Err(Error::InvalidCorpus(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let corpus: Corpus = serde_json::from_slice(&raw).map_err(|e| {
            Error::InvalidCorpus(format!("cannot decode {}: {}", path.display(), e))
        })?;

        tracing::info!(path = %path.display(), posts = corpus.len(), "corpus loaded");
        Ok(corpus)
    }

    /// Build a corpus in memory
    pub fn from_posts(posts: impl IntoIterator<Item = (String, Post)>) -> Self {
        Self {
            posts: posts.into_iter().collect(),
        }
    }

    /// Number of posts
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    /// Whether the corpus has no posts
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Posts in identifier order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Post)> {
        self.posts.iter().map(|(id, post)| (id.as_str(), post))
    }

    /// Post body followed by every comment body
    fn blobs(post: &Post) -> impl Iterator<Item = &str> {
        std::iter::once(post.content.as_str()).chain(post.comments.iter().map(|c| c.content.as_str()))
    }
}

/// Every distinct image URL referenced by any post or comment
pub fn collect_image_urls(corpus: &Corpus, scanner: &ContentScanner) -> BTreeSet<String> {
    let mut urls = BTreeSet::new();
    for (_, post) in corpus.iter() {
        for blob in Corpus::blobs(post) {
            urls.extend(scanner.scan(blob));
        }
    }
    urls
}

/// Where one image is referenced
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImageUse {
    /// Number of bodies (posts and comments) referencing the image
    pub uses: usize,
    /// Posts whose body or comments reference the image
    pub posts: BTreeSet<String>,
}

/// Per-image reference statistics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ImageUsage {
    images: BTreeMap<String, ImageUse>,
}

impl ImageUsage {
    /// Usage for one URL
    pub fn get(&self, url: &str) -> Option<&ImageUse> {
        self.images.get(url)
    }

    /// Number of distinct images
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether no image is referenced at all
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// All images in URL order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ImageUse)> {
        self.images.iter().map(|(url, u)| (url.as_str(), u))
    }

    /// Images referenced from more than one body
    pub fn shared(&self) -> impl Iterator<Item = (&str, &ImageUse)> {
        self.iter().filter(|(_, u)| u.uses > 1)
    }
}

/// Count how often and where each image is referenced
pub fn image_usage(corpus: &Corpus, scanner: &ContentScanner) -> ImageUsage {
    let mut usage = ImageUsage::default();
    for (id, post) in corpus.iter() {
        for blob in Corpus::blobs(post) {
            for url in scanner.scan(blob) {
                let entry = usage.images.entry(url).or_default();
                entry.uses += 1;
                entry.posts.insert(id.to_string());
            }
        }
    }
    usage
}
