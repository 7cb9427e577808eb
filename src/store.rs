//! Local image tree
//!
//! Every image URL maps to exactly one path: the output root joined with the
//! URL minus its scheme (`https://h/a/b.jpg` becomes `<root>/h/a/b.jpg`). A file
//! at that path means the image is done. Writes go to a sibling `.tmp` file
//! which is renamed into place only after the whole body is on disk, so a final
//! path never holds a partial image.

use crate::error::StoreError;
use crate::utils::strip_scheme;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;

const TEMP_SUFFIX: &str = ".tmp";

/// Atomic, URL-addressed image storage
#[derive(Clone, Debug)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    /// Store rooted at `root` (created lazily on first save)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Output root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final path for a URL
    ///
    /// Repeated slashes collapse (`a//b.png` is `a/b.png`), which also covers
    /// query strings carrying another URL.
    ///
    /// # Errors
    /// [`StoreError::InvalidPath`] if the URL is not http(s), has no host or
    /// file name, or a path segment would escape the root.
    pub fn path_for(&self, url: &str) -> Result<PathBuf, StoreError> {
        let invalid = |reason: &str| StoreError::InvalidPath {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let relative = strip_scheme(url).ok_or_else(|| invalid("not an http(s) URL"))?;
        if relative.contains('\0') || relative.contains('\\') {
            return Err(invalid("unsupported character in path"));
        }
        if relative.starts_with('/') {
            return Err(invalid("no host"));
        }
        if relative.ends_with('/') {
            return Err(invalid("no file name"));
        }

        let mut path = self.root.clone();
        for segment in relative.split('/') {
            match segment {
                "" => continue,
                "." | ".." => return Err(invalid("relative path segment")),
                s => path.push(s),
            }
        }
        Ok(path)
    }

    /// Whether the image for a URL is already stored
    ///
    /// A URL without a valid path is never cached.
    pub async fn exists(&self, url: &str) -> bool {
        let Ok(path) = self.path_for(url) else {
            return false;
        };
        tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Persist an image atomically; returns the final path
    pub async fn save(&self, url: &str, bytes: Vec<u8>) -> Result<PathBuf, StoreError> {
        let path = self.path_for(url)?;
        let target = path.clone();

        // create/write/fsync/rename all block
        spawn_blocking(move || write_atomic(&target, |file| file.write_all(&bytes)))
            .await
            .map_err(|e| StoreError::Io {
                path: path.clone(),
                source: io::Error::other(e.to_string()),
            })??;
        Ok(path)
    }
}

/// Create parents, write through `write` into the temp file, then rename
///
/// On any failure the temp file is removed and `path` is left untouched.
fn write_atomic<F>(path: &Path, write: F) -> Result<(), StoreError>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let io_err = |p: &Path| {
        let p = p.to_path_buf();
        move |source: io::Error| StoreError::Io { path: p, source }
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(TEMP_SUFFIX);
    let tmp = PathBuf::from(tmp);

    let result = File::create(&tmp)
        .and_then(|mut file| {
            write(&mut file)?;
            file.sync_all()
        })
        .map_err(io_err(&tmp))
        .and_then(|()| fs::rename(&tmp, path).map_err(io_err(path)));

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use walkdir::WalkDir;

    const URL: &str = "https://x.files.wordpress.com/2020/05/a.jpg";

    fn temp_files(root: &Path) -> Vec<PathBuf> {
        WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(TEMP_SUFFIX))
            .map(|e| e.into_path())
            .collect()
    }

    #[test]
    fn path_mirrors_url_without_scheme() {
        let store = ImageStore::new("/srv/images");
        assert_eq!(
            store.path_for(URL).unwrap(),
            PathBuf::from("/srv/images/x.files.wordpress.com/2020/05/a.jpg")
        );
        assert_eq!(
            store.path_for("http://x.files.wordpress.com/2020/05/a.jpg").unwrap(),
            store.path_for(URL).unwrap()
        );
    }

    #[test]
    fn query_string_is_part_of_the_path() {
        let store = ImageStore::new("images");
        let plain = store.path_for("https://h.example/a.png").unwrap();
        let query = store.path_for("https://h.example/a.png?v=2").unwrap();
        assert_ne!(plain, query);
        assert_eq!(query, PathBuf::from("images/h.example/a.png?v=2"));
    }

    #[test]
    fn repeated_slashes_collapse() {
        let store = ImageStore::new("images");
        assert_eq!(
            store.path_for("https://h.example/a//b.png").unwrap(),
            PathBuf::from("images/h.example/a/b.png")
        );
        assert_eq!(
            store
                .path_for("https://h.example/proxy.jpg?src=https://cdn.example/a.jpg")
                .unwrap(),
            PathBuf::from("images/h.example/proxy.jpg?src=https:/cdn.example/a.jpg")
        );
    }

    #[test]
    fn unsafe_urls_are_rejected() {
        let store = ImageStore::new("images");
        for url in [
            "ftp://h.example/a.png",
            "data:image/png;base64,AAAA",
            "https://h.example/../../etc/passwd",
            "https://h.example/./a.png",
            "https://h.example/dir/",
            "https:///a.png",
        ] {
            assert!(
                matches!(store.path_for(url), Err(StoreError::InvalidPath { .. })),
                "{url}"
            );
        }
    }

    #[tokio::test]
    async fn save_creates_directories_and_content() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        assert!(!store.exists(URL).await);

        let path = store.save(URL, b"\xFF\xD8\xFFdata".to_vec()).await.unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"\xFF\xD8\xFFdata");
        assert!(store.exists(URL).await);
        assert!(temp_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn save_replaces_existing_file() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        store.save(URL, b"old".to_vec()).await.unwrap();
        let path = store.save(URL, b"new".to_vec()).await.unwrap();
        assert_eq!(fs::read(path).unwrap(), b"new");
    }

    #[tokio::test]
    async fn stale_temp_file_is_not_a_cached_image() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        let path = store.path_for(URL).unwrap();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(format!("{}{}", path.display(), TEMP_SUFFIX), b"partial").unwrap();

        assert!(!store.exists(URL).await);
        store.save(URL, b"full".to_vec()).await.unwrap();
        assert!(store.exists(URL).await);
        assert!(temp_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn unmappable_url_is_not_cached() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        assert!(!store.exists("https://h.example/../a.png").await);
    }

    #[tokio::test]
    async fn failed_write_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        let path = store.path_for(URL).unwrap();

        let err = write_atomic(&path, |file| {
            file.write_all(b"half an im")?;
            Err(io::Error::other("disk full"))
        })
        .unwrap_err();

        assert!(matches!(err, StoreError::Io { .. }));
        assert!(!path.exists());
        assert!(!store.exists(URL).await);
        assert!(temp_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn unwritable_parent_is_a_store_error() {
        let dir = tempdir().unwrap();
        // A file where the host directory should be
        fs::write(dir.path().join("x.files.wordpress.com"), b"").unwrap();
        let store = ImageStore::new(dir.path());

        let err = store.save(URL, b"data".to_vec()).await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert!(!store.exists(URL).await);
    }
}
