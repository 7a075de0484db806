use log::{debug, error};
use reqwest::StatusCode;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ImportError;
use crate::utils::file_name_from_content;

/// Source of image bytes for images missing from the local cache.
pub trait ImageFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ImportError>;
}

/// Fetches images with a single unauthenticated HTTP GET.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ImportError> {
        let download_error = |reason: String| ImportError::Download {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| download_error(e.to_string()))?;
        if response.status() != StatusCode::OK {
            return Err(download_error(format!("HTTP status {}", response.status())));
        }
        let bytes = response
            .bytes()
            .map_err(|e| download_error(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

fn is_remote(content: &str) -> bool {
    content.starts_with("http://") || content.starts_with("https://")
}

/// Return the local path of the image behind `content`, downloading it into
/// `image_dir` unless a file with the same name is already there.
///
/// Bytes are written only once the fetch succeeded, so a failed download
/// never leaves a file behind.
pub fn maybe_download(
    content: &str,
    image_dir: &Path,
    fetcher: &dyn ImageFetcher,
) -> Result<PathBuf, ImportError> {
    let file_path = image_dir.join(file_name_from_content(content));
    if file_path.exists() {
        debug!("Reusing cached image {}", file_path.display());
        return Ok(file_path);
    }

    let bytes = if is_remote(content) {
        fetcher.fetch(content)
    } else {
        fs::read(content).map_err(|e| ImportError::Download {
            url: content.to_string(),
            reason: e.to_string(),
        })
    };
    let bytes = bytes.map_err(|e| {
        error!("Failed to download image at {}, ignoring: {}", content, e);
        e
    })?;

    fs::write(&file_path, bytes)?;
    Ok(file_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FakeFetcher {
        calls: RefCell<Vec<String>>,
        response: Option<Vec<u8>>,
    }

    impl ImageFetcher for FakeFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, ImportError> {
            self.calls.borrow_mut().push(url.to_string());
            self.response.clone().ok_or_else(|| ImportError::Download {
                url: url.to_string(),
                reason: "Not a 200 response".to_string(),
            })
        }
    }

    #[test]
    fn test_cached_image_is_not_fetched() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"cached").unwrap();
        let fetcher = FakeFetcher {
            calls: RefCell::new(Vec::new()),
            response: Some(b"fresh".to_vec()),
        };

        let path = maybe_download("http://host/x/a.jpg", dir.path(), &fetcher).unwrap();

        assert_eq!(path, dir.path().join("a.jpg"));
        assert!(fetcher.calls.borrow().is_empty());
        assert_eq!(fs::read(path).unwrap(), b"cached");
    }

    #[test]
    fn test_downloaded_bytes_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FakeFetcher {
            calls: RefCell::new(Vec::new()),
            response: Some(b"fresh".to_vec()),
        };

        let path = maybe_download("https://host/b.jpg", dir.path(), &fetcher).unwrap();

        assert_eq!(*fetcher.calls.borrow(), vec!["https://host/b.jpg"]);
        assert_eq!(fs::read(path).unwrap(), b"fresh");
    }

    #[test]
    fn test_failed_download_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FakeFetcher {
            calls: RefCell::new(Vec::new()),
            response: None,
        };

        let result = maybe_download("http://host/c.jpg", dir.path(), &fetcher);

        assert!(matches!(result, Err(ImportError::Download { .. })));
        assert!(!dir.path().join("c.jpg").exists());
    }

    #[test]
    fn test_local_path_is_copied() {
        let source = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let original = source.path().join("d.jpg");
        fs::write(&original, b"local").unwrap();
        let fetcher = FakeFetcher {
            calls: RefCell::new(Vec::new()),
            response: None,
        };

        let path =
            maybe_download(original.to_str().unwrap(), cache.path(), &fetcher).unwrap();

        assert_eq!(path, cache.path().join("d.jpg"));
        assert!(fetcher.calls.borrow().is_empty());
        assert_eq!(fs::read(path).unwrap(), b"local");
    }
}
