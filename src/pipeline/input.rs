//! Page-image resolution: turn a page's image locator into a [`PageImage`].
//!
//! Three locator kinds are accepted:
//!
//! * `data:<mime>;base64,<payload>` - forwarded verbatim, never decoded
//! * `http://` / `https://` - downloaded with `reqwest` under a timeout
//! * anything else - a file path, relative paths resolved against the
//!   document's directory
//!
//! Downloaded and local bytes go through [`encode::encode_image_bytes`] on a
//! blocking thread, since decoding and resizing are CPU-bound.

use crate::document::PageItem;
use crate::error::ImageLoadError;
use crate::pipeline::encode;
use crate::vision::PageImage;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Classified image locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageLocator<'a> {
    DataUri(&'a str),
    Url(&'a str),
    Path(PathBuf),
}

/// Check if the locator looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

pub fn classify_locator<'a>(uri: &'a str, base_dir: Option<&Path>) -> ImageLocator<'a> {
    if uri.starts_with("data:") {
        return ImageLocator::DataUri(uri);
    }
    if is_url(uri) {
        return ImageLocator::Url(uri);
    }
    let raw = uri.strip_prefix("file://").unwrap_or(uri);
    let path = PathBuf::from(raw);
    match base_dir {
        Some(dir) if path.is_relative() => ImageLocator::Path(dir.join(path)),
        _ => ImageLocator::Path(path),
    }
}

/// Split a base64 data URI into a [`PageImage`] without decoding it.
pub fn parse_data_uri(uri: &str) -> Result<PageImage, ImageLoadError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| ImageLoadError::InvalidDataUri("missing 'data:' prefix".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| ImageLoadError::InvalidDataUri("missing ',' separator".into()))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| ImageLoadError::InvalidDataUri("only base64 payloads are supported".into()))?;
    if payload.is_empty() {
        return Err(ImageLoadError::InvalidDataUri("empty payload".into()));
    }
    let mime = if mime.is_empty() { "image/png" } else { mime };
    Ok(PageImage::new(payload, mime))
}

/// Loads page images for one document.
#[derive(Debug, Clone)]
pub struct ImageLoader {
    client: reqwest::Client,
    base_dir: Option<PathBuf>,
    max_dimension: u32,
}

impl ImageLoader {
    pub fn new(
        base_dir: Option<PathBuf>,
        download_timeout_secs: u64,
        max_dimension: u32,
    ) -> Result<Self, ImageLoadError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(download_timeout_secs))
            .build()
            .map_err(|e| ImageLoadError::DownloadFailed {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_dir,
            max_dimension,
        })
    }

    /// Resolve the image of `page`.
    pub async fn load(&self, page: &PageItem) -> Result<PageImage, ImageLoadError> {
        let uri = page
            .image
            .as_ref()
            .map(|i| i.uri.as_str())
            .filter(|u| !u.is_empty())
            .ok_or(ImageLoadError::MissingLocator)?;

        let bytes = match classify_locator(uri, self.base_dir.as_deref()) {
            ImageLocator::DataUri(uri) => return parse_data_uri(uri),
            ImageLocator::Url(url) => self.download(url).await?,
            ImageLocator::Path(path) => read_local(&path).await?,
        };

        let max_dimension = self.max_dimension;
        tokio::task::spawn_blocking(move || encode::encode_image_bytes(&bytes, max_dimension))
            .await
            .map_err(|e| ImageLoadError::Decode(format!("encoder task failed: {e}")))?
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ImageLoadError> {
        debug!("Downloading page image: {}", url);
        let failed = |reason: String| ImageLoadError::DownloadFailed {
            url: url.to_string(),
            reason,
        };

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                failed("timed out".to_string())
            } else {
                failed(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())));
        }

        let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

async fn read_local(path: &Path) -> Result<Vec<u8>, ImageLoadError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ImageLoadError::FileNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(ImageLoadError::ReadFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        }),
    }
}
