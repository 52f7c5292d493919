//! Source resolution: turn any image source into raw bytes plus a format.
//!
//! A source can be a filesystem path, a storage key, a remote URL, raw
//! bytes, or an already-open handle. The enum tag is the explicit source
//! kind; resolution never retries.

use image::ImageFormat;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::LimitsConfig;
use crate::error::SourceError;
use crate::handle::ImageHandle;
use crate::storage::Storage;

/// A description of where image bytes come from. Exactly one tag is active.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// A local filesystem path
    Path(PathBuf),

    /// A key in the storage collaborator
    StorageKey(String),

    /// A remote URL fetched over HTTP
    Url(String),

    /// Raw image bytes already in memory
    Bytes(Vec<u8>),

    /// An already-decoded handle; resolution passes it through untouched
    Handle(ImageHandle),
}

impl ImageSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        ImageSource::Path(path.into())
    }

    pub fn storage_key(key: impl Into<String>) -> Self {
        ImageSource::StorageKey(key.into())
    }

    pub fn url(url: impl Into<String>) -> Self {
        ImageSource::Url(url.into())
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        ImageSource::Bytes(bytes)
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::Path(path)
    }
}

impl From<ImageHandle> for ImageSource {
    fn from(handle: ImageHandle) -> Self {
        ImageSource::Handle(handle)
    }
}

/// The outcome of resolving a source.
#[derive(Debug, Clone)]
pub enum Resolved {
    /// Raw bytes plus the detected or inferred format
    Bytes { bytes: Vec<u8>, format: ImageFormat },

    /// The source was already an open handle
    Handle(ImageHandle),
}

/// Resolves [`ImageSource`] values into bytes.
pub struct SourceResolver {
    storage: Arc<dyn Storage>,
    http: reqwest::Client,
    fetch_timeout: Duration,
}

impl SourceResolver {
    pub fn new(storage: Arc<dyn Storage>, limits: &LimitsConfig) -> Self {
        Self {
            storage,
            http: reqwest::Client::new(),
            fetch_timeout: Duration::from_millis(limits.fetch_timeout_ms),
        }
    }

    /// Resolve a source into bytes plus a format.
    ///
    /// Bytes are sniffed; paths and storage keys infer the format from their
    /// name; URLs prefer the `Content-Type` response header. Already-open
    /// handles pass through unchanged.
    pub async fn resolve(&self, source: ImageSource) -> Result<Resolved, SourceError> {
        match source {
            ImageSource::Handle(handle) => Ok(Resolved::Handle(handle)),
            ImageSource::Bytes(bytes) => {
                let format = sniff_format(&bytes);
                Ok(Resolved::Bytes { bytes, format })
            }
            ImageSource::Path(path) => {
                let bytes = tokio::fs::read(&path).await.map_err(|source| {
                    SourceError::Read {
                        path: path.clone(),
                        source,
                    }
                })?;
                let format = format_from_name(&path.to_string_lossy());
                Ok(Resolved::Bytes { bytes, format })
            }
            ImageSource::StorageKey(key) => {
                let bytes =
                    self.storage
                        .get_file(&key)
                        .await
                        .map_err(|source| SourceError::Storage {
                            key: key.clone(),
                            source,
                        })?;
                let format = format_from_name(&key);
                Ok(Resolved::Bytes { bytes, format })
            }
            ImageSource::Url(url) => self.fetch(&url).await,
        }
    }

    async fn fetch(&self, url: &str) -> Result<Resolved, SourceError> {
        tracing::debug!(url, "fetching remote image");
        let response = self
            .http
            .get(url)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|source| SourceError::Fetch {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await.map_err(|source| SourceError::Fetch {
            url: url.to_string(),
            source,
        })?;

        if !status.is_success() {
            // The body is the error payload, not an image
            return Err(SourceError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let format = match content_type {
            Some(content_type) => format_from_content_type(&content_type),
            None => sniff_format(&body),
        };
        Ok(Resolved::Bytes {
            bytes: body.to_vec(),
            format,
        })
    }
}

/// Infer an image format from a file or key name.
///
/// Query-string suffixes are stripped and `jpeg` normalizes to JPEG; a
/// missing or unknown extension defaults to JPEG.
pub fn format_from_name(name: &str) -> ImageFormat {
    let name = name.split('?').next().unwrap_or(name);
    let ext = match name.rfind('.') {
        Some(idx) => &name[idx + 1..],
        None => "",
    };
    ImageFormat::from_extension(ext.to_ascii_lowercase().as_str()).unwrap_or(ImageFormat::Jpeg)
}

/// Derive a format from a `Content-Type` header value like `image/png`.
fn format_from_content_type(content_type: &str) -> ImageFormat {
    let subtype = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .rsplit('/')
        .next()
        .unwrap_or("");
    format_from_name(&format!(".{subtype}"))
}

/// Detect a format by content sniffing, defaulting to JPEG.
pub fn sniff_format(bytes: &[u8]) -> ImageFormat {
    image::guess_format(bytes).unwrap_or(ImageFormat::Jpeg)
}

/// The canonical extension for a format; JPEG is spelled `jpg`.
pub fn extension_for(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpg",
        ImageFormat::Png => "png",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif => "gif",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Tiff => "tiff",
        _ => "jpg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, WriteRequest};

    #[test]
    fn test_format_from_name() {
        assert_eq!(format_from_name("photo.jpeg"), ImageFormat::Jpeg);
        assert_eq!(format_from_name("photo.jpg"), ImageFormat::Jpeg);
        assert_eq!(format_from_name("photo.PNG"), ImageFormat::Png);
        assert_eq!(format_from_name("photo.png?width=200"), ImageFormat::Png);
        assert_eq!(format_from_name("no_extension"), ImageFormat::Jpeg);
        assert_eq!(format_from_name("weird.xyz"), ImageFormat::Jpeg);
    }

    #[test]
    fn test_format_from_content_type() {
        assert_eq!(format_from_content_type("image/png"), ImageFormat::Png);
        assert_eq!(
            format_from_content_type("image/jpeg; charset=binary"),
            ImageFormat::Jpeg
        );
        assert_eq!(format_from_content_type("text/html"), ImageFormat::Jpeg);
    }

    #[test]
    fn test_sniff_format() {
        let png_magic = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        assert_eq!(sniff_format(&png_magic), ImageFormat::Png);
        assert_eq!(sniff_format(b"definitely not an image"), ImageFormat::Jpeg);
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for(ImageFormat::Jpeg), "jpg");
        assert_eq!(extension_for(ImageFormat::Png), "png");
    }

    fn test_resolver(storage: Arc<MemoryStorage>) -> SourceResolver {
        SourceResolver::new(storage, &LimitsConfig::default())
    }

    #[tokio::test]
    async fn test_resolve_bytes_sniffs_format() {
        let resolver = test_resolver(Arc::new(MemoryStorage::new()));
        let png_magic = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        match resolver
            .resolve(ImageSource::Bytes(png_magic.clone()))
            .await
            .unwrap()
        {
            Resolved::Bytes { bytes, format } => {
                assert_eq!(bytes, png_magic);
                assert_eq!(format, ImageFormat::Png);
            }
            Resolved::Handle(_) => panic!("expected bytes"),
        }
    }

    #[tokio::test]
    async fn test_resolve_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        std::fs::write(&path, [1, 2, 3]).unwrap();

        let resolver = test_resolver(Arc::new(MemoryStorage::new()));
        match resolver.resolve(ImageSource::path(&path)).await.unwrap() {
            Resolved::Bytes { bytes, format } => {
                assert_eq!(bytes, vec![1, 2, 3]);
                assert_eq!(format, ImageFormat::Png);
            }
            Resolved::Handle(_) => panic!("expected bytes"),
        }
    }

    #[tokio::test]
    async fn test_resolve_missing_path_is_source_error() {
        let resolver = test_resolver(Arc::new(MemoryStorage::new()));
        let result = resolver
            .resolve(ImageSource::path("/definitely/not/here.jpg"))
            .await;
        assert!(matches!(result, Err(SourceError::Read { .. })));
    }

    #[tokio::test]
    async fn test_resolve_storage_key() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .write_file(WriteRequest::exact("pic.jpeg", vec![7, 7]))
            .await
            .unwrap();

        let resolver = test_resolver(Arc::clone(&storage));
        match resolver
            .resolve(ImageSource::storage_key("pic.jpeg"))
            .await
            .unwrap()
        {
            Resolved::Bytes { bytes, format } => {
                assert_eq!(bytes, vec![7, 7]);
                assert_eq!(format, ImageFormat::Jpeg);
            }
            Resolved::Handle(_) => panic!("expected bytes"),
        }

        let missing = resolver.resolve(ImageSource::storage_key("gone.jpg")).await;
        assert!(matches!(missing, Err(SourceError::Storage { .. })));
    }
}
