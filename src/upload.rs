//! Upload pipelines: single resized variants and the three-variant flow.
//!
//! The full flow orients the image, persists the corrected full-size bytes,
//! and derives a medium and a small variant concurrently. The three writes
//! are independent; a failure in any one fails the whole upload.

use image::ImageFormat;
use std::sync::Arc;

use crate::color::Color;
use crate::config::Config;
use crate::error::{PictorError, Result};
use crate::exif::{correct_orientation, OrientedImage};
use crate::handle::{EncodeOptions, ImageHandle, ImageOpener};
use crate::source::{extension_for, format_from_name, ImageSource, SourceResolver};
use crate::storage::{Storage, StoredFile, WriteRequest};
use crate::types::{Orientation, UploadResult};

/// Filename used when the caller does not provide one.
pub const DEFAULT_UPLOAD_NAME: &str = "uploaded_picture.jpg";

const DEFAULT_VARIANT_SIZE: u32 = 250;

/// What to upload and how to derive the variant.
///
/// There is no per-upload destination: the storage backend is chosen once,
/// at [`Uploader`] construction.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub source: ImageSource,

    /// Requested filename; the stored name gets a timestamp and a
    /// normalized extension
    pub filename: String,

    /// Target width of the variant
    pub size: u32,

    /// Convert through an intermediate low-quality JPEG first
    pub compress_to_jpeg: bool,

    /// Final encode quality; `None` uses the configured default
    pub quality: Option<u8>,
}

impl UploadOptions {
    pub fn new(source: impl Into<ImageSource>, filename: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            filename: filename.into(),
            size: DEFAULT_VARIANT_SIZE,
            compress_to_jpeg: false,
            quality: None,
        }
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    pub fn jpeg(mut self) -> Self {
        self.compress_to_jpeg = true;
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }
}

/// Rewrite a filename's extension to the canonical one for `format`.
///
/// `photo.jpeg` becomes `photo.jpg`; a bare name gains an extension.
fn normalized_filename(filename: &str, format: ImageFormat) -> String {
    let stem = match filename.rfind('.') {
        Some(idx) => &filename[..idx],
        None => filename,
    };
    format!("{stem}.{}", extension_for(format))
}

/// Runs the upload pipelines against one storage collaborator.
pub struct Uploader {
    opener: ImageOpener,
    storage: Arc<dyn Storage>,
    config: Config,
}

impl Uploader {
    pub fn new(storage: Arc<dyn Storage>, config: Config) -> Self {
        let resolver = SourceResolver::new(Arc::clone(&storage), &config.limits);
        let opener = ImageOpener::new(resolver, config.limits.clone());
        Self {
            opener,
            storage,
            config,
        }
    }

    pub fn opener(&self) -> &ImageOpener {
        &self.opener
    }

    /// Re-encode any source as JPEG at `quality`, optionally resized to
    /// `new_width` while preserving aspect ratio.
    pub async fn convert_to_jpeg(
        &self,
        source: ImageSource,
        quality: u8,
        new_width: Option<u32>,
    ) -> Result<Vec<u8>> {
        let handle = self.opener.open(source).await?;
        let handle = match new_width {
            Some(width) => handle.resize_same_ratio(width)?,
            None => handle,
        };
        handle
            .encode(ImageFormat::Jpeg, EncodeOptions::quality(quality))
            .await
    }

    /// Derive one resized variant and persist it.
    ///
    /// The compress path converts through an intermediate JPEG at the
    /// configured convert quality and stores a `.jpg`; otherwise the
    /// variant keeps the format implied by the requested filename.
    pub async fn upload_variant(&self, options: UploadOptions) -> Result<StoredFile> {
        let quality = options.quality.unwrap_or(self.config.variants.encode_quality);

        let (variant, format) = if options.compress_to_jpeg {
            let jpeg = self
                .convert_to_jpeg(
                    options.source,
                    self.config.variants.convert_quality,
                    Some(options.size),
                )
                .await?;
            let handle = self.opener.decode(jpeg, Some(ImageFormat::Jpeg)).await?;
            (handle, ImageFormat::Jpeg)
        } else {
            let handle = self.opener.open(options.source).await?;
            (
                handle.resize_same_ratio(options.size)?,
                format_from_name(&options.filename),
            )
        };

        let bytes = variant.encode(format, EncodeOptions::quality(quality)).await?;
        let filename = normalized_filename(&options.filename, format);
        tracing::debug!(filename = %filename, size = options.size, "storing variant");
        let stored = self
            .storage
            .write_file(WriteRequest::new(filename, bytes))
            .await?;
        Ok(stored)
    }

    /// Orient an image, store it full size, and derive the medium and small
    /// variants, all three writes running concurrently.
    ///
    /// Everything this flow stores is JPEG regardless of the source format
    /// or the requested filename's extension; the variants go through the
    /// compress path at the configured convert quality.
    pub async fn upload_with_variants(
        &self,
        source: ImageSource,
        filename: Option<String>,
    ) -> Result<UploadResult> {
        let filename = filename.unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());
        let OrientedImage { handle, exif } = correct_orientation(&self.opener, source).await?;
        let orientation = Orientation::from_dimensions(handle.width(), handle.height());

        let main_bytes = handle
            .encode(
                ImageFormat::Jpeg,
                EncodeOptions::quality(self.config.variants.encode_quality),
            )
            .await?;
        let main_name = normalized_filename(&filename, ImageFormat::Jpeg);

        let medium = UploadOptions::new(main_bytes.clone(), filename.as_str())
            .size(self.config.variants.medium_size)
            .jpeg();
        let small = UploadOptions::new(main_bytes.clone(), filename.as_str())
            .size(self.config.variants.small_size)
            .jpeg();

        let main_write = async {
            let stored = self
                .storage
                .write_file(WriteRequest::new(main_name, main_bytes))
                .await?;
            Ok::<_, PictorError>(stored)
        };
        let (main, medium, small) = tokio::try_join!(
            main_write,
            self.upload_variant(medium),
            self.upload_variant(small)
        )?;

        tracing::debug!(
            main = %main.filename,
            medium = %medium.filename,
            small = %small.filename,
            "upload complete"
        );
        Ok(UploadResult {
            main_key: main.filename,
            medium_key: medium.filename,
            small_key: small.filename,
            orientation,
            exif,
        })
    }

    /// Create a transparent canvas and store it as a PNG.
    pub async fn upload_blank_image(
        &self,
        width: u32,
        height: u32,
        filename: &str,
    ) -> Result<StoredFile> {
        let bytes = new_image_bytes(width, height).await?;
        let stored = self
            .storage
            .write_file(WriteRequest::new(filename, bytes))
            .await?;
        Ok(stored)
    }
}

/// PNG bytes of a transparent white canvas.
pub async fn new_image_bytes(width: u32, height: u32) -> Result<Vec<u8>> {
    let canvas = ImageHandle::create(width, height, Color::rgba(255, 255, 255, 0))?;
    canvas.encode(ImageFormat::Png, EncodeOptions::default()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::test_util::gradient;

    fn test_uploader() -> (Uploader, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let uploader = Uploader::new(storage.clone(), Config::default());
        (uploader, storage)
    }

    async fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        gradient(width, height)
            .encode(ImageFormat::Png, EncodeOptions::default())
            .await
            .unwrap()
    }

    #[test]
    fn test_normalized_filename() {
        assert_eq!(
            normalized_filename("photo.jpeg", ImageFormat::Jpeg),
            "photo.jpg"
        );
        assert_eq!(
            normalized_filename("photo.png", ImageFormat::Png),
            "photo.png"
        );
        assert_eq!(normalized_filename("noext", ImageFormat::Jpeg), "noext.jpg");
    }

    #[tokio::test]
    async fn test_upload_variant_resizes() {
        let (uploader, storage) = test_uploader();
        let source = png_bytes(800, 600).await;

        let stored = uploader
            .upload_variant(UploadOptions::new(source, "photo.png").size(200))
            .await
            .unwrap();
        assert!(stored.filename.ends_with(".png"));

        let bytes = storage.get_file(&stored.filename).await.unwrap();
        let variant = uploader
            .opener()
            .open(ImageSource::Bytes(bytes))
            .await
            .unwrap();
        assert_eq!(variant.dimensions(), (200, 150));
    }

    #[tokio::test]
    async fn test_upload_variant_compress_path_stores_jpg() {
        let (uploader, storage) = test_uploader();
        let source = png_bytes(400, 400).await;

        let stored = uploader
            .upload_variant(UploadOptions::new(source, "photo.png").size(100).jpeg())
            .await
            .unwrap();
        assert!(stored.filename.ends_with(".jpg"));

        let bytes = storage.get_file(&stored.filename).await.unwrap();
        let variant = uploader
            .opener()
            .open(ImageSource::Bytes(bytes))
            .await
            .unwrap();
        assert_eq!(variant.dimensions(), (100, 100));
    }

    #[tokio::test]
    async fn test_convert_to_jpeg_quality_ordering() {
        let (uploader, _) = test_uploader();
        let source = png_bytes(256, 256).await;

        let high = uploader
            .convert_to_jpeg(ImageSource::Bytes(source.clone()), 90, None)
            .await
            .unwrap();
        let low = uploader
            .convert_to_jpeg(ImageSource::Bytes(source), 20, None)
            .await
            .unwrap();
        assert!(high.len() > low.len());
    }

    #[tokio::test]
    async fn test_upload_with_variants() {
        let (uploader, storage) = test_uploader();
        let source = png_bytes(800, 600).await;

        let result = uploader
            .upload_with_variants(ImageSource::Bytes(source), Some("trip.jpg".to_string()))
            .await
            .unwrap();

        assert_eq!(result.orientation, Orientation::Landscape);
        assert!(result.exif.is_none());
        assert_eq!(storage.len().await, 3);
        assert_ne!(result.main_key, result.medium_key);
        assert_ne!(result.medium_key, result.small_key);
        assert_ne!(result.main_key, result.small_key);

        let medium_bytes = storage.get_file(&result.medium_key).await.unwrap();
        let medium = uploader
            .opener()
            .open(ImageSource::Bytes(medium_bytes))
            .await
            .unwrap();
        assert_eq!(medium.dimensions(), (400, 300));

        let small_bytes = storage.get_file(&result.small_key).await.unwrap();
        let small = uploader
            .opener()
            .open(ImageSource::Bytes(small_bytes))
            .await
            .unwrap();
        assert_eq!(small.width(), 150);
    }

    #[tokio::test]
    async fn test_upload_with_variants_stores_jpeg_for_png_name() {
        let (uploader, storage) = test_uploader();
        let source = png_bytes(800, 600).await;

        let result = uploader
            .upload_with_variants(ImageSource::Bytes(source), Some("photo.png".to_string()))
            .await
            .unwrap();

        for key in [&result.main_key, &result.medium_key, &result.small_key] {
            assert!(key.ends_with(".jpg"), "key {key} should be .jpg");
            let bytes = storage.get_file(key).await.unwrap();
            assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
        }
    }

    #[tokio::test]
    async fn test_upload_with_variants_defaults_filename() {
        let (uploader, _) = test_uploader();
        let source = png_bytes(100, 200).await;

        let result = uploader
            .upload_with_variants(ImageSource::Bytes(source), None)
            .await
            .unwrap();
        assert!(result.main_key.starts_with("uploaded_picture"));
        assert!(result.main_key.ends_with(".jpg"));
        assert_eq!(result.orientation, Orientation::Portrait);
    }

    #[tokio::test]
    async fn test_new_image_bytes_is_transparent_png() {
        let (uploader, _) = test_uploader();
        let bytes = new_image_bytes(40, 30).await.unwrap();
        let canvas = uploader
            .opener()
            .open(ImageSource::Bytes(bytes))
            .await
            .unwrap();
        assert_eq!(canvas.dimensions(), (40, 30));
        assert_eq!(canvas.pixel_at(0, 0).a, Some(0));
    }
}
