//! Decoded image handles and the opener that produces them.
//!
//! An [`ImageHandle`] owns its pixel data; cloning one yields a fully
//! independent copy, so transforms never alias a shared working image.
//! Decoding and encoding are CPU-bound and run under `spawn_blocking`, with
//! decodes additionally guarded by a timeout and a dimension limit.

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::fmt;
use std::io::Cursor;
use std::time::Duration;
use tokio::time::timeout;

use crate::color::{alpha_to_100, alpha_to_255, Color};
use crate::config::LimitsConfig;
use crate::error::{DecodeError, Result, TransformError};
use crate::source::{extension_for, ImageSource, Resolved, SourceResolver};

/// An owned decoded image.
#[derive(Clone)]
pub struct ImageHandle {
    image: DynamicImage,
}

impl ImageHandle {
    pub(crate) fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    pub(crate) fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub(crate) fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    /// Image width in pixels; always positive.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Image height in pixels; always positive.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    /// Width divided by height.
    pub fn width_height_ratio(&self) -> f64 {
        f64::from(self.width()) / f64::from(self.height())
    }

    /// The color at `(x, y)`, with alpha rescaled to the 0-100 convention.
    ///
    /// Coordinates are zero-based and must be inside the image.
    pub fn pixel_at(&self, x: u32, y: u32) -> Color {
        use image::GenericImageView;
        let Rgba([r, g, b, a]) = self.image.get_pixel(x, y);
        Color::rgba(r, g, b, alpha_to_100(a))
    }

    /// A blank canvas of the given size filled with `color`.
    ///
    /// An absent alpha counts as fully opaque.
    pub fn create(
        width: u32,
        height: u32,
        color: Color,
    ) -> std::result::Result<Self, TransformError> {
        if width == 0 || height == 0 {
            return Err(TransformError::InvalidDimensions { width, height });
        }
        let pixel = Rgba([
            color.r,
            color.g,
            color.b,
            alpha_to_255(color.a.unwrap_or(100)),
        ]);
        Ok(Self::from_dynamic(DynamicImage::ImageRgba8(
            RgbaImage::from_pixel(width, height, pixel),
        )))
    }

    /// Re-encode the image to `format`.
    ///
    /// JPEG honors the quality option and drops alpha; other formats encode
    /// losslessly and ignore it.
    pub async fn encode(&self, format: ImageFormat, options: EncodeOptions) -> Result<Vec<u8>> {
        let image = self.image.clone();
        let encoded = tokio::task::spawn_blocking(move || encode_sync(&image, format, options))
            .await
            .map_err(|e| DecodeError::Task {
                message: e.to_string(),
            })?;
        Ok(encoded?)
    }
}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHandle")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

impl From<DynamicImage> for ImageHandle {
    fn from(image: DynamicImage) -> Self {
        Self::from_dynamic(image)
    }
}

impl From<ImageHandle> for DynamicImage {
    fn from(handle: ImageHandle) -> Self {
        handle.into_dynamic()
    }
}

/// Options for re-encoding a handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeOptions {
    /// JPEG quality (1-100). `None` uses the codec default.
    pub quality: Option<u8>,
}

impl EncodeOptions {
    pub fn quality(quality: u8) -> Self {
        Self {
            quality: Some(quality),
        }
    }
}

fn encode_sync(
    image: &DynamicImage,
    format: ImageFormat,
    options: EncodeOptions,
) -> std::result::Result<Vec<u8>, DecodeError> {
    let mut buffer = Cursor::new(Vec::new());
    let result = match (format, options.quality) {
        (ImageFormat::Jpeg, Some(quality)) => {
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
            // JPEG has no alpha channel
            image.to_rgb8().write_with_encoder(encoder)
        }
        (ImageFormat::Jpeg, None) => {
            let encoder = image::codecs::jpeg::JpegEncoder::new(&mut buffer);
            image.to_rgb8().write_with_encoder(encoder)
        }
        _ => image.write_to(&mut buffer, format),
    };
    result.map_err(|e| DecodeError::Encode {
        format: extension_for(format).to_string(),
        message: e.to_string(),
    })?;
    Ok(buffer.into_inner())
}

/// Produces decoded handles from any [`ImageSource`].
pub struct ImageOpener {
    resolver: SourceResolver,
    limits: LimitsConfig,
}

impl ImageOpener {
    pub fn new(resolver: SourceResolver, limits: LimitsConfig) -> Self {
        Self { resolver, limits }
    }

    pub fn resolver(&self) -> &SourceResolver {
        &self.resolver
    }

    /// Open a source into a decoded handle.
    ///
    /// Idempotent: an already-open handle comes back as-is. Raw bytes decode
    /// with a sniffed format; every other source resolves to bytes first.
    pub async fn open(&self, source: ImageSource) -> Result<ImageHandle> {
        match self.resolver.resolve(source).await? {
            Resolved::Handle(handle) => Ok(handle),
            Resolved::Bytes { bytes, format } => self.decode(bytes, Some(format)).await,
        }
    }

    /// Open with an explicit format hint, overriding name-based inference.
    pub async fn open_with_format(
        &self,
        source: ImageSource,
        format: ImageFormat,
    ) -> Result<ImageHandle> {
        match self.resolver.resolve(source).await? {
            Resolved::Handle(handle) => Ok(handle),
            Resolved::Bytes { bytes, .. } => self.decode(bytes, Some(format)).await,
        }
    }

    /// Decode bytes under the configured timeout and dimension guard.
    ///
    /// Content sniffing wins over `format_hint`; the hint only applies when
    /// the bytes themselves are ambiguous.
    pub async fn decode(
        &self,
        bytes: Vec<u8>,
        format_hint: Option<ImageFormat>,
    ) -> Result<ImageHandle> {
        let timeout_ms = self.limits.decode_timeout_ms;
        let max_dim = self.limits.max_image_dimension;

        let decoded = timeout(
            Duration::from_millis(timeout_ms),
            tokio::task::spawn_blocking(move || decode_sync(bytes, format_hint)),
        )
        .await;

        match decoded {
            Ok(Ok(Ok(handle))) => {
                let (width, height) = handle.dimensions();
                if width > max_dim || height > max_dim {
                    return Err(DecodeError::TooLarge {
                        width,
                        height,
                        max_dim,
                    }
                    .into());
                }
                tracing::trace!(width, height, "decoded image");
                Ok(handle)
            }
            Ok(Ok(Err(e))) => Err(e.into()),
            Ok(Err(e)) => Err(DecodeError::Task {
                message: e.to_string(),
            }
            .into()),
            Err(_) => Err(DecodeError::Timeout { timeout_ms }.into()),
        }
    }
}

fn decode_sync(
    bytes: Vec<u8>,
    format_hint: Option<ImageFormat>,
) -> std::result::Result<ImageHandle, DecodeError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::Decode {
            message: format!("cannot sniff image format: {e}"),
        })?;

    let reader = match (reader.format(), format_hint) {
        (Some(_), _) => reader,
        (None, Some(hint)) => {
            let mut reader = reader;
            reader.set_format(hint);
            reader
        }
        (None, None) => return Err(DecodeError::UnknownFormat),
    };

    let image = reader.decode().map_err(|e| DecodeError::Decode {
        message: e.to_string(),
    })?;
    Ok(ImageHandle::from_dynamic(image))
}
