//! Composite operations: pasting, batched pastes, and color overlays.

use futures_util::future::try_join_all;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};

use crate::color::{Color, ColorSpec};
use crate::error::{PictorError, Result, TransformError};
use crate::handle::{ImageHandle, ImageOpener};
use crate::source::ImageSource;

impl ImageHandle {
    /// Paste `overlay` at `(left, top)` on a copy of the image, alpha-blended.
    pub fn paste(&self, overlay: &ImageHandle, left: i64, top: i64) -> ImageHandle {
        let mut canvas = self.as_dynamic().to_rgba8();
        imageops::overlay(&mut canvas, &overlay.as_dynamic().to_rgba8(), left, top);
        ImageHandle::from_dynamic(DynamicImage::ImageRgba8(canvas))
    }

    /// Fit the image inside a transparent `width` x `height` canvas,
    /// centered, preserving aspect ratio.
    pub fn contain(
        &self,
        width: u32,
        height: u32,
    ) -> std::result::Result<ImageHandle, TransformError> {
        if width == 0 || height == 0 {
            return Err(TransformError::InvalidDimensions { width, height });
        }
        let scaled = self.as_dynamic().resize(width, height, FilterType::Lanczos3);
        let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
        let x = i64::from((width - scaled.width()) / 2);
        let y = i64::from((height - scaled.height()) / 2);
        imageops::overlay(&mut canvas, &scaled.to_rgba8(), x, y);
        Ok(ImageHandle::from_dynamic(DynamicImage::ImageRgba8(canvas)))
    }

    /// Shift the image's perceptual average color toward `color`.
    ///
    /// Builds a `width` x `height` canvas of the target color, fades it to
    /// half opacity, fits the image to the canvas size, and pastes the faded
    /// canvas on top. A fully transparent target would make the overlay a
    /// no-op, so it is substituted with near-opaque white first.
    pub fn colorify(
        &self,
        width: u32,
        height: u32,
        color: impl Into<ColorSpec>,
    ) -> std::result::Result<ImageHandle, TransformError> {
        let mut color = match color.into() {
            ColorSpec::Rgb(color) => color,
            ColorSpec::Hex(hex) => {
                Color::from_hex(&hex).ok_or(TransformError::InvalidColor { value: hex })?
            }
        };
        if color.is_transparent() {
            color = Color::rgba(255, 255, 255, 80);
        }

        let overlay = ImageHandle::create(width, height, color)?.fade(0.5)?;
        let contained = self.contain(width, height)?;
        Ok(contained.paste(&overlay, 0, 0))
    }
}

/// One overlay of a batched composite.
#[derive(Debug, Clone)]
pub struct PasteItem {
    pub source: ImageSource,
    pub left: i64,
    pub top: i64,
}

impl PasteItem {
    pub fn new(source: impl Into<ImageSource>, left: i64, top: i64) -> Self {
        Self {
            source: source.into(),
            left,
            top,
        }
    }
}

/// Accumulates paste instructions against one exclusive working copy.
///
/// Nothing is drawn until [`commit`](PasteBatch::commit); the working copy
/// is owned by the batch, so no partially composited image is ever
/// observable from outside.
pub struct PasteBatch {
    base: ImageHandle,
    ops: Vec<(ImageHandle, i64, i64)>,
}

impl PasteBatch {
    /// Start a batch over a private copy of `base`.
    pub fn new(base: &ImageHandle) -> Self {
        Self {
            base: base.clone(),
            ops: Vec::new(),
        }
    }

    /// Queue a paste of `overlay` at `(left, top)`.
    pub fn push(&mut self, overlay: ImageHandle, left: i64, top: i64) -> &mut Self {
        self.ops.push((overlay, left, top));
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply all queued pastes in submission order and return the result.
    pub fn commit(self) -> ImageHandle {
        let mut canvas = self.base.into_dynamic().to_rgba8();
        for (overlay, left, top) in self.ops {
            imageops::overlay(&mut canvas, &overlay.into_dynamic().to_rgba8(), left, top);
        }
        ImageHandle::from_dynamic(DynamicImage::ImageRgba8(canvas))
    }
}

/// Batched composite over independently sourced overlays.
///
/// Overlays are opened concurrently (each decode is independent), but the
/// paste instructions commit in list order against a single working copy.
pub async fn composite(
    opener: &ImageOpener,
    base: &ImageHandle,
    items: Vec<PasteItem>,
) -> Result<ImageHandle> {
    let overlays = try_join_all(items.into_iter().map(|item| async move {
        let handle = opener.open(item.source).await?;
        Ok::<_, PictorError>((handle, item.left, item.top))
    }))
    .await?;

    let mut batch = PasteBatch::new(base);
    for (overlay, left, top) in overlays {
        batch.push(overlay, left, top);
    }
    tracing::trace!(pastes = batch.len(), "committing composite batch");
    Ok(batch.commit())
}
