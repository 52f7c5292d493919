//! Geometry transforms over decoded image handles.
//!
//! Every operation takes its input handle explicitly and returns a fresh
//! one; nothing mutates in place. Crop rectangles use 1-based,
//! edge-inclusive coordinates throughout.

pub mod composite;

pub use composite::{composite, PasteBatch, PasteItem};

use image::imageops::FilterType;
use image::DynamicImage;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

use crate::error::TransformError;
use crate::handle::ImageHandle;

type Result<T> = std::result::Result<T, TransformError>;

/// A 1-based, edge-inclusive crop rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropRect {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle anchored at the top-left corner `(1,1)`.
    pub fn to(right: u32, bottom: u32) -> Self {
        Self::new(1, 1, right, bottom)
    }

    pub fn width(&self) -> u32 {
        self.right - self.left + 1
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top + 1
    }
}

/// Which corner (or the center) a square crop keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SquareAnchor {
    #[default]
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl SquareAnchor {
    /// Parse an anchor name; anything unrecognized falls back to `Center`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "topleft" => SquareAnchor::TopLeft,
            "topright" => SquareAnchor::TopRight,
            "bottomleft" => SquareAnchor::BottomLeft,
            "bottomright" => SquareAnchor::BottomRight,
            _ => SquareAnchor::Center,
        }
    }
}

/// Mirror axis; `Y` flips left-right, `X` flips top-bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MirrorAxis {
    X,
    #[default]
    Y,
}

impl ImageHandle {
    /// Resize to `new_width`, recomputing the height from the original
    /// aspect ratio: `new_height = floor(height / width * new_width)`.
    pub fn resize_same_ratio(&self, new_width: u32) -> Result<ImageHandle> {
        if new_width == 0 {
            return Err(TransformError::ZeroWidth);
        }
        let (width, height) = self.dimensions();
        let new_height =
            (f64::from(height) / f64::from(width) * f64::from(new_width)).floor() as u32;
        if new_height == 0 {
            return Err(TransformError::InvalidDimensions {
                width: new_width,
                height: new_height,
            });
        }
        Ok(ImageHandle::from_dynamic(self.as_dynamic().resize_exact(
            new_width,
            new_height,
            FilterType::Lanczos3,
        )))
    }

    /// Scale width and height by independent ratios, rounding each
    /// dimension to the nearest pixel.
    pub fn scale(&self, w_ratio: f64, h_ratio: f64) -> Result<ImageHandle> {
        if !(w_ratio > 0.0 && w_ratio.is_finite() && h_ratio > 0.0 && h_ratio.is_finite()) {
            return Err(TransformError::InvalidScale { w_ratio, h_ratio });
        }
        let new_width = (f64::from(self.width()) * w_ratio).round() as u32;
        let new_height = (f64::from(self.height()) * h_ratio).round() as u32;
        if new_width == 0 || new_height == 0 {
            return Err(TransformError::InvalidDimensions {
                width: new_width,
                height: new_height,
            });
        }
        Ok(ImageHandle::from_dynamic(self.as_dynamic().resize_exact(
            new_width,
            new_height,
            FilterType::Lanczos3,
        )))
    }

    /// Crop to an explicit rectangle.
    pub fn crop_rect(&self, rect: CropRect) -> Result<ImageHandle> {
        let (width, height) = self.dimensions();
        if rect.left < 1
            || rect.top < 1
            || rect.right > width
            || rect.bottom > height
            || rect.left > rect.right
            || rect.top > rect.bottom
        {
            return Err(TransformError::CropOutOfBounds {
                left: rect.left,
                top: rect.top,
                right: rect.right,
                bottom: rect.bottom,
                width,
                height,
            });
        }
        let cropped =
            self.as_dynamic()
                .crop_imm(rect.left - 1, rect.top - 1, rect.width(), rect.height());
        Ok(ImageHandle::from_dynamic(cropped))
    }

    /// Crop a `crop_width` x `crop_height` rectangle centered in the image.
    pub fn crop_center(&self, crop_width: u32, crop_height: u32) -> Result<ImageHandle> {
        let (width, height) = self.dimensions();
        if crop_width == 0 || crop_height == 0 || crop_width > width || crop_height > height {
            return Err(TransformError::InvalidDimensions {
                width: crop_width,
                height: crop_height,
            });
        }
        let x = (width - crop_width) / 2;
        let y = (height - crop_height) / 2;
        Ok(ImageHandle::from_dynamic(self.as_dynamic().crop_imm(
            x,
            y,
            crop_width,
            crop_height,
        )))
    }

    /// Side length a square crop would use: the shorter side, or the longer
    /// one when `larger` is set.
    pub fn square_length(&self, larger: bool) -> u32 {
        let (width, height) = self.dimensions();
        if larger {
            width.max(height)
        } else {
            width.min(height)
        }
    }

    /// Square crop of `min(width, height)` pixels at the given anchor.
    pub fn square(&self, anchor: SquareAnchor) -> Result<ImageHandle> {
        let (w, h) = self.dimensions();
        let length = self.square_length(false);
        match anchor {
            SquareAnchor::Center => self.crop_center(length, length),
            SquareAnchor::TopLeft => self.crop_rect(CropRect::to(length, length)),
            SquareAnchor::TopRight => self.crop_rect(CropRect::new(w - length + 1, 1, w, length)),
            SquareAnchor::BottomLeft => {
                self.crop_rect(CropRect::new(1, h - length + 1, length, h))
            }
            SquareAnchor::BottomRight => {
                self.crop_rect(CropRect::new(w - length + 1, h - length + 1, w, h))
            }
        }
    }

    /// Rotate clockwise by `degrees`.
    ///
    /// Right-angle rotations are lossless and swap the canvas for 90/270.
    /// Other angles resample about the center on the same-size canvas, so
    /// corners that rotate past the edge are clipped and the uncovered
    /// corners fill with transparency.
    pub fn rotate(&self, degrees: f32) -> ImageHandle {
        let normalized = degrees.rem_euclid(360.0);
        let image = if normalized == 0.0 {
            self.as_dynamic().clone()
        } else if normalized == 90.0 {
            self.as_dynamic().rotate90()
        } else if normalized == 180.0 {
            self.as_dynamic().rotate180()
        } else if normalized == 270.0 {
            self.as_dynamic().rotate270()
        } else {
            let rgba = self.as_dynamic().to_rgba8();
            let rotated = rotate_about_center(
                &rgba,
                normalized.to_radians(),
                Interpolation::Bilinear,
                image::Rgba([0, 0, 0, 0]),
            );
            DynamicImage::ImageRgba8(rotated)
        };
        ImageHandle::from_dynamic(image)
    }

    /// Mirror across the given axis.
    pub fn mirror(&self, axis: MirrorAxis) -> ImageHandle {
        let image = match axis {
            MirrorAxis::Y => self.as_dynamic().fliph(),
            MirrorAxis::X => self.as_dynamic().flipv(),
        };
        ImageHandle::from_dynamic(image)
    }

    /// Add `amount` of transparency: 0.0 leaves the image unchanged, 1.0
    /// makes it fully transparent.
    pub fn fade(&self, amount: f32) -> Result<ImageHandle> {
        if !(0.0..=1.0).contains(&amount) {
            return Err(TransformError::InvalidOpacity { amount });
        }
        let mut rgba = self.as_dynamic().to_rgba8();
        let keep = 1.0 - amount;
        for pixel in rgba.pixels_mut() {
            pixel[3] = (f32::from(pixel[3]) * keep).round() as u8;
        }
        Ok(ImageHandle::from_dynamic(DynamicImage::ImageRgba8(rgba)))
    }
}
