//! EXIF extraction and orientation normalization.
//!
//! Extraction distinguishes two recoverable conditions — a container with
//! no EXIF segment, and bytes that are not a container the reader
//! understands — from genuinely fatal parse failures. Orientation
//! correction treats both recoverable cases as "no orientation metadata".

use exif::{In, Reader, Tag, Value};
use std::io::Cursor;

use crate::error::{ExifError, Result};
use crate::handle::{ImageHandle, ImageOpener};
use crate::source::{ImageSource, Resolved};
use crate::transform::MirrorAxis;
use crate::types::ExifData;

/// Result of attempting EXIF extraction.
#[derive(Debug, Clone)]
pub enum ExifOutcome {
    /// Parsed metadata
    Metadata(ExifData),

    /// The container is valid but carries no EXIF segment
    NoExifSegment,

    /// The bytes are not a container the EXIF reader understands
    NotAJpeg,
}

/// Extract EXIF metadata from raw image bytes.
///
/// The two missing-metadata conditions come back as recoverable
/// [`ExifOutcome`] variants; anything else is a fatal [`ExifError`].
pub fn extract(bytes: &[u8]) -> std::result::Result<ExifOutcome, ExifError> {
    let mut cursor = Cursor::new(bytes);
    match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => Ok(ExifOutcome::Metadata(exif_data_from(&exif))),
        Err(exif::Error::NotFound(_)) => Ok(ExifOutcome::NoExifSegment),
        Err(exif::Error::InvalidFormat(_)) | Err(exif::Error::NotSupported(_)) => {
            Ok(ExifOutcome::NotAJpeg)
        }
        Err(e) => Err(ExifError::Extract {
            message: e.to_string(),
        }),
    }
}

fn exif_data_from(exif: &exif::Exif) -> ExifData {
    ExifData {
        orientation: get_u32(exif, Tag::Orientation),
        captured_at: get_datetime(exif),
        camera_make: get_string(exif, Tag::Make),
        camera_model: get_string(exif, Tag::Model),
        gps_latitude: get_gps_coord(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef),
        gps_longitude: get_gps_coord(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef),
        iso: get_u32(exif, Tag::PhotographicSensitivity),
        aperture: get_aperture(exif),
        shutter_speed: get_shutter_speed(exif),
        focal_length: get_focal_length(exif),
    }
}

fn get_string(exif: &exif::Exif, tag: Tag) -> Option<String> {
    exif.get_field(tag, In::PRIMARY).map(|f| {
        let s = f.display_value().to_string();
        s.trim_matches('"').to_string()
    })
}

fn get_u32(exif: &exif::Exif, tag: Tag) -> Option<u32> {
    exif.get_field(tag, In::PRIMARY)
        .and_then(|f| match &f.value {
            Value::Short(v) => v.first().map(|&x| u32::from(x)),
            Value::Long(v) => v.first().copied(),
            _ => None,
        })
}

/// Capture datetime, preferring DateTimeOriginal over DateTime.
fn get_datetime(exif: &exif::Exif) -> Option<String> {
    exif.get_field(Tag::DateTimeOriginal, In::PRIMARY)
        .or_else(|| exif.get_field(Tag::DateTime, In::PRIMARY))
        .map(|f| {
            let s = f.display_value().to_string();
            s.trim_matches('"').to_string()
        })
}

/// GPS coordinate, converted from degrees/minutes/seconds to decimal.
fn get_gps_coord(exif: &exif::Exif, coord_tag: Tag, ref_tag: Tag) -> Option<f64> {
    let coord = exif.get_field(coord_tag, In::PRIMARY)?;
    let reference = exif.get_field(ref_tag, In::PRIMARY)?;

    let degrees = parse_gps_rationals(&coord.value)?;
    let ref_str = reference.display_value().to_string();

    let sign = if ref_str.contains('S') || ref_str.contains('W') {
        -1.0
    } else {
        1.0
    };
    Some(sign * degrees)
}

fn parse_gps_rationals(value: &Value) -> Option<f64> {
    match value {
        Value::Rational(rationals) if rationals.len() >= 3 => {
            let degrees = rationals[0].to_f64();
            let minutes = rationals[1].to_f64();
            let seconds = rationals[2].to_f64();
            Some(degrees + minutes / 60.0 + seconds / 3600.0)
        }
        _ => None,
    }
}

fn get_aperture(exif: &exif::Exif) -> Option<String> {
    exif.get_field(Tag::FNumber, In::PRIMARY)
        .map(|f| format!("f/{}", f.display_value()))
}

fn get_shutter_speed(exif: &exif::Exif) -> Option<String> {
    exif.get_field(Tag::ExposureTime, In::PRIMARY)
        .map(|f| f.display_value().to_string())
}

fn get_focal_length(exif: &exif::Exif) -> Option<f32> {
    exif.get_field(Tag::FocalLength, In::PRIMARY)
        .and_then(|f| match &f.value {
            Value::Rational(v) => v.first().map(|r| r.to_f64() as f32),
            _ => None,
        })
}

/// EXIF orientation tag (1-8) to the rotation and mirror that undo it.
///
/// The table is fixed: `(degrees, mirror)` where the mirror, when set, is
/// applied across the Y axis after rotating. Unknown tags yield `None`.
pub fn orientation_steps(tag: u32) -> Option<(u32, bool)> {
    match tag {
        1 => Some((0, false)),
        2 => Some((0, true)),
        3 => Some((180, false)),
        4 => Some((180, true)),
        5 => Some((90, true)),
        6 => Some((90, false)),
        7 => Some((270, true)),
        8 => Some((270, false)),
        _ => None,
    }
}

/// An image with EXIF-driven orientation applied.
#[derive(Debug, Clone)]
pub struct OrientedImage {
    pub handle: ImageHandle,

    /// Present only when an orientation tag drove a correction
    pub exif: Option<ExifData>,
}

/// Normalize an image's pixels to orientation 1.
///
/// Missing metadata (no EXIF segment, or a container the reader does not
/// understand) is not an error: the image comes back decoded but
/// unmodified, with no EXIF payload. Any other extraction failure
/// propagates. A source that is already an open handle passes through
/// untouched.
pub async fn correct_orientation(
    opener: &ImageOpener,
    source: ImageSource,
) -> Result<OrientedImage> {
    let (bytes, format) = match opener.resolver().resolve(source).await? {
        Resolved::Handle(handle) => return Ok(OrientedImage { handle, exif: None }),
        Resolved::Bytes { bytes, format } => (bytes, format),
    };

    let outcome = extract(&bytes)?;
    let handle = opener.decode(bytes, Some(format)).await?;

    let data = match outcome {
        ExifOutcome::Metadata(data) => data,
        ExifOutcome::NoExifSegment | ExifOutcome::NotAJpeg => {
            return Ok(OrientedImage { handle, exif: None });
        }
    };

    let Some((degrees, mirrored)) = data.orientation.and_then(orientation_steps) else {
        return Ok(OrientedImage { handle, exif: None });
    };

    tracing::debug!(tag = ?data.orientation, degrees, mirrored, "applying exif orientation");
    let rotated = handle.rotate(degrees as f32);
    let corrected = if mirrored {
        rotated.mirror(MirrorAxis::Y)
    } else {
        rotated
    };
    Ok(OrientedImage {
        handle: corrected,
        exif: Some(data),
    })
}
