//! Shared output types for the upload pipelines.

use serde::{Deserialize, Serialize};

/// Whether an image is wider than it is tall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    /// Landscape when width exceeds height, portrait otherwise (a square
    /// image counts as portrait).
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if f64::from(width) / f64::from(height) > 1.0 {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

/// EXIF metadata extracted from an image.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExifData {
    /// Image orientation (1-8 per EXIF spec)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<u32>,

    /// When the photo was captured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<String>,

    /// Camera manufacturer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_make: Option<String>,

    /// Camera model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_model: Option<String>,

    /// GPS latitude (decimal degrees)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_latitude: Option<f64>,

    /// GPS longitude (decimal degrees)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_longitude: Option<f64>,

    /// ISO sensitivity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso: Option<u32>,

    /// Aperture (e.g., "f/1.8")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aperture: Option<String>,

    /// Shutter speed (e.g., "1/1000")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutter_speed: Option<String>,

    /// Focal length in mm
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<f32>,
}

/// Everything the derived-variant pipeline produced for one upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResult {
    /// Stored key of the full-size image
    pub main_key: String,

    /// Stored key of the medium variant
    pub medium_key: String,

    /// Stored key of the small variant
    pub small_key: String,

    /// Landscape/portrait, derived from the final corrected dimensions
    pub orientation: Orientation,

    /// Full EXIF metadata when orientation correction found any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exif: Option<ExifData>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_from_dimensions() {
        assert_eq!(Orientation::from_dimensions(800, 600), Orientation::Landscape);
        assert_eq!(Orientation::from_dimensions(600, 800), Orientation::Portrait);
        assert_eq!(Orientation::from_dimensions(500, 500), Orientation::Portrait);
    }

    #[test]
    fn test_upload_result_serde_skips_missing_exif() {
        let result = UploadResult {
            main_key: "a.jpg".to_string(),
            medium_key: "b.jpg".to_string(),
            small_key: "c.jpg".to_string(),
            orientation: Orientation::Landscape,
            exif: None,
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"orientation\":\"landscape\""));
        assert!(!json.contains("exif"));

        let parsed: UploadResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.main_key, "a.jpg");
        assert!(parsed.exif.is_none());
    }
}
