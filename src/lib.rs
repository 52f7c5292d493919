//! # Pictor
//!
//! Async image transformation and upload pipelines.
//!
//! Images enter as an [`ImageSource`] (path, storage key, URL, raw bytes,
//! or an already-open handle), resolve to bytes, and decode into an owned
//! [`ImageHandle`]. Transforms are pure methods on the handle; uploads go
//! through the [`Uploader`], which derives resized variants and persists
//! them to a pluggable [`Storage`] collaborator.
//!
//! ## Architecture
//!
//! ```text
//! ImageSource -> SourceResolver -> ImageOpener -> ImageHandle
//!                                                     |
//!                            transforms (resize, crop, square, rotate,
//!                            mirror, fade, paste, colorify)
//!                                                     |
//!                                  Uploader -> Storage (main + variants)
//! ```
//!
//! EXIF orientation is corrected before the variant pipeline runs, so every
//! stored variant shares the display orientation of the original.

pub mod color;
pub mod config;
pub mod error;
pub mod exif;
pub mod handle;
pub mod source;
pub mod storage;
pub mod transform;
pub mod types;
pub mod upload;

use std::sync::Arc;

pub use color::{average_color, color_average, Color, ColorSpec};
pub use config::Config;
pub use error::{PictorError, Result};
pub use exif::{correct_orientation, ExifOutcome, OrientedImage};
pub use handle::{EncodeOptions, ImageHandle, ImageOpener};
pub use source::{ImageSource, SourceResolver};
pub use storage::{LocalStorage, MemoryStorage, Storage, StoredFile, WriteRequest};
pub use transform::{composite, CropRect, MirrorAxis, PasteBatch, PasteItem, SquareAnchor};
pub use types::{ExifData, Orientation, UploadResult};
pub use upload::{new_image_bytes, UploadOptions, Uploader};

/// Version of the library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Entry point bundling an opener and an uploader over one storage backend.
pub struct Pictor {
    uploader: Uploader,
}

impl Pictor {
    pub fn new(storage: Arc<dyn Storage>, config: Config) -> Self {
        Self {
            uploader: Uploader::new(storage, config),
        }
    }

    pub fn opener(&self) -> &ImageOpener {
        self.uploader.opener()
    }

    pub fn uploader(&self) -> &Uploader {
        &self.uploader
    }

    /// Open any source into a decoded handle.
    pub async fn open(&self, source: impl Into<ImageSource>) -> Result<ImageHandle> {
        self.opener().open(source.into()).await
    }

    /// Run the full three-variant upload flow.
    pub async fn upload_with_variants(
        &self,
        source: impl Into<ImageSource>,
        filename: Option<String>,
    ) -> Result<UploadResult> {
        self.uploader
            .upload_with_variants(source.into(), filename)
            .await
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;

    #[tokio::test]
    async fn test_facade_open_and_upload() {
        let storage = Arc::new(MemoryStorage::new());
        let pictor = Pictor::new(storage.clone(), Config::default());

        let bytes = test_util::gradient(320, 240)
            .encode(ImageFormat::Png, EncodeOptions::default())
            .await
            .unwrap();

        let handle = pictor.open(bytes.clone()).await.unwrap();
        assert_eq!(handle.dimensions(), (320, 240));

        let result = pictor
            .upload_with_variants(bytes, Some("shot.jpg".to_string()))
            .await
            .unwrap();
        assert_eq!(result.orientation, Orientation::Landscape);
        assert_eq!(storage.len().await, 3);
    }
}
