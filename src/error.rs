//! Error types for the pictor transformation pipelines.
//!
//! Errors are organized by stage so callers can tell a failed fetch apart
//! from unparsable bytes or bad geometry. Everything converts into the
//! top-level [`PictorError`] via `#[from]`.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for pictor operations.
#[derive(Error, Debug)]
pub enum PictorError {
    /// Source resolution failed (I/O, network, or a non-2xx fetch)
    #[error("source resolution error: {0}")]
    Source(#[from] SourceError),

    /// Bytes could not be decoded (or a handle re-encoded)
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Invalid geometry or transform parameters
    #[error("transform error: {0}")]
    Transform(#[from] TransformError),

    /// Fatal EXIF extraction failure
    #[error("exif error: {0}")]
    Exif(#[from] ExifError),

    /// Storage collaborator failure
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Failures while turning an image source into raw bytes.
///
/// These are never retried here; retry policy belongs to the caller.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Reading a filesystem path failed
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The HTTP request itself failed (DNS, connect, timeout)
    #[error("request to {url} failed: {source}")]
    Fetch { url: String, source: reqwest::Error },

    /// The server answered with a non-2xx status; `body` carries the payload
    #[error("GET {url} returned {status}: {body}")]
    HttpStatus {
        url: String,
        status: u16,
        body: String,
    },

    /// The storage collaborator could not produce the keyed blob
    #[error("storage fetch for {key} failed: {source}")]
    Storage { key: String, source: StorageError },
}

/// Codec failures while decoding or re-encoding pixel data.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Neither sniffing nor a caller hint identified the format
    #[error("cannot detect image format")]
    UnknownFormat,

    /// The bytes are not a parsable image
    #[error("image decode failed: {message}")]
    Decode { message: String },

    /// Re-encoding a decoded handle failed
    #[error("image encode to {format} failed: {message}")]
    Encode { format: String, message: String },

    /// Image dimensions exceed the configured limit
    #[error("image too large: {width}x{height} > {max_dim}")]
    TooLarge {
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Decoding did not finish within the configured timeout
    #[error("decode timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The blocking decode task panicked or was cancelled
    #[error("decode task failed: {message}")]
    Task { message: String },
}

/// Invalid geometry or parameters passed to a transform operation.
#[derive(Error, Debug)]
pub enum TransformError {
    /// Target width must be positive
    #[error("target width must be positive")]
    ZeroWidth,

    /// Requested dimensions are zero or exceed the source image
    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Crop rectangle falls outside the image (1-based, edge-inclusive)
    #[error(
        "crop rectangle ({left},{top})-({right},{bottom}) out of bounds for {width}x{height} image"
    )]
    CropOutOfBounds {
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
        width: u32,
        height: u32,
    },

    /// Fade amount outside 0..=1
    #[error("fade amount must be within 0..=1, got {amount}")]
    InvalidOpacity { amount: f32 },

    /// Scale ratios must be positive and finite
    #[error("scale ratios must be positive, got {w_ratio}x{h_ratio}")]
    InvalidScale { w_ratio: f64, h_ratio: f64 },

    /// A color string could not be parsed
    #[error("unrecognized color {value:?}")]
    InvalidColor { value: String },
}

/// Fatal EXIF extraction failure.
///
/// A missing EXIF segment or a non-JPEG container is *not* an error; those
/// are recoverable variants of [`crate::exif::ExifOutcome`].
#[derive(Error, Debug)]
pub enum ExifError {
    #[error("exif extraction failed: {message}")]
    Extract { message: String },
}

/// Storage collaborator failures.
#[derive(Error, Debug)]
pub enum StorageError {
    /// No blob stored under the requested key
    #[error("key not found: {0}")]
    NotFound(String),

    /// Reading the keyed blob failed
    #[error("read of {key} failed: {message}")]
    Read { key: String, message: String },

    /// Persisting the blob failed
    #[error("write of {filename} failed: {message}")]
    Write { filename: String, message: String },
}

/// Convenience type alias for pictor results.
pub type Result<T> = std::result::Result<T, PictorError>;
