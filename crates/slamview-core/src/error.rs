//! Error types for slamview.

use thiserror::Error;

/// The main error type for slamview operations.
#[derive(Error, Debug)]
pub enum ViewerError {
    /// A camera was asked to resume following without ever having a target.
    #[error("camera '{0}' has no follow target")]
    NoFollowTarget(String),

    /// Data size mismatch.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// An image had the wrong number of channels.
    #[error("image '{name}' must have {expected} channels, got {actual}")]
    ChannelMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// An image changed size after registration.
    #[error("image '{name}' registered as {expected_rows}x{expected_cols}, got {rows}x{cols}")]
    ImageSizeChanged {
        name: String,
        expected_rows: u32,
        expected_cols: u32,
        rows: u32,
        cols: u32,
    },

    /// A display region was referenced before it was created.
    #[error("display region '{0}' does not exist")]
    RegionNotFound(String),

    /// Screen bounds outside of the unit square or inverted.
    #[error("invalid bounds for '{name}': {reason}")]
    InvalidBounds { name: String, reason: String },

    /// The graphics context is not bound to the calling thread.
    #[error("graphics context not bound")]
    ContextNotBound,

    /// A dataset could not be parsed.
    #[error("dataset error: {0}")]
    Dataset(String),

    /// Rendering error.
    #[error("render error: {0}")]
    Render(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image decoding or encoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// A specialized Result type for slamview operations.
pub type Result<T> = std::result::Result<T, ViewerError>;
