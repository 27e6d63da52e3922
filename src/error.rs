//! Error types for the ROI and mask engine.
//!
//! Input that is merely rejected (a degenerate region, a box that is too
//! small, a polygon with too few vertices) never becomes an error. These
//! variants cover configuration, persistence, and the segmentation boundary.

use thiserror::Error;

/// Errors surfaced to the host application.
#[derive(Error, Debug)]
pub enum EngineError {
    /// I/O error while reading or writing persisted state
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Mask raster could not be decoded
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// The segmentation service reported a failure
    #[error("Segmentation failed: {message}")]
    SegmentationFailed {
        /// Message reported by the service, or a generic fallback
        message: String,
    },

    /// The segmentation service succeeded but produced no masks
    #[error("Segmentation returned no masks")]
    NoMasksReturned,

    /// A submission for this image is still outstanding
    #[error("A segmentation request is already in flight")]
    SubmissionInFlight,

    /// Completion arrived for a submission that is not the outstanding one
    #[error("Unknown submission ticket: {ticket}")]
    UnknownSubmission {
        /// The ticket that was presented
        ticket: u64,
    },

    /// No image is active in the workspace
    #[error("No active image")]
    NoActiveImage,

    /// An image reference is not known to the workspace
    #[error("Unknown image: {image}")]
    UnknownImage {
        /// The image reference that was requested
        image: String,
    },

    /// Version mismatch between expected and found
    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Highest supported version
        expected: u32,
        /// Version found in the input
        found: u32,
    },

    /// Image resolution with a zero dimension
    #[error("Invalid resolution: {width}x{height}")]
    InvalidResolution {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },

    /// A configuration value is out of range
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the offending value
        message: String,
    },
}

impl EngineError {
    /// Create a segmentation failure with a message.
    pub fn segmentation_failed(message: impl Into<String>) -> Self {
        Self::SegmentationFailed {
            message: message.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an unknown image error.
    pub fn unknown_image(image: impl Into<String>) -> Self {
        Self::UnknownImage {
            image: image.into(),
        }
    }

    /// Whether the operator can simply retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SegmentationFailed { .. } | Self::NoMasksReturned | Self::SubmissionInFlight
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;
