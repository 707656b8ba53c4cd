//! Error types for logomatch.
//!
//! Per-image detection failures are deliberately *not* represented here: the
//! compliance layer converts them to data (`ComplianceResult::error`) so a
//! single bad image never aborts a campaign run. This enum covers input and
//! buffer validation plus image decoding.

use thiserror::Error;

/// Result alias for logomatch operations.
pub type LogoMatchResult<T> = std::result::Result<T, LogoMatchError>;

/// Errors that can occur when running logomatch operations.
#[derive(Debug, Error)]
pub enum LogoMatchError {
    /// Image dimensions are zero or overflow the addressable buffer size.
    #[error("invalid image dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Requested width in pixels.
        width: usize,
        /// Requested height in pixels.
        height: usize,
    },
    /// The backing buffer is too small for the described image.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall {
        /// Minimum number of elements required.
        needed: usize,
        /// Number of elements provided.
        got: usize,
    },
    /// The stride is smaller than the row width.
    #[error("invalid stride {stride} for width {width}")]
    InvalidStride {
        /// Row width in pixels.
        width: usize,
        /// Stride in elements between row starts.
        stride: usize,
    },
    /// An image file could not be opened or decoded.
    #[error("image io error: {reason}")]
    ImageIo {
        /// Human-readable decode/open failure description.
        reason: String,
    },
    /// A campaign configuration file could not be read or parsed.
    #[error("campaign load error: {reason}")]
    CampaignLoad {
        /// Human-readable load/parse failure description.
        reason: String,
    },
}
