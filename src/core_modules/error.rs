// THEORY:
// Every failure the mosaic engine can report lives here. The transform itself is
// a pure function over two buffers, so its only failure mode is being handed a
// geometry it cannot honour. All of those cases are detected before the first
// byte of the destination is written; a rejected call leaves the destination
// exactly as it was.
//
// The capture loop adds two more families (source and sink failures) and the
// asynchronous worker pool adds one (no worker left to answer). They share the
// same enum so that callers only ever match on one error type.

use crate::core_modules::frame::FrameLayout;
use thiserror::Error;

/// Main error type for mosaic operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MosaicError {
    /// A size, stride or channel count that cannot produce a valid tiling.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The destination frame does not share the source frame's geometry.
    #[error("dimension mismatch: source is {source_layout}, destination is {destination_layout}")]
    DimensionMismatch {
        source_layout: FrameLayout,
        destination_layout: FrameLayout,
    },

    /// The backing buffer is shorter than its layout requires.
    #[error("buffer too small: expected at least {expected} bytes, got {actual}")]
    BufferTooSmall { expected: usize, actual: usize },

    /// The frame source failed to produce a frame.
    #[error("frame source failed: {0}")]
    Source(String),

    /// The frame sink failed to present a frame.
    #[error("frame sink failed: {0}")]
    Sink(String),

    /// The worker pool has shut down or a worker dropped its reply.
    #[error("no worker available to process the frame")]
    WorkerUnavailable,
}

/// Result type alias using `MosaicError`.
pub type Result<T> = std::result::Result<T, MosaicError>;

impl MosaicError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        MosaicError::InvalidArgument(message.into())
    }
}
