//! Error types for the `video-frame-extractor` crate.
//!
//! [`ExtractorError`] is the error returned by every fallible library call.
//! Across the method-call boundary errors travel as a [`MethodError`]: a
//! stable [`ErrorCode`] plus a human-readable message. [`ExtractorError::code`]
//! performs that mapping.

use std::{fmt, io::Error as IoError, time::Duration};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use serde::Serialize;
use thiserror::Error;

/// The unified error type for all extraction operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractorError {
    /// A required argument was missing or malformed. Raised before any
    /// decoder is opened.
    #[error("{0}")]
    InvalidArguments(String),

    /// The media source could not be opened.
    #[error("Failed to open media source {input}: {reason}")]
    FileOpen {
        /// The source string that was passed in.
        input: String,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The source does not contain a video stream.
    #[error("No video stream found in source")]
    NoVideoStream,

    /// The decoder produced no frame for a valid request.
    #[error("Failed to decode frame: {0}")]
    DecodeFailed(String),

    /// Re-encoding the frame produced no output.
    #[error("Failed to encode image: {0}")]
    EncodeFailed(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing cache files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while transforming a frame.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// The caller stopped waiting for the operation.
    #[error("Operation timed out after {0:?}")]
    TimedOut(Duration),

    /// A background worker died before reporting its result.
    #[error("Worker failed: {0}")]
    WorkerFailed(String),
}

impl From<FfmpegError> for ExtractorError {
    fn from(error: FfmpegError) -> Self {
        ExtractorError::FfmpegError(error.to_string())
    }
}

impl ExtractorError {
    /// The boundary error code this error is reported under.
    pub fn code(&self) -> ErrorCode {
        match self {
            ExtractorError::InvalidArguments(_) => ErrorCode::InvalidArgs,
            ExtractorError::DecodeFailed(_) => ErrorCode::DecodeFailed,
            ExtractorError::EncodeFailed(_) => ErrorCode::EncodeFailed,
            _ => ErrorCode::InternalError,
        }
    }

    /// Convert into the `(code, message)` pair delivered to callers.
    pub fn into_method_error(self) -> MethodError {
        MethodError {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Stable error codes reported across the method-call boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Missing or malformed input. Nothing was opened.
    InvalidArgs,
    /// The decoder returned no frame (single-frame calls only).
    DecodeFailed,
    /// Image re-encoding produced no output (single-frame calls only).
    EncodeFailed,
    /// Any other fault; the message is passed through.
    InternalError,
}

impl ErrorCode {
    /// The wire name of this code, e.g. `"invalid_args"`.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidArgs => "invalid_args",
            ErrorCode::DecodeFailed => "decode_failed",
            ErrorCode::EncodeFailed => "encode_failed",
            ErrorCode::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error as delivered to a method-call caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodError {
    /// Machine-readable code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
}

impl MethodError {
    /// Shorthand for an `invalid_args` error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidArgs,
            message: message.into(),
        }
    }
}

impl fmt::Display for MethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}
