//! Output and extraction configuration.
//!
//! [`FrameOptions`] describes what each extracted frame should look like
//! (size, image format, quality, seek precision, rotation). [`ExtractionConfig`]
//! threads progress callbacks, cancellation tokens, and the decode strategy
//! through the batch workflows without widening every signature.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use video_frame_extractor::{
//!     CancellationToken, DecodeMode, ExtractionConfig, FrameOptions, ImageFormat,
//!     ProgressCallback, ProgressInfo,
//! };
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{:?}: {} done", info.operation, info.current);
//!     }
//! }
//!
//! let options = FrameOptions::default()
//!     .with_width(320)
//!     .with_image_format(ImageFormat::Png);
//!
//! let config = ExtractionConfig::new()
//!     .with_progress(Arc::new(LogProgress))
//!     .with_cancellation(CancellationToken::new())
//!     .with_decode_mode(DecodeMode::Batched);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};
use crate::strategy::DecodeMode;

/// Default JPEG quality for single-frame requests.
pub const SINGLE_FRAME_QUALITY: u8 = 90;

/// Default JPEG quality for batch requests.
pub const BATCH_QUALITY: u8 = 85;

/// Encoded image format of extracted frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageFormat {
    /// Lossless PNG. Quality is ignored.
    #[default]
    Png,
    /// Lossy JPEG at the configured quality.
    Jpeg,
}

impl ImageFormat {
    /// Parse a format label. `jpeg` and `jpg` (any case) select JPEG; every
    /// other label falls back to PNG.
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => ImageFormat::Jpeg,
            _ => ImageFormat::Png,
        }
    }

    /// Canonical label used when no explicit label was given.
    pub fn label(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
        }
    }

    /// File extension for cache files of this format.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }
}

/// How precisely the decoder seeks to a requested timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SeekMode {
    /// Return the keyframe at or before the timestamp. Cheap.
    #[default]
    Keyframe,
    /// Decode forward from the keyframe and return the last frame at or
    /// before the timestamp.
    Exact,
}

impl SeekMode {
    /// Map the boundary `exactTime` flag to a seek mode.
    pub fn from_exact(exact: bool) -> Self {
        if exact { SeekMode::Exact } else { SeekMode::Keyframe }
    }
}

/// Per-frame output settings.
///
/// `Default` yields the batch defaults (JPEG, quality 85, keyframe seek,
/// rotation applied). [`FrameOptions::single_frame`] yields the single-frame
/// defaults (PNG, quality 90).
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct FrameOptions {
    /// Target width. `None` keeps the source width (or derives it from
    /// `height`).
    pub width: Option<u32>,
    /// Target height. `None` keeps the source height (or derives it from
    /// `width`).
    pub height: Option<u32>,
    /// Output image format.
    pub format: ImageFormat,
    /// Format label exactly as requested. Part of cache file names, so
    /// `"jpg"`, `"jpeg"` and `"JPEG"` stay distinct; all encode as JPEG.
    pub format_label: String,
    /// JPEG quality, already clamped to `0..=100`.
    pub quality: u8,
    /// Seek precision.
    pub seek: SeekMode,
    /// Whether the source rotation metadata is applied. Ignored by the
    /// single-frame workflow, which always rotates.
    pub apply_rotation: bool,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            format: ImageFormat::Jpeg,
            format_label: ImageFormat::Jpeg.label().to_string(),
            quality: BATCH_QUALITY,
            seek: SeekMode::Keyframe,
            apply_rotation: true,
        }
    }
}

impl FrameOptions {
    /// Defaults for single-frame extraction: PNG, quality 90.
    pub fn single_frame() -> Self {
        Self {
            format: ImageFormat::Png,
            format_label: ImageFormat::Png.label().to_string(),
            quality: SINGLE_FRAME_QUALITY,
            ..Self::default()
        }
    }

    /// Set the target width.
    pub fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    /// Set the target height.
    pub fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    /// Set both target dimensions at once. `None` leaves a dimension free.
    pub fn with_size(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the output format from a caller-supplied label.
    pub fn with_format(mut self, label: &str) -> Self {
        self.format = ImageFormat::from_label(label);
        self.format_label = label.to_string();
        self
    }

    /// Set the output format using its canonical label.
    pub fn with_image_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self.format_label = format.label().to_string();
        self
    }

    /// Set the JPEG quality. Values outside `0..=100` are clamped.
    pub fn with_quality(mut self, quality: i64) -> Self {
        self.quality = quality.clamp(0, 100) as u8;
        self
    }

    /// Set the seek precision.
    pub fn with_seek(mut self, seek: SeekMode) -> Self {
        self.seek = seek;
        self
    }

    /// Control whether rotation metadata is applied in batch workflows.
    pub fn with_apply_rotation(mut self, apply: bool) -> Self {
        self.apply_rotation = apply;
        self
    }

    /// Whether a resize is requested at all.
    pub(crate) fn wants_resize(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }

    /// Resolve the final output dimensions for a (rotated) source frame.
    ///
    /// With a single dimension given, the other one keeps the source aspect
    /// ratio using truncating integer arithmetic. Derived values never drop
    /// below 1. Returns `(width, height)`.
    pub(crate) fn resolve_dimensions(&self, source_width: u32, source_height: u32) -> (u32, u32) {
        match (self.width, self.height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) if source_width > 0 => {
                let h = u64::from(source_height) * u64::from(w) / u64::from(source_width);
                (w, (h as u32).max(1))
            }
            (None, Some(h)) if source_height > 0 => {
                let w = u64::from(source_width) * u64::from(h) / u64::from(source_height);
                ((w as u32).max(1), h)
            }
            (Some(w), None) => (w, source_height),
            (None, Some(h)) => (source_width, h),
            (None, None) => (source_width, source_height),
        }
    }
}

/// Operational settings for batch extraction.
///
/// Carries the progress callback, an optional cancellation token, how often
/// progress fires, and which [`DecodeMode`] runs the batch. A
/// default-constructed config behaves like the plain `frames*` methods.
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Progress callback. Defaults to a no-op.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Cancellation token. `None` means never cancelled.
    pub(crate) cancellation: Option<CancellationToken>,
    /// Fire the progress callback every N slots. Defaults to 1.
    pub(crate) batch_size: u64,
    /// Decode strategy for the batch.
    pub(crate) decode_mode: DecodeMode,
}

impl Debug for ExtractionConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExtractionConfig")
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .field("decode_mode", &self.decode_mode)
            .finish()
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self {
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            batch_size: 1,
            decode_mode: DecodeMode::Sequential,
        }
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token. A cancelled batch stops at the next slot
    /// and returns [`ExtractorError::Cancelled`](crate::ExtractorError::Cancelled).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often the progress callback fires. Clamped to at least 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Select the decode strategy.
    #[must_use]
    pub fn with_decode_mode(mut self, mode: DecodeMode) -> Self {
        self.decode_mode = mode;
        self
    }

    /// The configured decode strategy.
    pub fn decode_mode(&self) -> DecodeMode {
        self.decode_mode
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
