//! # video-frame-extractor
//!
//! Extract still frames from video files at arbitrary timestamps and get
//! them back as PNG/JPEG bytes or as cached image files.
//!
//! Demuxing, decoding and pixel conversion are done by FFmpeg through
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next); rotation, scaling
//! and encoding by the [`image`](https://crates.io/crates/image) crate. This
//! crate adds the extraction workflows on top: option resolution, the
//! per-timestamp loop, cache file naming and reuse, a batched decode path,
//! and a method-call [`Dispatcher`] for embedding behind a message channel.
//!
//! ## Quick Start
//!
//! ### One frame
//!
//! ```no_run
//! use video_frame_extractor::{FrameExtractor, FrameOptions, MediaSource};
//!
//! let extractor = FrameExtractor::new();
//! let png = extractor
//!     .frame(&MediaSource::parse("input.mp4"), 3.0, &FrameOptions::single_frame())
//!     .unwrap();
//! std::fs::write("frame.png", png).unwrap();
//! ```
//!
//! ### A batch, cached on disk
//!
//! ```no_run
//! use video_frame_extractor::{CacheOptions, FrameExtractor, FrameOptions, MediaSource};
//!
//! let extractor = FrameExtractor::new();
//! let paths = extractor
//!     .frames_to_files(
//!         &MediaSource::parse("input.mp4"),
//!         &[0.0, 1.0, 2.0, -1.0],
//!         &FrameOptions::default().with_width(240),
//!         &CacheOptions::new().with_directory("/tmp/frames"),
//!     )
//!     .unwrap();
//! assert!(paths[3].is_none());
//! ```
//!
//! ### Method calls
//!
//! ```no_run
//! use serde_json::json;
//! use video_frame_extractor::{Dispatcher, MethodCall};
//!
//! let response = Dispatcher::new().handle(&MethodCall::new(
//!     "getFrame",
//!     json!({ "filePath": "input.mp4", "second": 1.5, "format": "jpeg" }),
//! ));
//! println!("{:?}", response.error());
//! ```
//!
//! ## Features
//!
//! - **`async`**: [`Dispatcher::dispatch_async`] on tokio's blocking pool.
//! - **`rayon`**: parallel rotate/resize/encode in batched mode.
//! - **`full`**: both.
//!
//! ## Logging
//!
//! Diagnostics go through the [`log`](https://crates.io/crates/log) facade.
//! FFmpeg's own stderr output is tuned separately with
//! [`set_ffmpeg_log_level`].

pub mod cache;
pub mod config;
mod conversion;
pub mod decoder;
pub mod dispatch;
pub mod error;
pub mod ffmpeg;
pub mod metadata;
pub mod progress;
mod render;
pub mod rotation;
pub mod source;
pub mod strategy;
pub mod video;
pub mod workflow;

pub use cache::{CacheKey, CacheOptions, CachePolicy, FrameCache, default_cache_dir};
pub use config::{ExtractionConfig, FrameOptions, ImageFormat, SeekMode};
pub use decoder::{DecoderBackend, FrameDecoder};
pub use dispatch::{
    Dispatcher, DispatcherConfig, MethodCall, MethodResponse, MethodValue, platform_version,
};
pub use error::{ErrorCode, ExtractorError, MethodError};
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use metadata::VideoMetadata;
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use rotation::Rotation;
pub use source::MediaSource;
pub use strategy::DecodeMode;
pub use video::{FfmpegBackend, FfmpegDecoder};
pub use workflow::FrameExtractor;
