//! The extraction workflows.
//!
//! [`FrameExtractor`] is the library entry point. It owns a
//! [`DecoderBackend`] and exposes the single-frame, batch-to-bytes and
//! batch-to-cache-files workflows. Each call opens its own decoder handle(s)
//! and drops them before returning, on success and on error.
//!
//! Batch workflows never reorder or drop slots: the result vector has one
//! entry per requested timestamp, `None` where the timestamp was invalid or
//! nothing could be produced for it.
//!
//! # Example
//!
//! ```no_run
//! use video_frame_extractor::{ExtractorError, FrameExtractor, FrameOptions, MediaSource};
//!
//! let extractor = FrameExtractor::new();
//! let source = MediaSource::parse("input.mp4");
//!
//! let png = extractor.frame(&source, 1.5, &FrameOptions::single_frame())?;
//! let thumbnails = extractor.frames(
//!     &source,
//!     &[0.0, 5.0, 10.0],
//!     &FrameOptions::default().with_width(160),
//! )?;
//! assert_eq!(thumbnails.len(), 3);
//! # Ok::<(), ExtractorError>(())
//! ```

use std::path::PathBuf;

use image::DynamicImage;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::cache::{CacheKey, CacheOptions, FrameCache};
use crate::config::{ExtractionConfig, FrameOptions};
use crate::decoder::{DecoderBackend, FrameDecoder};
use crate::error::ExtractorError;
use crate::metadata::VideoMetadata;
use crate::progress::{OperationType, ProgressTracker};
use crate::render::render_frame;
use crate::rotation::Rotation;
use crate::source::MediaSource;
use crate::strategy::{
    BatchedDecode, DecodeJob, DecodeMode, DecodeStrategy, DecodedFrame, SequentialDecode,
};
use crate::video::FfmpegBackend;

/// Whether `seconds` can be decoded at all.
pub(crate) fn is_valid_timestamp(seconds: f64) -> bool {
    seconds.is_finite() && seconds >= 0.0
}

/// Extracts encoded still frames from video sources.
#[derive(Debug, Clone, Default)]
pub struct FrameExtractor<B: DecoderBackend = FfmpegBackend> {
    backend: B,
}

impl FrameExtractor<FfmpegBackend> {
    /// An extractor backed by FFmpeg.
    pub fn new() -> Self {
        Self {
            backend: FfmpegBackend,
        }
    }
}

impl<B: DecoderBackend> FrameExtractor<B> {
    /// An extractor backed by a custom decoder.
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    /// The decoder backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Extract one frame as encoded bytes.
    ///
    /// The source rotation is always applied, whatever
    /// [`FrameOptions::apply_rotation`] says.
    ///
    /// # Errors
    ///
    /// - [`ExtractorError::InvalidArguments`] for a negative or non-finite
    ///   timestamp (nothing is opened).
    /// - [`ExtractorError::DecodeFailed`] if no frame exists at `seconds`.
    /// - [`ExtractorError::EncodeFailed`] if encoding yields nothing.
    /// - Any open or decoder fault.
    pub fn frame(
        &self,
        source: &MediaSource,
        seconds: f64,
        options: &FrameOptions,
    ) -> Result<Vec<u8>, ExtractorError> {
        if !is_valid_timestamp(seconds) {
            return Err(ExtractorError::InvalidArguments(format!(
                "second must be a non-negative number, got {seconds}"
            )));
        }

        let mut decoder = self.backend.open(source)?;
        let frame = decoder.decode_at(seconds, options.seek)?.ok_or_else(|| {
            ExtractorError::DecodeFailed(format!("no frame at {seconds}s in {source}"))
        })?;
        let rotation = decoder.metadata().rotation;
        drop(decoder);

        let bytes = render_frame(frame, rotation, options)?;
        log::info!(
            "Extracted frame at {seconds}s from {source} ({} bytes)",
            bytes.len()
        );
        Ok(bytes)
    }

    /// Extract a batch of frames as encoded bytes, one slot per timestamp.
    pub fn frames(
        &self,
        source: &MediaSource,
        seconds: &[f64],
        options: &FrameOptions,
    ) -> Result<Vec<Option<Vec<u8>>>, ExtractorError> {
        self.frames_with_config(source, seconds, options, &ExtractionConfig::default())
    }

    /// Like [`frames`](Self::frames), with progress, cancellation and decode
    /// mode taken from `config`.
    ///
    /// # Errors
    ///
    /// Only call-level faults (unreadable source, decoder fault, cancellation)
    /// are errors. Per-slot failures become `None`.
    pub fn frames_with_config(
        &self,
        source: &MediaSource,
        seconds: &[f64],
        options: &FrameOptions,
        config: &ExtractionConfig,
    ) -> Result<Vec<Option<Vec<u8>>>, ExtractorError> {
        self.extract_batch(
            source,
            seconds,
            options,
            config,
            OperationType::FrameBatch,
            |_, _| None,
            |index, seconds, frame, rotation| {
                let Some(frame) = frame else {
                    return Ok(None);
                };
                match render_frame(frame, rotation, options) {
                    Ok(bytes) => Ok(Some(bytes)),
                    Err(error) => {
                        log::warn!("Slot {index} ({seconds}s) could not be encoded: {error}");
                        Ok(None)
                    }
                }
            },
        )
    }

    /// Extract a batch of frames to cache files, one slot per timestamp.
    pub fn frames_to_files(
        &self,
        source: &MediaSource,
        seconds: &[f64],
        options: &FrameOptions,
        cache: &CacheOptions,
    ) -> Result<Vec<Option<PathBuf>>, ExtractorError> {
        self.frames_to_files_with_config(
            source,
            seconds,
            options,
            cache,
            &ExtractionConfig::default(),
        )
    }

    /// Like [`frames_to_files`](Self::frames_to_files), with progress,
    /// cancellation and decode mode taken from `config`.
    ///
    /// With [`CachePolicy::Use`](crate::CachePolicy::Use) existing files are
    /// returned before any decoding happens; when every valid slot is cached
    /// the source is not opened at all.
    ///
    /// # Errors
    ///
    /// As for [`frames_with_config`](Self::frames_with_config), plus
    /// [`ExtractorError::IoError`] when a frame cannot be written to the
    /// cache directory.
    pub fn frames_to_files_with_config(
        &self,
        source: &MediaSource,
        seconds: &[f64],
        options: &FrameOptions,
        cache: &CacheOptions,
        config: &ExtractionConfig,
    ) -> Result<Vec<Option<PathBuf>>, ExtractorError> {
        let cache = FrameCache::new(cache);
        log::debug!("Frame cache directory: {}", cache.directory().display());

        self.extract_batch(
            source,
            seconds,
            options,
            config,
            OperationType::CacheFiles,
            |_, seconds| cache.lookup(&CacheKey::new(source, seconds, options)),
            |index, seconds, frame, rotation| {
                let Some(frame) = frame else {
                    return Ok(None);
                };
                let bytes = match render_frame(frame, rotation, options) {
                    Ok(bytes) => bytes,
                    Err(error) => {
                        log::warn!("Slot {index} ({seconds}s) could not be encoded: {error}");
                        return Ok(None);
                    }
                };
                // A cache directory that cannot be written fails the whole call.
                cache
                    .store(&CacheKey::new(source, seconds, options), &bytes)
                    .map(Some)
            },
        )
    }

    /// Shared batch loop.
    ///
    /// `cached` may answer a slot without decoding. `finish` turns a decoded
    /// frame into the slot's output; `Ok(None)` leaves the slot empty and
    /// `Err` aborts the call.
    #[allow(clippy::too_many_arguments)]
    fn extract_batch<T, C, F>(
        &self,
        source: &MediaSource,
        seconds: &[f64],
        options: &FrameOptions,
        config: &ExtractionConfig,
        operation: OperationType,
        cached: C,
        finish: F,
    ) -> Result<Vec<Option<T>>, ExtractorError>
    where
        T: Send,
        C: Fn(usize, f64) -> Option<T>,
        F: Fn(usize, f64, Option<DynamicImage>, Rotation) -> Result<Option<T>, ExtractorError>
            + Sync,
    {
        let mut results: Vec<Option<T>> = seconds.iter().map(|_| None).collect();
        let mut tracker = ProgressTracker::new(
            config.progress.clone(),
            operation,
            Some(seconds.len() as u64),
            config.batch_size,
        );

        let mut jobs = Vec::with_capacity(seconds.len());
        let mut cache_hits = 0usize;
        for (index, &timestamp) in seconds.iter().enumerate() {
            if !is_valid_timestamp(timestamp) {
                log::debug!("Slot {index} has invalid time {timestamp}; leaving it empty");
                tracker.advance(index, timestamp);
                continue;
            }
            if let Some(hit) = cached(index, timestamp) {
                results[index] = Some(hit);
                cache_hits += 1;
                tracker.advance(index, timestamp);
                continue;
            }
            jobs.push(DecodeJob {
                index,
                seconds: timestamp,
            });
        }

        if jobs.is_empty() && cache_hits > 0 {
            log::debug!("All {cache_hits} valid slots served from cache");
            tracker.finish();
            return Ok(results);
        }

        let rotation_of = |metadata: &VideoMetadata| {
            if options.apply_rotation {
                metadata.rotation
            } else {
                Rotation::None
            }
        };

        match config.decode_mode() {
            DecodeMode::Sequential => {
                SequentialDecode.decode(
                    &self.backend,
                    source,
                    &jobs,
                    options.seek,
                    config,
                    &mut |metadata, decoded| {
                        let DecodedFrame {
                            index,
                            seconds,
                            frame,
                        } = decoded;
                        results[index] = finish(index, seconds, frame, rotation_of(metadata))?;
                        tracker.advance(index, seconds);
                        Ok(())
                    },
                )?;
            }
            DecodeMode::Batched => {
                // At most `limit` decoded images wait here before encoding.
                let limit = pending_frame_limit();
                let mut pending: Vec<(DecodedFrame, Rotation)> = Vec::with_capacity(limit);
                BatchedDecode::default().decode(
                    &self.backend,
                    source,
                    &jobs,
                    options.seek,
                    config,
                    &mut |metadata, decoded| {
                        let (index, seconds) = (decoded.index, decoded.seconds);
                        pending.push((decoded, rotation_of(metadata)));
                        if pending.len() >= limit {
                            let ready = std::mem::take(&mut pending);
                            finish_pending(ready, &finish, results.as_mut_slice())?;
                        }
                        tracker.advance(index, seconds);
                        Ok(())
                    },
                )?;
                finish_pending(pending, &finish, results.as_mut_slice())?;
            }
        }

        tracker.finish();
        log::info!(
            "Extracted {}/{} frames from {source} ({} mode)",
            results.iter().filter(|slot| slot.is_some()).count(),
            seconds.len(),
            config.decode_mode().label(),
        );
        Ok(results)
    }
}

/// Decoded frames held back for post-processing in batched mode.
#[cfg(feature = "rayon")]
const MAX_PENDING_FRAMES: usize = 8;

fn pending_frame_limit() -> usize {
    #[cfg(feature = "rayon")]
    {
        rayon::current_num_threads().clamp(1, MAX_PENDING_FRAMES)
    }
    #[cfg(not(feature = "rayon"))]
    {
        1
    }
}

/// Rotate, resize and encode a handful of decoded frames into their slots.
fn finish_pending<T, F>(
    pending: Vec<(DecodedFrame, Rotation)>,
    finish: &F,
    results: &mut [Option<T>],
) -> Result<(), ExtractorError>
where
    T: Send,
    F: Fn(usize, f64, Option<DynamicImage>, Rotation) -> Result<Option<T>, ExtractorError>
        + Sync,
{
    #[cfg(feature = "rayon")]
    let iter = pending.into_par_iter();
    #[cfg(not(feature = "rayon"))]
    let iter = pending.into_iter();

    let finished: Vec<(usize, Result<Option<T>, ExtractorError>)> = iter
        .map(|(decoded, rotation)| {
            let output = finish(decoded.index, decoded.seconds, decoded.frame, rotation);
            (decoded.index, output)
        })
        .collect();

    for (index, output) in finished {
        results[index] = output?;
    }
    Ok(())
}
