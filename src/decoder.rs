//! The decode capability the workflows are written against.
//!
//! A [`DecoderBackend`] opens one [`FrameDecoder`] handle per top-level call.
//! The handle owns every native resource it needs and releases them when
//! dropped, so early returns and `?` propagation never leak a decoder.
//! [`FfmpegBackend`](crate::FfmpegBackend) is the production backend; tests
//! and embedders can plug in their own.

use image::DynamicImage;

use crate::config::SeekMode;
use crate::error::ExtractorError;
use crate::metadata::VideoMetadata;
use crate::source::MediaSource;

/// An open, exclusively-owned decoder for one media source.
pub trait FrameDecoder {
    /// Metadata read when the handle was opened.
    fn metadata(&self) -> &VideoMetadata;

    /// Decode the frame shown at `seconds`.
    ///
    /// Returns `Ok(None)` when the source has no frame for that time (seek
    /// failed, stream ended early). `Err` is reserved for faults that make
    /// the handle unusable.
    fn decode_at(
        &mut self,
        seconds: f64,
        seek: SeekMode,
    ) -> Result<Option<DynamicImage>, ExtractorError>;

    /// Decode several timestamps, sorted ascending, in one pass.
    ///
    /// Returns one entry per requested timestamp, in input order. The
    /// default seeks for each timestamp; backends that can decode forward
    /// through a run of nearby timestamps should override it.
    fn decode_run(
        &mut self,
        seconds: &[f64],
        seek: SeekMode,
    ) -> Result<Vec<Option<DynamicImage>>, ExtractorError> {
        seconds
            .iter()
            .map(|&timestamp| self.decode_at(timestamp, seek))
            .collect()
    }
}

/// Opens decoder handles.
///
/// Backends are shared between the dispatcher's worker threads, hence
/// `Send + Sync`. Decoder handles themselves never cross threads.
pub trait DecoderBackend: Send + Sync {
    /// The handle type produced by [`open`](DecoderBackend::open).
    type Decoder: FrameDecoder;

    /// Open `source` and read its stream metadata.
    fn open(&self, source: &MediaSource) -> Result<Self::Decoder, ExtractorError>;
}

impl<B: DecoderBackend + ?Sized> DecoderBackend for &B {
    type Decoder = B::Decoder;

    fn open(&self, source: &MediaSource) -> Result<Self::Decoder, ExtractorError> {
        (**self).open(source)
    }
}

impl<B: DecoderBackend + ?Sized> DecoderBackend for std::sync::Arc<B> {
    type Decoder = B::Decoder;

    fn open(&self, source: &MediaSource) -> Result<Self::Decoder, ExtractorError> {
        (**self).open(source)
    }
}
