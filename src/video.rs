//! FFmpeg decode backend.
//!
//! [`FfmpegBackend`] opens an [`FfmpegDecoder`] per call. The decoder owns
//! the demuxer context, the video decoder and a lazily-built pixel converter;
//! all of them are released when the handle is dropped.
//!
//! Seeking always lands on the keyframe at or before the requested time.
//! [`SeekMode::Keyframe`] returns that keyframe; [`SeekMode::Exact`] decodes
//! forward and returns the last frame whose timestamp is at or before the
//! request (or the first frame after it when the seek overshot).

use std::time::Duration;

use ffmpeg_next::{
    Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input, stream::Stream},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use ffmpeg_sys_next::{AVPacketSideDataType, av_display_rotation_get, av_packet_side_data_get};
use image::{DynamicImage, RgbImage};

use crate::config::SeekMode;
use crate::conversion::{frame_to_buffer, pts_to_seconds, seconds_to_seek_timestamp};
use crate::decoder::{DecoderBackend, FrameDecoder};
use crate::error::ExtractorError;
use crate::metadata::VideoMetadata;
use crate::rotation::Rotation;
use crate::source::MediaSource;

/// Frames within this distance of a target count as an exact hit.
const FRAME_TIME_TOLERANCE: f64 = 1e-3;

/// A display matrix is nine 32-bit fixed-point values.
const DISPLAY_MATRIX_BYTES: usize = 9 * 4;

/// Opens media through FFmpeg.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend;

impl DecoderBackend for FfmpegBackend {
    type Decoder = FfmpegDecoder;

    fn open(&self, source: &MediaSource) -> Result<Self::Decoder, ExtractorError> {
        FfmpegDecoder::open(source)
    }
}

/// A scoped FFmpeg decoding session for one source.
pub struct FfmpegDecoder {
    input_context: Input,
    decoder: VideoDecoder,
    scaler: Option<ScalingContext>,
    stream_index: usize,
    time_base: Rational,
    /// Stream start time in seconds; frame times are reported relative to it.
    start_offset: f64,
    metadata: VideoMetadata,
}

impl FfmpegDecoder {
    /// Open `source`, locate its best video stream and read its metadata.
    ///
    /// # Errors
    ///
    /// [`ExtractorError::FileOpen`] if the demuxer cannot open the source,
    /// [`ExtractorError::NoVideoStream`] if it has no video.
    pub fn open(source: &MediaSource) -> Result<Self, ExtractorError> {
        let input_name = source.to_string();
        log::debug!("Opening media source: {input_name}");

        ffmpeg_next::init().map_err(|error| ExtractorError::FileOpen {
            input: input_name.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_path = source.as_input();
        let input_context =
            ffmpeg_next::format::input(&input_path).map_err(|error| ExtractorError::FileOpen {
                input: input_name.clone(),
                reason: error.to_string(),
            })?;

        let duration_microseconds = input_context.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };

        let (stream_index, time_base, start_offset, rotation, frames_per_second, parameters) = {
            let stream = input_context
                .streams()
                .best(Type::Video)
                .ok_or(ExtractorError::NoVideoStream)?;

            let time_base = stream.time_base();
            let start_time = stream.start_time();
            let start_offset = if start_time == ffmpeg_sys_next::AV_NOPTS_VALUE {
                0.0
            } else {
                pts_to_seconds(start_time, time_base)
            };

            let frame_rate = stream.avg_frame_rate();
            let frames_per_second = if frame_rate.denominator() != 0 {
                frame_rate.numerator() as f64 / frame_rate.denominator() as f64
            } else {
                0.0
            };

            (
                stream.index(),
                time_base,
                start_offset,
                read_rotation(&stream),
                frames_per_second,
                stream.parameters(),
            )
        };

        let decoder_context = CodecContext::from_parameters(parameters)?;
        let decoder = decoder_context.decoder().video()?;

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            duration,
            frames_per_second,
            codec,
            rotation,
        };

        let (display_width, display_height) = metadata.display_dimensions();
        log::debug!(
            "Opened {input_name}: stream={stream_index}, {}x{} (displayed {display_width}x{display_height}), {:.2} fps, codec={}, rotation={}°, duration={:.2}s",
            metadata.width,
            metadata.height,
            metadata.frames_per_second,
            metadata.codec,
            metadata.rotation.degrees(),
            metadata.duration.as_secs_f64(),
        );

        Ok(Self {
            input_context,
            decoder,
            scaler: None,
            stream_index,
            time_base,
            start_offset,
            metadata,
        })
    }

    /// Seek to the first target and decode forward until every target in
    /// `targets` (sorted ascending) is resolved or the stream ends.
    fn decode_forward(
        &mut self,
        targets: &[f64],
        seek: SeekMode,
    ) -> Result<Vec<Option<DynamicImage>>, ExtractorError> {
        let mut results: Vec<Option<DynamicImage>> = vec![None; targets.len()];
        let Some(&first) = targets.first() else {
            return Ok(results);
        };

        let seek_timestamp = seconds_to_seek_timestamp(first + self.start_offset);
        if let Err(error) = self.input_context.seek(seek_timestamp, ..seek_timestamp) {
            log::debug!("Seek to {first:.3}s failed: {error}");
            return Ok(results);
        }
        self.decoder.flush();

        let stream_index = self.stream_index;
        let time_base = self.time_base;
        let start_offset = self.start_offset;
        let Self {
            input_context,
            decoder,
            scaler,
            ..
        } = self;

        let mut selector = FrameSelector::new(targets, seek);
        let mut decoded = VideoFrame::empty();

        'packets: for (stream, packet) in input_context.packets() {
            if stream.index() != stream_index {
                continue;
            }

            if let Err(error) = decoder.send_packet(&packet) {
                log::trace!("Skipping packet the decoder rejected: {error}");
                continue;
            }

            while decoder.receive_frame(&mut decoded).is_ok() {
                let time = frame_seconds(&decoded, time_base, start_offset);
                selector.offer(&mut decoded, time, scaler, &mut results)?;
                if selector.is_done() {
                    break 'packets;
                }
            }
        }

        if !selector.is_done() {
            if decoder.send_eof().is_ok() {
                while decoder.receive_frame(&mut decoded).is_ok() {
                    let time = frame_seconds(&decoded, time_base, start_offset);
                    selector.offer(&mut decoded, time, scaler, &mut results)?;
                    if selector.is_done() {
                        break;
                    }
                }
            }
            selector.finish(scaler, &mut results)?;
        }

        Ok(results)
    }
}

impl FrameDecoder for FfmpegDecoder {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn decode_at(
        &mut self,
        seconds: f64,
        seek: SeekMode,
    ) -> Result<Option<DynamicImage>, ExtractorError> {
        Ok(self.decode_forward(&[seconds], seek)?.pop().flatten())
    }

    fn decode_run(
        &mut self,
        seconds: &[f64],
        seek: SeekMode,
    ) -> Result<Vec<Option<DynamicImage>>, ExtractorError> {
        match seek {
            // Every keyframe request needs its own seek.
            SeekMode::Keyframe => seconds
                .iter()
                .map(|&timestamp| self.decode_at(timestamp, seek))
                .collect(),
            SeekMode::Exact => self.decode_forward(seconds, seek),
        }
    }
}

/// Assigns decoded frames to pending targets during a forward pass.
struct FrameSelector<'t> {
    targets: &'t [f64],
    seek: SeekMode,
    next: usize,
    candidate: VideoFrame,
    has_candidate: bool,
    candidate_image: Option<DynamicImage>,
}

impl<'t> FrameSelector<'t> {
    fn new(targets: &'t [f64], seek: SeekMode) -> Self {
        Self {
            targets,
            seek,
            next: 0,
            candidate: VideoFrame::empty(),
            has_candidate: false,
            candidate_image: None,
        }
    }

    fn is_done(&self) -> bool {
        self.next >= self.targets.len()
    }

    /// Consider one decoded frame. `frame` may be swapped with the held
    /// candidate, so callers must treat its contents as consumed.
    fn offer(
        &mut self,
        frame: &mut VideoFrame,
        time: Option<f64>,
        scaler: &mut Option<ScalingContext>,
        results: &mut [Option<DynamicImage>],
    ) -> Result<(), ExtractorError> {
        if self.is_done() {
            return Ok(());
        }

        if self.seek == SeekMode::Keyframe {
            let image = convert_frame(frame, scaler)?;
            for slot in &mut results[self.next..] {
                *slot = Some(image.clone());
            }
            self.next = self.targets.len();
            return Ok(());
        }

        // Frames without a timestamp count as an exact hit on the next target.
        let time = time.unwrap_or(self.targets[self.next]);
        let mut frame_image: Option<DynamicImage> = None;

        // Targets this frame has overshot keep the previous candidate; if
        // there is none the seek landed late and this frame is the closest.
        while !self.is_done() && time > self.targets[self.next] + FRAME_TIME_TOLERANCE {
            let image = if self.has_candidate {
                self.candidate_image(scaler)?
            } else {
                match &frame_image {
                    Some(image) => image.clone(),
                    None => {
                        let image = convert_frame(frame, scaler)?;
                        frame_image = Some(image.clone());
                        image
                    }
                }
            };
            results[self.next] = Some(image);
            self.next += 1;
        }

        if self.is_done() {
            return Ok(());
        }

        std::mem::swap(frame, &mut self.candidate);
        self.has_candidate = true;
        self.candidate_image = frame_image;

        while !self.is_done() && time >= self.targets[self.next] - FRAME_TIME_TOLERANCE {
            results[self.next] = Some(self.candidate_image(scaler)?);
            self.next += 1;
        }

        Ok(())
    }

    /// Resolve every remaining target with the last frame seen.
    fn finish(
        &mut self,
        scaler: &mut Option<ScalingContext>,
        results: &mut [Option<DynamicImage>],
    ) -> Result<(), ExtractorError> {
        if !self.has_candidate {
            return Ok(());
        }
        while !self.is_done() {
            results[self.next] = Some(self.candidate_image(scaler)?);
            self.next += 1;
        }
        Ok(())
    }

    fn candidate_image(
        &mut self,
        scaler: &mut Option<ScalingContext>,
    ) -> Result<DynamicImage, ExtractorError> {
        if let Some(image) = &self.candidate_image {
            return Ok(image.clone());
        }
        let image = convert_frame(&self.candidate, scaler)?;
        self.candidate_image = Some(image.clone());
        Ok(image)
    }
}

/// Presentation time of a decoded frame in seconds from stream start.
fn frame_seconds(frame: &VideoFrame, time_base: Rational, start_offset: f64) -> Option<f64> {
    frame
        .timestamp()
        .or_else(|| frame.pts())
        .map(|pts| pts_to_seconds(pts, time_base) - start_offset)
}

/// Convert a decoded frame of any pixel format to an RGB8 image.
///
/// The converter is rebuilt only when the frame geometry or format changes.
fn convert_frame(
    frame: &VideoFrame,
    scaler: &mut Option<ScalingContext>,
) -> Result<DynamicImage, ExtractorError> {
    let (width, height, format) = (frame.width(), frame.height(), frame.format());

    let reusable = scaler.as_ref().is_some_and(|context| {
        let input = context.input();
        input.format == format && input.width == width && input.height == height
    });
    if !reusable {
        *scaler = Some(ScalingContext::get(
            format,
            width,
            height,
            Pixel::RGB24,
            width,
            height,
            ScalingFlags::BILINEAR,
        )?);
    }
    let context = scaler.as_mut().ok_or_else(|| {
        ExtractorError::DecodeFailed("Pixel format converter unavailable".to_string())
    })?;

    let mut rgb_frame = VideoFrame::empty();
    context.run(frame, &mut rgb_frame)?;

    let buffer = frame_to_buffer(&rgb_frame, width, height, 3);
    let rgb_image = RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
        ExtractorError::DecodeFailed(
            "Failed to construct RGB image from decoded frame data".to_string(),
        )
    })?;
    Ok(DynamicImage::ImageRgb8(rgb_image))
}

/// Read the display rotation of a stream.
///
/// Prefers the display-matrix side data on the codec parameters and falls
/// back to the legacy `rotate` metadata tag.
fn read_rotation(stream: &Stream<'_>) -> Rotation {
    let parameters = stream.parameters();

    // SAFETY: `parameters` keeps the stream's AVCodecParameters alive for the
    // duration of this block; side data returned by FFmpeg is owned by it and
    // only read here after a null and size check.
    let angle = unsafe {
        let raw = parameters.as_ptr();
        let side_data = av_packet_side_data_get(
            (*raw).coded_side_data,
            (*raw).nb_coded_side_data,
            AVPacketSideDataType::AV_PKT_DATA_DISPLAYMATRIX,
        );
        if side_data.is_null() || (*side_data).size < DISPLAY_MATRIX_BYTES {
            None
        } else {
            Some(av_display_rotation_get((*side_data).data as *const i32))
        }
    };

    if let Some(angle) = angle {
        return Rotation::from_display_matrix_angle(angle);
    }

    stream
        .metadata()
        .get("rotate")
        .and_then(|value| value.trim().parse::<i32>().ok())
        .map(Rotation::from_degrees)
        .unwrap_or_default()
}
