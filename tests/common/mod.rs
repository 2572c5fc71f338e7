//! A deterministic in-memory decoder backend for workflow tests.
//!
//! Every "video" is `duration` seconds long. The frame at time `t` is a solid
//! colour whose red channel is `t * 10` (rounded), so tests can tell which
//! timestamp a PNG came from.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use image::{DynamicImage, Rgb, RgbImage};
use video_frame_extractor::{
    DecoderBackend, ExtractorError, FrameDecoder, MediaSource, Rotation, SeekMode, VideoMetadata,
};

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 36;

/// Open/decode/drop counters shared by a backend and its decoders.
#[derive(Debug, Default)]
pub struct Counters {
    pub opens: AtomicUsize,
    pub decodes: AtomicUsize,
    pub drops: AtomicUsize,
}

impl Counters {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }

    pub fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    pub duration: f64,
    pub rotation: Rotation,
    /// Timestamps whose decode fails with a decoder fault.
    pub failing: Vec<f64>,
    /// Sleep this long in every decode.
    pub delay: Option<Duration>,
    pub fail_open: bool,
    pub counters: Arc<Counters>,
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self {
            duration: 10.0,
            rotation: Rotation::None,
            failing: Vec::new(),
            delay: None,
            fail_open: false,
            counters: Arc::new(Counters::default()),
        }
    }
}

impl SyntheticBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rotated(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn failing_at(mut self, seconds: f64) -> Self {
        self.failing.push(seconds);
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn unopenable(mut self) -> Self {
        self.fail_open = true;
        self
    }
}

pub struct SyntheticDecoder {
    backend: SyntheticBackend,
    metadata: VideoMetadata,
}

impl DecoderBackend for SyntheticBackend {
    type Decoder = SyntheticDecoder;

    fn open(&self, source: &MediaSource) -> Result<SyntheticDecoder, ExtractorError> {
        if self.fail_open {
            return Err(ExtractorError::FileOpen {
                input: source.to_string(),
                reason: "No such file or directory".to_string(),
            });
        }
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(SyntheticDecoder {
            backend: self.clone(),
            metadata: VideoMetadata {
                width: WIDTH,
                height: HEIGHT,
                duration: Duration::from_secs_f64(self.duration),
                frames_per_second: 25.0,
                codec: "synthetic".to_string(),
                rotation: self.rotation,
            },
        })
    }
}

impl FrameDecoder for SyntheticDecoder {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn decode_at(
        &mut self,
        seconds: f64,
        _seek: SeekMode,
    ) -> Result<Option<DynamicImage>, ExtractorError> {
        if let Some(delay) = self.backend.delay {
            thread::sleep(delay);
        }
        self.backend.counters.decodes.fetch_add(1, Ordering::SeqCst);

        if self.backend.failing.contains(&seconds) {
            return Err(ExtractorError::DecodeFailed(format!(
                "corrupt packet at {seconds}s"
            )));
        }
        if seconds > self.backend.duration {
            return Ok(None);
        }
        Ok(Some(frame_for(seconds)))
    }
}

impl Drop for SyntheticDecoder {
    fn drop(&mut self) {
        self.backend.counters.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// The frame the synthetic backend produces for `seconds`.
pub fn frame_for(seconds: f64) -> DynamicImage {
    let red = (seconds * 10.0).round().clamp(0.0, 255.0) as u8;
    DynamicImage::ImageRgb8(RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([red, 40, 200])))
}

/// Red channel of the top-left pixel of an encoded image.
pub fn red_of(bytes: &[u8]) -> u8 {
    let image = image::load_from_memory(bytes).expect("decodable image");
    image.to_rgb8().get_pixel(0, 0).0[0]
}

/// Dimensions of an encoded image.
pub fn dimensions_of(bytes: &[u8]) -> (u32, u32) {
    let image = image::load_from_memory(bytes).expect("decodable image");
    (image.width(), image.height())
}
