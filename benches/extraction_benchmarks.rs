//! Benchmarks for frame extraction.
//!
//! Run with: cargo bench
//!
//! The FFmpeg benchmarks require fixture files from
//! `tests/fixtures/generate_fixtures.sh`; the rest run on an in-memory
//! backend.

use std::path::Path;
use std::time::Duration;

use criterion::Criterion;
use image::{DynamicImage, Rgb, RgbImage};
use video_frame_extractor::{
    CacheKey, DecodeMode, DecoderBackend, ExtractionConfig, ExtractorError, FfmpegLogLevel,
    FrameDecoder, FrameExtractor, FrameOptions, ImageFormat, MediaSource, SeekMode, VideoMetadata,
};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

/// Hands out the same 1280x720 gradient for every timestamp.
struct StillBackend {
    frame: DynamicImage,
}

struct StillDecoder {
    frame: DynamicImage,
    metadata: VideoMetadata,
}

impl StillBackend {
    fn new() -> Self {
        let frame = RgbImage::from_fn(1280, 720, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        Self {
            frame: DynamicImage::ImageRgb8(frame),
        }
    }
}

impl DecoderBackend for StillBackend {
    type Decoder = StillDecoder;

    fn open(&self, _source: &MediaSource) -> Result<StillDecoder, ExtractorError> {
        Ok(StillDecoder {
            frame: self.frame.clone(),
            metadata: VideoMetadata {
                width: 1280,
                height: 720,
                duration: Duration::from_secs(60),
                frames_per_second: 30.0,
                codec: "still".to_string(),
                rotation: Default::default(),
            },
        })
    }
}

impl FrameDecoder for StillDecoder {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn decode_at(
        &mut self,
        _seconds: f64,
        _seek: SeekMode,
    ) -> Result<Option<DynamicImage>, ExtractorError> {
        Ok(Some(self.frame.clone()))
    }
}

fn benchmark_cache_keys(criterion: &mut Criterion) {
    let source = MediaSource::parse("/storage/videos/holiday_2024.mp4");
    let options = FrameOptions::default().with_width(320);

    criterion.bench_function("cache key file name", |bencher| {
        bencher.iter(|| CacheKey::new(&source, 12.345, &options).file_name());
    });
}

fn benchmark_encoding(criterion: &mut Criterion) {
    let extractor = FrameExtractor::with_backend(StillBackend::new());
    let source = MediaSource::parse("still.mp4");
    let mut group = criterion.benchmark_group("encode 720p frame");

    group.bench_function("png", |bencher| {
        let options = FrameOptions::single_frame();
        bencher.iter(|| extractor.frame(&source, 1.0, &options).unwrap());
    });

    group.bench_function("jpeg q85", |bencher| {
        let options = FrameOptions::single_frame().with_image_format(ImageFormat::Jpeg);
        bencher.iter(|| extractor.frame(&source, 1.0, &options).unwrap());
    });

    group.bench_function("jpeg q85 resized to 320", |bencher| {
        let options = FrameOptions::single_frame()
            .with_image_format(ImageFormat::Jpeg)
            .with_width(320);
        bencher.iter(|| extractor.frame(&source, 1.0, &options).unwrap());
    });

    group.finish();
}

fn benchmark_ffmpeg(criterion: &mut Criterion) {
    video_frame_extractor::set_ffmpeg_log_level(FfmpegLogLevel::Error);

    if !Path::new(SAMPLE_VIDEO).exists() {
        eprintln!("Skipping FFmpeg benchmarks: fixture not found");
        return;
    }

    let extractor = FrameExtractor::new();
    let source = MediaSource::parse(SAMPLE_VIDEO);
    let seconds: Vec<f64> = (0..10).map(|step| step as f64 * 0.4).collect();
    let options = FrameOptions::default().with_width(160);

    criterion.bench_function("single frame (keyframe seek)", |bencher| {
        bencher.iter(|| {
            extractor
                .frame(&source, 2.0, &FrameOptions::single_frame())
                .unwrap()
        });
    });

    criterion.bench_function("single frame (exact seek)", |bencher| {
        let options = FrameOptions::single_frame().with_seek(SeekMode::Exact);
        bencher.iter(|| extractor.frame(&source, 2.3, &options).unwrap());
    });

    let mut group = criterion.benchmark_group("10 frames");
    for mode in [DecodeMode::Sequential, DecodeMode::Batched] {
        let config = ExtractionConfig::new().with_decode_mode(mode);
        group.bench_function(mode.label(), |bencher| {
            bencher.iter(|| {
                extractor
                    .frames_with_config(&source, &seconds, &options, &config)
                    .unwrap()
            });
        });
    }
    group.finish();
}

criterion::criterion_group!(
    benches,
    benchmark_cache_keys,
    benchmark_encoding,
    benchmark_ffmpeg,
);
criterion::criterion_main!(benches);
