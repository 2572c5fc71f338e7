//! Extraction workflow tests against the synthetic backend.

mod common;

use std::sync::{Arc, Mutex};

use common::{HEIGHT, SyntheticBackend, WIDTH, dimensions_of, red_of};
use video_frame_extractor::{
    CancellationToken, DecodeMode, ErrorCode, ExtractionConfig, ExtractorError, FrameExtractor,
    FrameOptions, ImageFormat, MediaSource, OperationType, ProgressCallback, ProgressInfo,
    Rotation, SeekMode,
};

fn source() -> MediaSource {
    MediaSource::parse("/videos/clip.mp4")
}

fn png_batch() -> FrameOptions {
    FrameOptions::default().with_image_format(ImageFormat::Png)
}

// ── Single frame ───────────────────────────────────────────────────

#[test]
fn single_frame_returns_png_by_default() {
    let extractor = FrameExtractor::with_backend(SyntheticBackend::new());
    let bytes = extractor
        .frame(&source(), 2.0, &FrameOptions::single_frame())
        .expect("frame");
    assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
    assert_eq!(red_of(&bytes), 20);
    assert_eq!(dimensions_of(&bytes), (WIDTH, HEIGHT));
}

#[test]
fn single_frame_rejects_negative_time_without_opening() {
    let backend = SyntheticBackend::new();
    let counters = backend.counters.clone();
    let extractor = FrameExtractor::with_backend(backend);

    let error = extractor
        .frame(&source(), -1.0, &FrameOptions::single_frame())
        .unwrap_err();
    assert_eq!(error.code(), ErrorCode::InvalidArgs);
    assert_eq!(counters.opens(), 0);
}

#[test]
fn single_frame_past_end_is_decode_failed() {
    let backend = SyntheticBackend::new();
    let counters = backend.counters.clone();
    let extractor = FrameExtractor::with_backend(backend);

    let error = extractor
        .frame(&source(), 60.0, &FrameOptions::single_frame())
        .unwrap_err();
    assert_eq!(error.code(), ErrorCode::DecodeFailed);
    assert_eq!(counters.opens(), counters.drops());
}

#[test]
fn single_frame_always_rotates() {
    let extractor =
        FrameExtractor::with_backend(SyntheticBackend::new().rotated(Rotation::Clockwise90));
    let options = FrameOptions::single_frame().with_apply_rotation(false);
    let bytes = extractor.frame(&source(), 1.0, &options).expect("frame");
    assert_eq!(dimensions_of(&bytes), (HEIGHT, WIDTH));
}

#[test]
fn single_frame_width_only_keeps_aspect_by_truncation() {
    let extractor = FrameExtractor::with_backend(SyntheticBackend::new());
    let options = FrameOptions::single_frame().with_width(10);
    let bytes = extractor.frame(&source(), 1.0, &options).expect("frame");
    // 36 * 10 / 64 = 5.625
    assert_eq!(dimensions_of(&bytes), (10, 5));
}

#[test]
fn single_frame_jpeg() {
    let extractor = FrameExtractor::with_backend(SyntheticBackend::new());
    let options = FrameOptions::single_frame()
        .with_format("jpg")
        .with_seek(SeekMode::Exact);
    let bytes = extractor.frame(&source(), 1.0, &options).expect("frame");
    assert!(bytes.starts_with(&[0xFF, 0xD8]));
}

// ── Batches ────────────────────────────────────────────────────────

#[test]
fn batch_is_index_aligned_with_invalid_slots_empty() {
    let extractor = FrameExtractor::with_backend(SyntheticBackend::new());
    let frames = extractor
        .frames(&source(), &[1.0, -1.0, 5.0], &FrameOptions::default())
        .expect("frames");

    assert_eq!(frames.len(), 3);
    assert!(frames[0].as_ref().is_some_and(|bytes| !bytes.is_empty()));
    assert!(frames[1].is_none());
    assert!(frames[2].as_ref().is_some_and(|bytes| !bytes.is_empty()));
}

#[test]
fn batch_defaults_to_jpeg() {
    let extractor = FrameExtractor::with_backend(SyntheticBackend::new());
    let frames = extractor
        .frames(&source(), &[0.0], &FrameOptions::default())
        .expect("frames");
    let bytes = frames[0].as_ref().expect("slot 0");
    assert!(bytes.starts_with(&[0xFF, 0xD8]));
}

#[test]
fn batch_past_end_and_nan_are_empty() {
    let extractor = FrameExtractor::with_backend(SyntheticBackend::new());
    let frames = extractor
        .frames(&source(), &[f64::NAN, 11.0, 3.0], &png_batch())
        .expect("frames");
    assert!(frames[0].is_none());
    assert!(frames[1].is_none());
    assert_eq!(red_of(frames[2].as_ref().expect("slot 2")), 30);
}

#[test]
fn batch_preserves_request_order_with_duplicates() {
    let extractor = FrameExtractor::with_backend(SyntheticBackend::new());
    let seconds = [9.0, 0.5, 4.0, 0.5];
    let frames = extractor
        .frames(&source(), &seconds, &png_batch())
        .expect("frames");
    let reds: Vec<u8> = frames
        .iter()
        .map(|frame| red_of(frame.as_ref().expect("frame")))
        .collect();
    assert_eq!(reds, vec![90, 5, 40, 5]);
}

#[test]
fn batch_honours_apply_rotation() {
    let extractor =
        FrameExtractor::with_backend(SyntheticBackend::new().rotated(Rotation::Clockwise270));

    let rotated = extractor
        .frames(&source(), &[1.0], &png_batch())
        .expect("frames");
    assert_eq!(dimensions_of(rotated[0].as_ref().unwrap()), (HEIGHT, WIDTH));

    let stored = extractor
        .frames(&source(), &[1.0], &png_batch().with_apply_rotation(false))
        .expect("frames");
    assert_eq!(dimensions_of(stored[0].as_ref().unwrap()), (WIDTH, HEIGHT));
}

#[test]
fn batch_height_only_derives_width() {
    let extractor = FrameExtractor::with_backend(SyntheticBackend::new());
    let frames = extractor
        .frames(&source(), &[1.0], &png_batch().with_height(20))
        .expect("frames");
    // 64 * 20 / 36 = 35.5
    assert_eq!(dimensions_of(frames[0].as_ref().unwrap()), (35, 20));
}

#[test]
fn batch_both_dimensions_resize_exactly() {
    let extractor = FrameExtractor::with_backend(SyntheticBackend::new());
    let frames = extractor
        .frames(&source(), &[1.0], &png_batch().with_size(Some(7), Some(9)))
        .expect("frames");
    assert_eq!(dimensions_of(frames[0].as_ref().unwrap()), (7, 9));
}

#[test]
fn decoder_fault_aborts_batch() {
    let backend = SyntheticBackend::new().failing_at(5.0);
    let counters = backend.counters.clone();
    let extractor = FrameExtractor::with_backend(backend);

    let result = extractor.frames(&source(), &[1.0, 5.0, 7.0], &FrameOptions::default());
    assert!(result.is_err());
    assert_eq!(counters.opens(), counters.drops());
}

#[test]
fn all_invalid_slots_still_open_the_source() {
    let backend = SyntheticBackend::new().unopenable();
    let extractor = FrameExtractor::with_backend(backend);
    let result = extractor.frames(&source(), &[-1.0, -2.0], &FrameOptions::default());
    assert!(matches!(result, Err(ExtractorError::FileOpen { .. })));
}

#[test]
fn unopenable_source_fails_the_call() {
    let extractor = FrameExtractor::with_backend(SyntheticBackend::new().unopenable());
    let error = extractor
        .frames(&source(), &[1.0], &FrameOptions::default())
        .unwrap_err();
    assert_eq!(error.code(), ErrorCode::InternalError);
}

// ── Decode modes ───────────────────────────────────────────────────

#[test]
fn batched_and_sequential_modes_agree() {
    let seconds = [9.0, 0.5, 4.0, 0.5, -2.0, 12.0, 3.9, 7.25];
    let extractor = FrameExtractor::with_backend(SyntheticBackend::new());

    let sequential = extractor
        .frames_with_config(
            &source(),
            &seconds,
            &png_batch(),
            &ExtractionConfig::new().with_decode_mode(DecodeMode::Sequential),
        )
        .expect("sequential");
    let batched = extractor
        .frames_with_config(
            &source(),
            &seconds,
            &png_batch(),
            &ExtractionConfig::new().with_decode_mode(DecodeMode::Batched),
        )
        .expect("batched");

    assert_eq!(sequential.len(), seconds.len());
    assert_eq!(sequential, batched);
}

#[test]
fn batched_mode_releases_every_decoder() {
    let backend = SyntheticBackend::new();
    let counters = backend.counters.clone();
    let extractor = FrameExtractor::with_backend(backend);

    extractor
        .frames_with_config(
            &source(),
            &[0.0, 3.0, 6.0, 9.0],
            &FrameOptions::default(),
            &ExtractionConfig::new().with_decode_mode(DecodeMode::Batched),
        )
        .expect("frames");

    assert!(counters.opens() >= 1);
    assert_eq!(counters.opens(), counters.drops());
    assert_eq!(counters.decodes(), 4);
}

#[test]
fn batched_mode_fault_aborts_and_releases() {
    let backend = SyntheticBackend::new().failing_at(6.0);
    let counters = backend.counters.clone();
    let extractor = FrameExtractor::with_backend(backend);

    let result = extractor.frames_with_config(
        &source(),
        &[0.0, 3.0, 6.0, 9.0],
        &FrameOptions::default(),
        &ExtractionConfig::new().with_decode_mode(DecodeMode::Batched),
    );
    assert!(result.is_err());
    assert_eq!(counters.opens(), counters.drops());
}

// ── Progress & cancellation ────────────────────────────────────────

struct RecordingProgress {
    infos: Mutex<Vec<ProgressInfo>>,
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.infos.lock().unwrap().push(info.clone());
    }
}

#[test]
fn progress_reports_every_slot_and_finishes() {
    let recorder = Arc::new(RecordingProgress {
        infos: Mutex::new(Vec::new()),
    });
    let extractor = FrameExtractor::with_backend(SyntheticBackend::new());
    let config = ExtractionConfig::new().with_progress(recorder.clone());

    extractor
        .frames_with_config(&source(), &[1.0, -1.0, 2.0], &FrameOptions::default(), &config)
        .expect("frames");

    let infos = recorder.infos.lock().unwrap();
    assert_eq!(infos.len(), 4);
    assert!(infos.iter().all(|info| info.operation == OperationType::FrameBatch));
    let last = infos.last().unwrap();
    assert_eq!(last.current, 3);
    assert_eq!(last.total, Some(3));
    assert_eq!(last.percentage, Some(100.0));
}

#[test]
fn cancelled_batch_returns_error() {
    let token = CancellationToken::new();
    token.cancel();
    let extractor = FrameExtractor::with_backend(SyntheticBackend::new());

    for mode in [DecodeMode::Sequential, DecodeMode::Batched] {
        let config = ExtractionConfig::new()
            .with_cancellation(token.clone())
            .with_decode_mode(mode);
        let result =
            extractor.frames_with_config(&source(), &[1.0, 2.0], &FrameOptions::default(), &config);
        match result {
            Err(ExtractorError::Cancelled) => {}
            other => panic!("Expected Cancelled in {mode:?}, got: {other:?}"),
        }
    }
}
