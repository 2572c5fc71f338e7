//! Extract a handful of frames from a video, in memory and through the cache.
//!
//! Usage:
//!   cargo run --example extract_frames -- <input_file> [cache_dir]

use std::error::Error;
use std::sync::Arc;

use video_frame_extractor::{
    CacheOptions, DecodeMode, ExtractionConfig, FrameExtractor, FrameOptions, MediaSource,
    ProgressCallback, ProgressInfo,
};

struct PrintProgress;

impl ProgressCallback for PrintProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let (Some(percentage), Some(seconds)) = (info.percentage, info.current_timestamp) {
            println!("  {percentage:5.1}% (t={seconds}s)");
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let input_path = args.next().unwrap_or_else(|| "input.mp4".to_string());
    let cache_dir = args
        .next()
        .unwrap_or_else(|| std::env::temp_dir().join("frame_demo").display().to_string());

    let extractor = FrameExtractor::new();
    let source = MediaSource::parse(&input_path);

    // --- One poster frame ------------------------------------------------------
    let png = extractor.frame(&source, 1.0, &FrameOptions::single_frame().with_width(640))?;
    std::fs::write("poster.png", &png)?;
    println!("Saved poster.png ({} bytes)", png.len());

    // --- Thumbnails in memory, batched decode ----------------------------------
    let seconds = [0.0, 2.0, 4.0, -1.0, 6.0];
    let config = ExtractionConfig::new()
        .with_decode_mode(DecodeMode::Batched)
        .with_progress(Arc::new(PrintProgress));
    let thumbnails = extractor.frames_with_config(
        &source,
        &seconds,
        &FrameOptions::default().with_width(160),
        &config,
    )?;
    for (second, thumbnail) in seconds.iter().zip(&thumbnails) {
        match thumbnail {
            Some(bytes) => println!("{second:>5}s -> {} bytes", bytes.len()),
            None => println!("{second:>5}s -> (none)"),
        }
    }

    // --- Same frames through the file cache ------------------------------------
    let paths = extractor.frames_to_files(
        &source,
        &seconds,
        &FrameOptions::default().with_width(160),
        &CacheOptions::new().with_directory(&cache_dir),
    )?;
    for path in paths.iter().flatten() {
        println!("cached {}", path.display());
    }

    Ok(())
}
