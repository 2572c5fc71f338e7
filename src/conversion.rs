//! Internal conversion helpers.
//!
//! Pixel-data copying and timestamp conversion shared by the FFmpeg backend.

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Copy pixel data from an FFmpeg video frame into a tightly-packed buffer.
///
/// `bytes_per_pixel` is 3 for RGB24.
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let expected_stride = (width as usize) * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == expected_stride {
        data[..expected_stride * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(expected_stride * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + expected_stride]);
        }
        buffer
    }
}

/// Convert seconds to a container seek timestamp in AV_TIME_BASE
/// (microseconds), as expected by `Input::seek`.
pub(crate) fn seconds_to_seek_timestamp(seconds: f64) -> i64 {
    (seconds * 1_000_000.0) as i64
}

/// Rescale a PTS value from stream time base to seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seek_timestamp_is_microseconds() {
        assert_eq!(seconds_to_seek_timestamp(1.5), 1_500_000);
        assert_eq!(seconds_to_seek_timestamp(0.0), 0);
    }

    #[test]
    fn pts_rescales_by_time_base() {
        let seconds = pts_to_seconds(90_000, Rational::new(1, 90_000));
        assert!((seconds - 1.0).abs() < f64::EPSILON);
        let seconds = pts_to_seconds(512, Rational::new(1, 12_800));
        assert!((seconds - 0.04).abs() < 1e-9);
    }
}
