//! Stream metadata exposed by an open decoder.
//!
//! Read once when a [`FrameDecoder`](crate::FrameDecoder) is opened and kept
//! for the lifetime of the handle, so batch workflows pay for rotation and
//! dimension lookup once per call rather than once per frame.

use std::time::Duration;

use crate::rotation::Rotation;

/// Metadata for the video stream frames are extracted from.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct VideoMetadata {
    /// Coded frame width in pixels (before rotation).
    pub width: u32,
    /// Coded frame height in pixels (before rotation).
    pub height: u32,
    /// Container duration. Zero when unknown.
    pub duration: Duration,
    /// Average frame rate. Zero when unknown.
    pub frames_per_second: f64,
    /// Codec name (e.g. `"h264"`, `"hevc"`).
    pub codec: String,
    /// Rotation needed to display frames upright.
    pub rotation: Rotation,
}

impl VideoMetadata {
    /// Dimensions after applying [`rotation`](VideoMetadata::rotation).
    pub fn display_dimensions(&self) -> (u32, u32) {
        if self.rotation.swaps_dimensions() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(rotation: Rotation) -> VideoMetadata {
        VideoMetadata {
            width: 1920,
            height: 1080,
            duration: Duration::from_secs(3),
            frames_per_second: 30.0,
            codec: "h264".to_string(),
            rotation,
        }
    }

    #[test]
    fn quarter_turns_swap_display_dimensions() {
        assert_eq!(metadata(Rotation::None).display_dimensions(), (1920, 1080));
        assert_eq!(metadata(Rotation::Clockwise180).display_dimensions(), (1920, 1080));
        assert_eq!(metadata(Rotation::Clockwise90).display_dimensions(), (1080, 1920));
        assert_eq!(metadata(Rotation::Clockwise270).display_dimensions(), (1080, 1920));
    }
}
