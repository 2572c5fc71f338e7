//! Display rotation of video streams.
//!
//! Phone cameras store frames in sensor orientation and record the intended
//! display orientation as a display matrix (or, in older files, a `rotate`
//! tag). [`Rotation`] is that orientation snapped to quarter turns, and knows
//! how to apply itself to a decoded image.

use image::DynamicImage;

/// Clockwise rotation needed to display a frame upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    /// Already upright.
    #[default]
    None,
    /// Rotate 90° clockwise.
    Clockwise90,
    /// Rotate 180°.
    Clockwise180,
    /// Rotate 270° clockwise.
    Clockwise270,
}

impl Rotation {
    /// Snap an arbitrary clockwise angle in degrees to the nearest quarter turn.
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            0..=44 | 316..=359 => Rotation::None,
            45..=134 => Rotation::Clockwise90,
            135..=224 => Rotation::Clockwise180,
            _ => Rotation::Clockwise270,
        }
    }

    /// Convert FFmpeg's counter-clockwise display-matrix angle (as returned
    /// by `av_display_rotation_get`) into a clockwise display rotation.
    ///
    /// Non-finite angles (degenerate matrices) map to [`Rotation::None`].
    pub fn from_display_matrix_angle(counter_clockwise: f64) -> Self {
        if !counter_clockwise.is_finite() {
            return Rotation::None;
        }
        Self::from_degrees(-(counter_clockwise.round() as i32))
    }

    /// Clockwise angle in degrees.
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Clockwise90 => 90,
            Rotation::Clockwise180 => 180,
            Rotation::Clockwise270 => 270,
        }
    }

    /// Whether width and height trade places.
    pub fn swaps_dimensions(self) -> bool {
        matches!(self, Rotation::Clockwise90 | Rotation::Clockwise270)
    }

    /// Rotate `image` into display orientation.
    pub fn apply(self, image: DynamicImage) -> DynamicImage {
        match self {
            Rotation::None => image,
            Rotation::Clockwise90 => image.rotate90(),
            Rotation::Clockwise180 => image.rotate180(),
            Rotation::Clockwise270 => image.rotate270(),
        }
    }
}
