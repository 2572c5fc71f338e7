//! Post-decode processing: rotate, resize, encode.

use std::io::Cursor;

use image::{
    DynamicImage,
    codecs::{jpeg::JpegEncoder, png::PngEncoder},
    imageops::FilterType,
};

use crate::config::{FrameOptions, ImageFormat};
use crate::error::ExtractorError;
use crate::rotation::Rotation;

/// Turn a decoded frame into encoded image bytes.
///
/// `rotation` is applied first, so a width-only request on a portrait clip
/// derives the height from the upright frame.
pub(crate) fn render_frame(
    frame: DynamicImage,
    rotation: Rotation,
    options: &FrameOptions,
) -> Result<Vec<u8>, ExtractorError> {
    let upright = rotation.apply(frame);
    let sized = resize(upright, options);
    encode(&sized, options.format, options.quality)
}

fn resize(image: DynamicImage, options: &FrameOptions) -> DynamicImage {
    if !options.wants_resize() {
        return image;
    }
    let (width, height) = options.resolve_dimensions(image.width(), image.height());
    if (width, height) == (image.width(), image.height()) {
        return image;
    }
    image.resize_exact(width, height, FilterType::Triangle)
}

/// Encode `image` as PNG or JPEG.
///
/// PNG ignores `quality`. An encoder that produces no bytes is reported as
/// [`ExtractorError::EncodeFailed`].
pub(crate) fn encode(
    image: &DynamicImage,
    format: ImageFormat,
    quality: u8,
) -> Result<Vec<u8>, ExtractorError> {
    let mut buffer = Cursor::new(Vec::new());

    let written = match format {
        ImageFormat::Png => image.write_with_encoder(PngEncoder::new(&mut buffer)),
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel and the encoder rejects quality 0.
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
            rgb.write_with_encoder(encoder)
        }
    };
    written.map_err(|error| ExtractorError::EncodeFailed(error.to_string()))?;

    let bytes = buffer.into_inner();
    if bytes.is_empty() {
        return Err(ExtractorError::EncodeFailed(format!(
            "{} encoder produced no output",
            format.label()
        )));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7) as u8, (y * 11) as u8, ((x + y) * 3) as u8])
        }))
    }

    #[test]
    fn png_ignores_quality() {
        let image = gradient(32, 16);
        let low = encode(&image, ImageFormat::Png, 1).unwrap();
        let high = encode(&image, ImageFormat::Png, 100).unwrap();
        assert_eq!(low, high);
        assert!(low.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn jpeg_quality_changes_output() {
        let image = gradient(64, 64);
        let low = encode(&image, ImageFormat::Jpeg, 5).unwrap();
        let high = encode(&image, ImageFormat::Jpeg, 100).unwrap();
        assert!(low.starts_with(&[0xFF, 0xD8]));
        assert!(low.len() < high.len());
    }

    #[test]
    fn jpeg_quality_zero_still_encodes() {
        let bytes = encode(&gradient(8, 8), ImageFormat::Jpeg, 0).unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn rotation_happens_before_resize() {
        let options = FrameOptions::single_frame().with_width(50);
        let bytes = render_frame(gradient(200, 100), Rotation::Clockwise90, &options).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        // Upright frame is 100x200; width 50 derives height 100.
        assert_eq!((decoded.width(), decoded.height()), (50, 100));
    }
}
