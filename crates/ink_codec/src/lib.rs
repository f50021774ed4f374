//! The mode codec: turns a captured RGB frame into the exact pixel buffer an
//! e-ink display mode calls for, and emits the wire encodings devices read.
//!
//! All functions here are pure and deterministic over their input bytes.

mod dither;
mod formats;
mod pnm;

pub use dither::{dither_to_mode, QuadPalette, QUAD_PALETTE};
pub use formats::{FormatParseError, RawFormat, TileFormat};
pub use pnm::{
    encode_pbm, encode_pbm_raw, encode_pgm_raw, encode_ppm, encode_ppm_raw, pbm_row_stride,
};

use image::DynamicImage;

use ink_types::{Mode, Rotation};

/// Rotate, resample, and dither a captured frame into `mode`'s pixel format.
///
/// The frame arrives as captured by the browser (viewport already sized for
/// the rotation), so rotation is applied first, then a Lanczos-3 downscale to
/// the mode's dimensions, then quantization.
pub fn process_frame(frame: &DynamicImage, rotation: Rotation, mode: Mode) -> DynamicImage {
    let rotated = match rotation {
        Rotation::None => frame.clone(),
        Rotation::Cw90 => frame.rotate90(),
        Rotation::Ccw90 => frame.rotate270(),
        Rotation::Half => frame.rotate180(),
    };

    let resized = if rotated.width() == mode.width && rotated.height() == mode.height {
        rotated
    } else {
        rotated.resize_exact(
            mode.width,
            mode.height,
            image::imageops::FilterType::Lanczos3,
        )
    };

    dither_to_mode(&resized, mode)
}

// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use image::{Rgb, RgbImage};

    fn gradient(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    fn mode(s: &str) -> Mode {
        s.parse().unwrap()
    }

    #[test]
    fn output_matches_mode_dimensions() {
        let frame = gradient(1000, 700);
        for m in ["800x480x1xB", "800x480x2xG", "800x480x8xRGB"] {
            let out = process_frame(&frame, Rotation::None, mode(m));
            assert_eq!((out.width(), out.height()), (800, 480));
        }
    }

    #[test]
    fn rotated_portrait_capture_becomes_landscape() {
        // A 90°-rotated page is captured with swapped axes…
        let frame = gradient(480, 800);
        let out = process_frame(&frame, Rotation::Cw90, mode("800x480x1xB"));
        // …and comes out at the mode's own dimensions.
        assert_eq!((out.width(), out.height()), (800, 480));
    }

    #[test]
    fn deterministic() {
        let frame = gradient(900, 500);
        for m in ["800x480x1xB", "800x480x2xRGB"] {
            let a = process_frame(&frame, Rotation::None, mode(m));
            let b = process_frame(&frame, Rotation::None, mode(m));
            assert_eq!(a.as_bytes(), b.as_bytes());
        }
    }

    #[test]
    fn black_white_output_is_bilevel() {
        let out = process_frame(&gradient(800, 480), Rotation::None, mode("800x480x1xB"));
        let gray = out.to_luma8();
        assert!(gray.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert_eq!(out.color(), image::ColorType::L8);
    }

    #[test]
    fn quad_color_output_uses_only_the_palette() {
        let out = process_frame(&gradient(800, 480), Rotation::None, mode("800x480x2xRGB"));
        let rgb = out.to_rgb8();
        assert!(rgb.pixels().all(|p| QUAD_PALETTE.contains(p)));
    }

    #[test]
    fn gray2_output_uses_four_levels() {
        let out = process_frame(&gradient(800, 480), Rotation::None, mode("800x480x2xG"));
        let gray = out.to_luma8();
        assert!(gray
            .pixels()
            .all(|p| matches!(p.0[0], 0 | 85 | 170 | 255)));
    }

    #[test]
    fn color_type_per_mode() {
        let frame = gradient(800, 480);
        let cases = [
            ("800x480x1xB", image::ColorType::L8),
            ("800x480x2xG", image::ColorType::L8),
            ("800x480x8xG", image::ColorType::L8),
            ("800x480x2xRGB", image::ColorType::Rgb8),
            ("800x480x8xRGB", image::ColorType::Rgb8),
        ];
        for (m, expected) in cases {
            let out = process_frame(&frame, Rotation::None, mode(m));
            assert_eq!(out.color(), expected, "mode {m}");
        }
    }
}
