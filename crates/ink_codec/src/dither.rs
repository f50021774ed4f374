use image::imageops::{dither, BiLevel, ColorMap};
use image::{DynamicImage, Rgb};

use ink_types::{ColorMode, Mode};

/// The four colors a 2-bit RGB panel can show.
pub const QUAD_PALETTE: [Rgb<u8>; 4] = [
    Rgb([0, 0, 0]),
    Rgb([255, 0, 0]),
    Rgb([0, 255, 0]),
    Rgb([0, 0, 255]),
];

/// [`ColorMap`] over [`QUAD_PALETTE`], nearest color by squared distance.
pub struct QuadPalette;

impl ColorMap for QuadPalette {
    type Color = Rgb<u8>;

    fn index_of(&self, color: &Rgb<u8>) -> usize {
        let mut best = 0;
        let mut best_distance = u32::MAX;
        for (i, palette_color) in QUAD_PALETTE.iter().enumerate() {
            let distance: u32 = color
                .0
                .iter()
                .zip(palette_color.0.iter())
                .map(|(&a, &b)| {
                    let d = a as i32 - b as i32;
                    (d * d) as u32
                })
                .sum();
            if distance < best_distance {
                best_distance = distance;
                best = i;
            }
        }
        best
    }

    fn lookup(&self, index: usize) -> Option<Rgb<u8>> {
        QUAD_PALETTE.get(index).copied()
    }

    fn has_lookup(&self) -> bool {
        true
    }

    fn map_color(&self, color: &mut Rgb<u8>) {
        *color = QUAD_PALETTE[self.index_of(color)];
    }
}

// ----------------------------------------------------------------------------

/// Quantize a frame (already at the mode's dimensions) to the mode's pixel
/// format.
///
/// Grayscale and black & white modes come out as `Luma8`, color modes as
/// `Rgb8`; in both cases the pixel values are restricted to what the panel
/// can actually show, so the result can be saved as an ordinary PNG.
pub fn dither_to_mode(frame: &DynamicImage, mode: Mode) -> DynamicImage {
    match (mode.bits, mode.color) {
        (1, ColorMode::BlackWhite) => {
            // Floyd–Steinberg against {black, white}.
            let mut gray = frame.to_luma8();
            dither(&mut gray, &BiLevel);
            DynamicImage::ImageLuma8(gray)
        }

        (2, ColorMode::Gray) => {
            // Four evenly spaced levels, no error diffusion.
            let mut gray = frame.to_luma8();
            for pixel in gray.pixels_mut() {
                pixel.0[0] = (pixel.0[0] / 64) * 85;
            }
            DynamicImage::ImageLuma8(gray)
        }

        (8, ColorMode::Gray) => DynamicImage::ImageLuma8(frame.to_luma8()),

        (2, ColorMode::Rgb) => {
            // Floyd–Steinberg against the four-color palette.
            let mut rgb = frame.to_rgb8();
            dither(&mut rgb, &QuadPalette);
            DynamicImage::ImageRgb8(rgb)
        }

        (8, ColorMode::Rgb) => DynamicImage::ImageRgb8(frame.to_rgb8()),

        // `Mode` construction rejects everything else.
        (bits, color) => unreachable!("illegal mode: {bits} bits, {color:?}"),
    }
}

// ----------------------------------------------------------------------------
