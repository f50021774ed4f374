//! PNM emission straight from pixel buffers.
//!
//! The raw (`*_raw`) variants are the header-less payloads the TCP protocol
//! serves; the headered variants are the PNM bodies served over HTTP.

use image::{GrayImage, RgbImage};

/// Bytes per packed 1-bit row.
#[inline]
pub fn pbm_row_stride(w: u32) -> usize {
    (w as usize).div_ceil(8)
}

/// Pack a bilevel image into 1-bit rows, MSB first. Set bits are black
/// (PBM convention); luminance ≥ 128 counts as white.
///
/// Packing starts at each row's first pixel, so a crop is always re-aligned
/// to its own byte boundary no matter where it sat in the source bitmap.
pub fn encode_pbm_raw(img: &GrayImage) -> Vec<u8> {
    let stride = pbm_row_stride(img.width());
    let mut out = vec![0u8; stride * img.height() as usize];

    for (x, y, pixel) in img.enumerate_pixels() {
        if pixel.0[0] < 128 {
            out[y as usize * stride + x as usize / 8] |= 0x80 >> (x % 8);
        }
    }

    out
}

/// PBM (`P4`) with header.
pub fn encode_pbm(img: &GrayImage) -> Vec<u8> {
    let mut out = format!("P4\n{} {}\n", img.width(), img.height()).into_bytes();
    out.extend_from_slice(&encode_pbm_raw(img));
    out
}

/// 8-bit luminance rows, no header.
pub fn encode_pgm_raw(img: &GrayImage) -> Vec<u8> {
    img.as_raw().clone()
}

/// 24-bit RGB rows, no header.
pub fn encode_ppm_raw(img: &RgbImage) -> Vec<u8> {
    img.as_raw().clone()
}

/// PPM (`P6`) with header.
pub fn encode_ppm(img: &RgbImage) -> Vec<u8> {
    let mut out = format!("P6\n{} {}\n255\n", img.width(), img.height()).into_bytes();
    out.extend_from_slice(&encode_ppm_raw(img));
    out
}

// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use image::Luma;

    #[test]
    fn row_stride() {
        assert_eq!(pbm_row_stride(1), 1);
        assert_eq!(pbm_row_stride(8), 1);
        assert_eq!(pbm_row_stride(9), 2);
        assert_eq!(pbm_row_stride(800), 100);
    }

    #[test]
    fn pack_bits_msb_first() {
        // 10 pixels: black at 0, 7, 8, everything else white.
        let img = GrayImage::from_fn(10, 1, |x, _| {
            if matches!(x, 0 | 7 | 8) {
                Luma([0])
            } else {
                Luma([255])
            }
        });

        assert_eq!(encode_pbm_raw(&img), vec![0b1000_0001, 0b1000_0000]);
    }

    #[test]
    fn rows_are_padded_independently() {
        // An all-black 3x2 image: each row packs to its own byte.
        let img = GrayImage::from_pixel(3, 2, Luma([0]));
        assert_eq!(encode_pbm_raw(&img), vec![0b1110_0000, 0b1110_0000]);
    }

    #[test]
    fn pbm_header_prefixes_payload() {
        let img = GrayImage::from_pixel(800, 8, Luma([255]));
        let raw = encode_pbm_raw(&img);
        assert_eq!(raw.len(), 800);

        let with_header = encode_pbm(&img);
        assert!(with_header.starts_with(b"P4\n800 8\n"));
        assert_eq!(&with_header[b"P4\n800 8\n".len()..], &raw[..]);
    }

    #[test]
    fn ppm_header_prefixes_payload() {
        let img = RgbImage::from_pixel(2, 2, image::Rgb([1, 2, 3]));
        let raw = encode_ppm_raw(&img);
        assert_eq!(raw.len(), 12);

        let with_header = encode_ppm(&img);
        assert!(with_header.starts_with(b"P6\n2 2\n255\n"));
        assert_eq!(&with_header[b"P6\n2 2\n255\n".len()..], &raw[..]);
    }

    #[test]
    fn pgm_raw_is_the_pixel_buffer() {
        let img = GrayImage::from_fn(4, 2, |x, y| Luma([(x + 4 * y) as u8]));
        assert_eq!(encode_pgm_raw(&img), vec![0, 1, 2, 3, 4, 5, 6, 7]);
    }
}
