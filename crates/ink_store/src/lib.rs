//! The snapshot store: one PNG per `(page, mode)`, replaced atomically, with
//! cached short hashes and tile cropping in the encodings devices consume.
//!
//! Readers never observe a half-written bitmap: writes go to a temp file in
//! the same directory and are renamed over the final path.

use std::io::{Cursor, Write as _};
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use parking_lot::RwLock;

use ink_codec::{RawFormat, TileFormat};
use ink_types::Mode;

// ----------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum SnapshotError {
    #[error("image not available for {page} in mode {mode}")]
    Missing { page: String, mode: Mode },

    #[error("empty crop ({w}x{h})")]
    EmptyCrop { w: u32, h: u32 },

    #[error("invalid crop parameters (image is {width}x{height})")]
    OutOfBounds { width: u32, height: u32 },

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ----------------------------------------------------------------------------

/// 8-hex-char prefix of SHA-1 over the given bytes.
///
/// Only good for change detection; 32 bits is nowhere near
/// collision-resistant.
pub fn short_hash(bytes: &[u8]) -> String {
    use sha1::{Digest as _, Sha1};
    let digest = Sha1::digest(bytes);
    digest[..4].iter().map(|b| format!("{b:02x}")).collect()
}

// ----------------------------------------------------------------------------

type SnapshotKey = (String, Mode);

/// Bitmaps keyed by `(page_id, mode)`, one PNG file per key.
///
/// Readable from any serving path; written only by the render worker.
pub struct SnapshotStore {
    data_dir: PathBuf,
    hashes: RwLock<ahash::HashMap<SnapshotKey, String>>,
}

impl SnapshotStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            hashes: RwLock::new(ahash::HashMap::default()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn bitmap_path(&self, page_id: &str, mode: Mode) -> PathBuf {
        self.data_dir.join(format!("{page_id}_{mode}.png"))
    }

    /// Atomically replace the bitmap for `(page_id, mode)`.
    pub fn put(&self, page_id: &str, mode: Mode, img: &DynamicImage) -> Result<(), SnapshotError> {
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        let path = self.bitmap_path(page_id, mode);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.data_dir)?;
        tmp.write_all(&png)?;
        tmp.persist(&path).map_err(|err| err.error)?;

        let hash = short_hash(&png);
        ink_log::debug!("stored {} ({} bytes, hash {hash})", path.display(), png.len());
        self.hashes
            .write()
            .insert((page_id.to_owned(), mode), hash);

        Ok(())
    }

    /// Short content hash of the stored bitmap, or `None` if absent.
    pub fn hash(&self, page_id: &str, mode: Mode) -> Option<String> {
        let key = (page_id.to_owned(), mode);
        if let Some(hash) = self.hashes.read().get(&key) {
            return Some(hash.clone());
        }

        // Not cached: a bitmap surviving from an earlier run.
        let bytes = std::fs::read(self.bitmap_path(page_id, mode)).ok()?;
        let hash = short_hash(&bytes);
        self.hashes.write().insert(key, hash.clone());
        Some(hash)
    }

    pub fn exists(&self, page_id: &str, mode: Mode) -> bool {
        self.bitmap_path(page_id, mode).exists()
    }

    /// Does the page have a bitmap in at least one of the given modes?
    pub fn has_any(&self, page_id: &str, modes: &[Mode]) -> bool {
        modes.iter().any(|&mode| self.exists(page_id, mode))
    }

    /// The stored full-size PNG, as written.
    pub fn full_png(&self, page_id: &str, mode: Mode) -> Result<Vec<u8>, SnapshotError> {
        std::fs::read(self.bitmap_path(page_id, mode)).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                SnapshotError::Missing {
                    page: page_id.to_owned(),
                    mode,
                }
            } else {
                err.into()
            }
        })
    }

    /// Crop a tile and encode it for the HTTP surface (PNM with header).
    pub fn crop(
        &self,
        page_id: &str,
        mode: Mode,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        format: TileFormat,
    ) -> Result<Vec<u8>, SnapshotError> {
        let tile = self.crop_tile(page_id, mode, x, y, w, h)?;
        let bytes = match format {
            TileFormat::Png => {
                let mut png = Vec::new();
                tile.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
                png
            }
            TileFormat::Pbm => ink_codec::encode_pbm(&tile.to_luma8()),
            TileFormat::Ppm => ink_codec::encode_ppm(&tile.to_rgb8()),
        };
        Ok(bytes)
    }

    /// Crop a tile and emit the header-less pixel payload for the TCP
    /// surface.
    pub fn crop_raw(
        &self,
        page_id: &str,
        mode: Mode,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        format: RawFormat,
    ) -> Result<Vec<u8>, SnapshotError> {
        let tile = self.crop_tile(page_id, mode, x, y, w, h)?;
        let bytes = match format {
            RawFormat::Pbm => ink_codec::encode_pbm_raw(&tile.to_luma8()),
            RawFormat::Pgm => ink_codec::encode_pgm_raw(&tile.to_luma8()),
            RawFormat::Ppm => ink_codec::encode_ppm_raw(&tile.to_rgb8()),
        };
        Ok(bytes)
    }

    /// Load the bitmap and cut the requested rectangle out of it.
    ///
    /// The whole read works on one file snapshot: the atomic rename on `put`
    /// means we either see the old bitmap or the new one, never a mix.
    fn crop_tile(
        &self,
        page_id: &str,
        mode: Mode,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
    ) -> Result<DynamicImage, SnapshotError> {
        if w == 0 || h == 0 {
            return Err(SnapshotError::EmptyCrop { w, h });
        }

        let path = self.bitmap_path(page_id, mode);
        let img = match image::open(&path) {
            Ok(img) => img,
            Err(image::ImageError::IoError(err))
                if err.kind() == std::io::ErrorKind::NotFound =>
            {
                return Err(SnapshotError::Missing {
                    page: page_id.to_owned(),
                    mode,
                });
            }
            Err(err) => return Err(err.into()),
        };

        let (width, height) = (img.width(), img.height());
        if x as u64 + w as u64 > width as u64 || y as u64 + h as u64 > height as u64 {
            return Err(SnapshotError::OutOfBounds { width, height });
        }

        Ok(img.crop_imm(x, y, w, h))
    }

    /// Dimensions of the stored bitmap, for error reporting.
    pub fn dimensions(&self, page_id: &str, mode: Mode) -> Option<(u32, u32)> {
        image::image_dimensions(self.bitmap_path(page_id, mode)).ok()
    }
}

// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn mode(s: &str) -> Mode {
        s.parse().unwrap()
    }

    fn store() -> (tempfile::TempDir, SnapshotStore) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        (dir, store)
    }

    fn checkerboard(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 {
                Luma([0])
            } else {
                Luma([255])
            }
        }))
    }

    #[test]
    fn hash_is_stable_until_replaced() {
        let (_dir, store) = store();
        let m = mode("800x480x1xB");

        assert_eq!(store.hash("p", m), None);

        store.put("p", m, &checkerboard(800, 480)).unwrap();
        let h1 = store.hash("p", m).unwrap();
        assert_eq!(h1.len(), 8);
        assert_eq!(store.hash("p", m).unwrap(), h1);

        // Replacing with different content changes the hash…
        store
            .put("p", m, &DynamicImage::ImageLuma8(GrayImage::from_pixel(800, 480, Luma([255]))))
            .unwrap();
        let h2 = store.hash("p", m).unwrap();
        assert_ne!(h1, h2);

        // …and replacing with identical content restores it.
        store.put("p", m, &checkerboard(800, 480)).unwrap();
        assert_eq!(store.hash("p", m).unwrap(), h1);
    }

    #[test]
    fn hash_survives_cache_loss() {
        let (dir, store) = store();
        let m = mode("800x480x1xB");
        store.put("p", m, &checkerboard(800, 480)).unwrap();
        let h = store.hash("p", m).unwrap();

        // A fresh store over the same directory recomputes from file bytes.
        let fresh = SnapshotStore::new(dir.path());
        assert_eq!(fresh.hash("p", m).unwrap(), h);
    }

    #[test]
    fn crop_pbm_payload_is_packed() {
        let (_dir, store) = store();
        let m = mode("800x480x1xB");
        store.put("p", m, &checkerboard(800, 480)).unwrap();

        // 800 pixels wide, 8 rows: 100 bytes per row.
        let bytes = store.crop_raw("p", m, 0, 0, 800, 8, RawFormat::Pbm).unwrap();
        assert_eq!(bytes.len(), 800);

        // Odd x offset: packing restarts at the crop's own first pixel.
        let shifted = store.crop_raw("p", m, 1, 0, 16, 1, RawFormat::Pbm).unwrap();
        let aligned = store.crop_raw("p", m, 0, 0, 16, 1, RawFormat::Pbm).unwrap();
        assert_eq!(shifted.len(), 2);
        // The checkerboard inverts when shifted one pixel.
        assert_eq!(shifted[0], !aligned[0]);
    }

    #[test]
    fn http_pbm_body_equals_raw_payload() {
        let (_dir, store) = store();
        let m = mode("800x480x1xB");
        store.put("p", m, &checkerboard(800, 480)).unwrap();

        let raw = store.crop_raw("p", m, 0, 0, 200, 200, RawFormat::Pbm).unwrap();
        assert_eq!(raw.len(), 5000);

        let with_header = store.crop("p", m, 0, 0, 200, 200, TileFormat::Pbm).unwrap();
        assert!(with_header.ends_with(&raw));
        assert_eq!(&with_header[..with_header.len() - raw.len()], b"P4\n200 200\n");
    }

    #[test]
    fn crop_bounds() {
        let (_dir, store) = store();
        let m = mode("800x480x1xB");
        store.put("p", m, &checkerboard(800, 480)).unwrap();

        // Flush to the edge succeeds.
        assert!(store.crop_raw("p", m, 600, 280, 200, 200, RawFormat::Pbm).is_ok());

        // One past the edge fails.
        assert!(matches!(
            store.crop_raw("p", m, 601, 280, 200, 200, RawFormat::Pbm),
            Err(SnapshotError::OutOfBounds { .. })
        ));

        // Zero-size crops are their own error.
        assert!(matches!(
            store.crop_raw("p", m, 0, 0, 0, 10, RawFormat::Pbm),
            Err(SnapshotError::EmptyCrop { .. })
        ));
    }

    #[test]
    fn missing_bitmap() {
        let (_dir, store) = store();
        let m = mode("800x480x1xB");
        assert!(matches!(
            store.crop_raw("ghost", m, 0, 0, 8, 8, RawFormat::Pbm),
            Err(SnapshotError::Missing { .. })
        ));
        assert!(matches!(
            store.full_png("ghost", m),
            Err(SnapshotError::Missing { .. })
        ));
    }

    #[test]
    fn rgb_crop_payloads() {
        let (_dir, store) = store();
        let m = mode("800x480x8xRGB");
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(800, 480, Rgb([10, 20, 30])));
        store.put("p", m, &img).unwrap();

        let ppm = store.crop_raw("p", m, 0, 0, 4, 2, RawFormat::Ppm).unwrap();
        assert_eq!(ppm.len(), 24);
        assert_eq!(&ppm[..3], &[10, 20, 30]);

        let pgm = store.crop_raw("p", m, 0, 0, 4, 2, RawFormat::Pgm).unwrap();
        assert_eq!(pgm.len(), 8);
    }
}
