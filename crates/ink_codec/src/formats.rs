#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("invalid format {got:?}. expected one of: {expected}")]
pub struct FormatParseError {
    pub got: String,
    pub expected: &'static str,
}

// ----------------------------------------------------------------------------

/// Encodings served over HTTP; PNM variants include their header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileFormat {
    Png,
    Pbm,
    Ppm,
}

impl TileFormat {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Pbm => "pbm",
            Self::Ppm => "ppm",
        }
    }

    #[inline]
    pub fn media_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Pbm => "image/x-portable-bitmap",
            Self::Ppm => "image/x-portable-pixmap",
        }
    }
}

impl std::str::FromStr for TileFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "png" => Ok(Self::Png),
            "pbm" => Ok(Self::Pbm),
            "ppm" => Ok(Self::Ppm),
            _ => Err(FormatParseError {
                got: s.to_owned(),
                expected: "png, pbm, ppm",
            }),
        }
    }
}

// ----------------------------------------------------------------------------

/// Header-less pixel payloads served over the TCP tile protocol.
///
/// The payload is exactly what a client writes into its framebuffer after a
/// single fixed-size read, so there is no header and no framing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawFormat {
    /// Packed 1-bit, MSB first, row stride `ceil(w / 8)`.
    Pbm,

    /// 8-bit luminance, `w` bytes per row.
    Pgm,

    /// 24-bit RGB, `3 * w` bytes per row.
    Ppm,
}

impl RawFormat {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pbm => "pbm",
            Self::Pgm => "pgm",
            Self::Ppm => "ppm",
        }
    }

    /// Payload size for a `w × h` tile.
    #[inline]
    pub fn payload_len(&self, w: u32, h: u32) -> usize {
        match self {
            Self::Pbm => crate::pnm::pbm_row_stride(w) * h as usize,
            Self::Pgm => w as usize * h as usize,
            Self::Ppm => 3 * w as usize * h as usize,
        }
    }
}

impl std::str::FromStr for RawFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pbm" => Ok(Self::Pbm),
            "pgm" => Ok(Self::Pgm),
            "ppm" => Ok(Self::Ppm),
            _ => Err(FormatParseError {
                got: s.to_owned(),
                expected: "pbm, pgm, ppm",
            }),
        }
    }
}

// ----------------------------------------------------------------------------
