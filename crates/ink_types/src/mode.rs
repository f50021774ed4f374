/// Color model of a display mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorMode {
    /// Pure black & white.
    BlackWhite,

    /// Grayscale.
    Gray,

    /// Full color.
    Rgb,
}

impl ColorMode {
    #[inline]
    pub fn short(&self) -> &'static str {
        match self {
            Self::BlackWhite => "B",
            Self::Gray => "G",
            Self::Rgb => "RGB",
        }
    }
}

impl std::fmt::Display for ColorMode {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.short().fmt(f)
    }
}

impl std::str::FromStr for ColorMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "B" => Ok(Self::BlackWhite),
            "G" => Ok(Self::Gray),
            "RGB" => Ok(Self::Rgb),
            _ => Err(ModeParseError::UnknownColorMode(s.to_owned())),
        }
    }
}

// ----------------------------------------------------------------------------

#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum ModeParseError {
    #[error("expected WxHxBxC (e.g. \"800x480x1xB\"), got {0:?}")]
    Malformed(String),

    #[error("invalid dimension {0:?}")]
    InvalidDimension(String),

    #[error("invalid bit depth {0:?}")]
    InvalidBits(String),

    #[error("unknown color mode {0:?} (expected one of B, G, RGB)")]
    UnknownColorMode(String),

    #[error("unsupported combination: {bits} bits with color mode {color}")]
    UnsupportedCombination { bits: u8, color: ColorMode },
}

// ----------------------------------------------------------------------------

/// A target display format: pixel dimensions, bit depth, and color model.
///
/// Parsed from strings like `800x480x1xB`. Every bitmap the server stores is
/// tagged with the mode that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Mode {
    pub width: u32,
    pub height: u32,
    pub bits: u8,
    pub color: ColorMode,
}

impl Mode {
    /// Only a fixed set of `(bits, color)` combinations is legal:
    /// `1xB`, `2xG`, `8xG`, `2xRGB`, `8xRGB`.
    pub fn new(width: u32, height: u32, bits: u8, color: ColorMode) -> Result<Self, ModeParseError> {
        if width == 0 {
            return Err(ModeParseError::InvalidDimension(width.to_string()));
        }
        if height == 0 {
            return Err(ModeParseError::InvalidDimension(height.to_string()));
        }

        let legal = matches!(
            (bits, color),
            (1, ColorMode::BlackWhite)
                | (2, ColorMode::Gray)
                | (8, ColorMode::Gray)
                | (2, ColorMode::Rgb)
                | (8, ColorMode::Rgb)
        );
        if !legal {
            return Err(ModeParseError::UnsupportedCombination { bits, color });
        }

        Ok(Self {
            width,
            height,
            bits,
            color,
        })
    }
}

impl std::fmt::Display for Mode {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{}x{}x{}",
            self.width,
            self.height,
            self.bits,
            self.color.short()
        )
    }
}

impl std::str::FromStr for Mode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.split('x');
        let (Some(w), Some(h), Some(b), Some(c), None) = (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        ) else {
            return Err(ModeParseError::Malformed(s.to_owned()));
        };

        let width: u32 = w
            .parse()
            .map_err(|_| ModeParseError::InvalidDimension(w.to_owned()))?;
        let height: u32 = h
            .parse()
            .map_err(|_| ModeParseError::InvalidDimension(h.to_owned()))?;
        let bits: u8 = b
            .parse()
            .map_err(|_| ModeParseError::InvalidBits(b.to_owned()))?;
        let color: ColorMode = c.parse()?;

        Self::new(width, height, bits, color)
    }
}

impl serde::Serialize for Mode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Mode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ----------------------------------------------------------------------------
