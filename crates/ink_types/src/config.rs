use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::{Mode, SuppressWindow, TimeOfDay};

/// Default page refresh cadence, in seconds.
pub const DEFAULT_REFRESH_INTERVAL: u64 = 600;

pub const DEFAULT_HTTP_PORT: u16 = 8000;
pub const DEFAULT_TCP_PORT: u16 = 8091;

// ----------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error("page {page:?}: {reason}")]
    Page { page: String, reason: String },

    #[error("device {device:?} refers to unknown page {page:?}")]
    UnknownPage { device: String, page: String },

    #[error("no supported modes configured")]
    NoModes,

    #[error("capture_command must not be empty")]
    EmptyCaptureCommand,

    #[error("invalid rotation {0} (expected one of -90, 0, 90, 180)")]
    InvalidRotation(i64),
}

// ----------------------------------------------------------------------------

/// Rotation applied to a captured frame before it is resampled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    None,

    /// Clockwise quarter turn (`90` in config).
    Cw90,

    /// Counter-clockwise quarter turn (`-90` in config).
    Ccw90,

    /// Half turn (`180` in config).
    Half,
}

impl Rotation {
    pub fn from_degrees(degrees: i64) -> Result<Self, ConfigError> {
        match degrees {
            0 => Ok(Self::None),
            90 => Ok(Self::Cw90),
            -90 => Ok(Self::Ccw90),
            180 => Ok(Self::Half),
            other => Err(ConfigError::InvalidRotation(other)),
        }
    }

    #[inline]
    pub fn degrees(&self) -> i64 {
        match self {
            Self::None => 0,
            Self::Cw90 => 90,
            Self::Ccw90 => -90,
            Self::Half => 180,
        }
    }

    /// Quarter turns swap the capture viewport's axes.
    #[inline]
    pub fn swaps_axes(&self) -> bool {
        matches!(self, Self::Cw90 | Self::Ccw90)
    }
}

impl serde::Serialize for Rotation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.degrees())
    }
}

impl<'de> serde::Deserialize<'de> for Rotation {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let degrees = i64::deserialize(deserializer)?;
        Self::from_degrees(degrees).map_err(serde::de::Error::custom)
    }
}

// ----------------------------------------------------------------------------

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct PageConfig {
    pub url: String,

    /// Seconds between renders.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,

    /// Capture at `mode dimensions × zoom`, then downscale. Must be ≥ 1.0.
    #[serde(default = "default_zoom_level")]
    pub zoom_level: f32,

    #[serde(default)]
    pub rotation: Rotation,

    /// CSS selector to scroll into view before the screenshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_to_element: Option<String>,

    /// Daily window during which renders are skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppress_refresh: Option<SuppressWindow>,

    /// Daily times at which the device must wake and repaint.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mandatory_refresh: Vec<TimeOfDay>,
}

fn default_refresh_interval() -> u64 {
    DEFAULT_REFRESH_INTERVAL
}

fn default_zoom_level() -> f32 {
    1.0
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct DeviceConfig {
    /// The page this device displays.
    pub page: String,
}

// ----------------------------------------------------------------------------

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub pages: BTreeMap<String, PageConfig>,

    #[serde(default)]
    pub devices: BTreeMap<String, DeviceConfig>,

    #[serde(default)]
    pub supported_modes: Vec<Mode>,

    pub api_key: String,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Capture driver command template. Tokens may contain the placeholders
    /// `{url}`, `{width}`, `{height}`, `{out}`, `{selector}`. When unset,
    /// a headless-chromium invocation is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_command: Option<Vec<String>>,
}

fn default_http_port() -> u16 {
    DEFAULT_HTTP_PORT
}

fn default_tcp_port() -> u16 {
    DEFAULT_TCP_PORT
}

fn default_data_dir() -> PathBuf {
    "data".into()
}

impl ServerConfig {
    /// Load and validate a YAML config file. Unknown fields are ignored.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.supported_modes.is_empty() {
            return Err(ConfigError::NoModes);
        }

        if self.capture_command.as_ref().is_some_and(Vec::is_empty) {
            return Err(ConfigError::EmptyCaptureCommand);
        }

        for (page_id, page) in &self.pages {
            let fail = |reason: String| ConfigError::Page {
                page: page_id.clone(),
                reason,
            };

            if page.url.is_empty() {
                return Err(fail("missing url".to_owned()));
            }
            if page.refresh_interval == 0 {
                return Err(fail("refresh_interval must be positive".to_owned()));
            }
            if page.zoom_level.is_nan() || page.zoom_level < 1.0 {
                return Err(fail(format!(
                    "zoom_level must be >= 1.0, got {}",
                    page.zoom_level
                )));
            }
            if let Some(window) = &page.suppress_refresh {
                if window.start > window.end {
                    return Err(fail(format!(
                        "suppress_refresh window {}-{} straddles midnight, which is not supported",
                        window.start, window.end
                    )));
                }
            }
        }

        for (device, cfg) in &self.devices {
            if !self.pages.contains_key(&cfg.page) {
                return Err(ConfigError::UnknownPage {
                    device: device.clone(),
                    page: cfg.page.clone(),
                });
            }
        }

        Ok(())
    }

    /// The page a device displays: its own entry, falling back to the
    /// `default` device.
    pub fn page_for_device(&self, device: &str) -> Option<(&str, &PageConfig)> {
        let device_cfg = self
            .devices
            .get(device)
            .or_else(|| self.devices.get("default"))?;
        let page = self.pages.get(&device_cfg.page)?;
        Some((device_cfg.page.as_str(), page))
    }

    pub fn is_supported_mode(&self, mode: Mode) -> bool {
        self.supported_modes.contains(&mode)
    }
}

// ----------------------------------------------------------------------------
