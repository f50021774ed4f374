//! Core vocabulary of the webink server: display modes, daily times, and
//! the typed configuration every other crate consumes.

mod config;
mod mode;
mod time_of_day;

pub use config::{
    ConfigError, DeviceConfig, PageConfig, Rotation, ServerConfig, DEFAULT_HTTP_PORT,
    DEFAULT_REFRESH_INTERVAL, DEFAULT_TCP_PORT,
};
pub use mode::{ColorMode, Mode, ModeParseError};
pub use time_of_day::{SuppressWindow, TimeOfDay, TimeOfDayParseError};
