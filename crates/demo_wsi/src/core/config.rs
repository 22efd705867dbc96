//! # Window and session configuration
//!
//! [`WindowConfig`] is what every backend's `init_window` consumes: title,
//! optional placement, client-area size and fullscreen mode. [`WsiConfig`]
//! bundles it with the log filter so a demo can read both from one file.
//!
//! ```toml
//! log_level = "info"
//!
//! [window]
//! title = "gears"
//! width = 300
//! height = 300
//! fullscreen = false
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};

/// Default client-area width in pixels
pub const DEFAULT_WIDTH: u32 = 640;
/// Default client-area height in pixels
pub const DEFAULT_HEIGHT: u32 = 480;

/// Geometry and title of the single window a backend creates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Title shown by the window manager
    pub title: String,
    /// Horizontal screen position; `None` lets the platform place the window
    pub x: Option<i32>,
    /// Vertical screen position; `None` lets the platform place the window
    pub y: Option<i32>,
    /// Client-area width in pixels
    pub width: u32,
    /// Client-area height in pixels
    pub height: u32,
    /// Cover the primary screen instead of opening a decorated window
    pub fullscreen: bool,
}

impl WindowConfig {
    /// Create a windowed configuration with platform-default placement
    pub fn new(title: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            title: title.into(),
            x: None,
            y: None,
            width,
            height,
            fullscreen: false,
        }
    }

    /// Request an explicit screen position
    pub fn with_position(mut self, x: i32, y: i32) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    /// Requested position, if both coordinates were given
    pub fn position(&self) -> Option<(i32, i32)> {
        self.x.zip(self.y)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.title.is_empty() {
            return Err(ConfigError::Invalid("window title cannot be empty".to_string()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.x.is_some() != self.y.is_some() {
            return Err(ConfigError::Invalid(
                "window position needs both x and y, or neither".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self::new("WSI Demo", DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

/// Top-level configuration file for a demo driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WsiConfig {
    /// `env_logger` filter used when `RUST_LOG` is not set
    pub log_level: String,
    /// Window to open
    pub window: WindowConfig,
}

impl WsiConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_level.parse::<log::LevelFilter>().is_err() {
            return Err(ConfigError::Invalid(format!("unknown log level '{}'", self.log_level)));
        }
        self.window.validate()
    }
}

impl Default for WsiConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            window: WindowConfig::default(),
        }
    }
}

impl Config for WsiConfig {}
