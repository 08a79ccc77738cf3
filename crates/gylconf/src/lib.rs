//! Configuration loading for the GYL dataset recorder.
//!
//! Kept dependency-light so every crate in the workspace can import it.
//!
//! # Usage
//!
//! ```rust,no_run
//! use gylconf::GylConfig;
//!
//! let config = GylConfig::load().expect("Failed to load config");
//! println!("sessions go under {}", config.paths.dataset_root().display());
//! println!("jpeg quality {}", config.capture.jpeg_quality);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/gyl/config.toml` (system)
//! 2. `~/.config/gyl/config.toml` (user)
//! 3. `./gyl.toml` (local override, replaced by an explicit path if given)
//! 4. Environment variables (`GYL_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! pictures_dir = "~/Pictures"
//! storage_dir = "GYL-Data"
//!
//! [capture]
//! jpeg_quality = 90
//! frame_width = 640
//! frame_height = 480
//! tick_interval_ms = 1000
//! frame_queue_depth = 64
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, expand_path, ConfigSources};
pub use sections::{CaptureConfig, PathsConfig, TelemetryConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration value {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Complete recorder configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GylConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl GylConfig {
    /// Load configuration from all standard sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, letting `config_path` replace `./gyl.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and report where each value came from.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let files = loader::discover_config_files_with_override(config_path);
        let mut config = loader::load_layered(&files)?;
        let mut sources = ConfigSources {
            files,
            ..ConfigSources::default()
        };

        loader::apply_env_overrides(&mut config, &mut sources);
        config.validate()?;

        Ok((config, sources))
    }

    /// Reject values the capture pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.capture.jpeg_quality) {
            return Err(ConfigError::Invalid {
                key: "capture.jpeg_quality".to_string(),
                message: format!("{} is outside 1..=100", self.capture.jpeg_quality),
            });
        }
        if self.capture.frame_width == 0 || self.capture.frame_height == 0 {
            return Err(ConfigError::Invalid {
                key: "capture.frame_width/frame_height".to_string(),
                message: "frame dimensions must be non-zero".to_string(),
            });
        }
        if self.capture.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "capture.tick_interval_ms".to_string(),
                message: "tick interval must be non-zero".to_string(),
            });
        }
        if self.capture.frame_queue_depth == 0 {
            return Err(ConfigError::Invalid {
                key: "capture.frame_queue_depth".to_string(),
                message: "queue depth must be non-zero".to_string(),
            });
        }
        if self.paths.storage_dir.is_empty() {
            return Err(ConfigError::Invalid {
                key: "paths.storage_dir".to_string(),
                message: "storage directory name must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Serialize config to a TOML string.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# GYL Recorder Configuration\n\n");

        output.push_str("[paths]\n");
        output.push_str(&format!(
            "pictures_dir = \"{}\"\n",
            self.paths.pictures_dir.display()
        ));
        output.push_str(&format!("storage_dir = \"{}\"\n", self.paths.storage_dir));

        output.push_str("\n[capture]\n");
        output.push_str(&format!("jpeg_quality = {}\n", self.capture.jpeg_quality));
        output.push_str(&format!("frame_width = {}\n", self.capture.frame_width));
        output.push_str(&format!("frame_height = {}\n", self.capture.frame_height));
        output.push_str(&format!(
            "tick_interval_ms = {}\n",
            self.capture.tick_interval_ms
        ));
        output.push_str(&format!(
            "frame_queue_depth = {}\n",
            self.capture.frame_queue_depth
        ));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));

        output
    }
}
