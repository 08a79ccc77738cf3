//! Configuration sections: storage paths, capture tuning, logging.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where session directories land on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Public pictures root that session trees are created under.
    /// Default: the platform picture directory, else ~/Pictures
    #[serde(default = "PathsConfig::default_pictures_dir")]
    pub pictures_dir: PathBuf,

    /// Directory name under `pictures_dir` that holds every session.
    /// Default: GYL-Data
    #[serde(default = "PathsConfig::default_storage_dir")]
    pub storage_dir: String,
}

impl PathsConfig {
    fn default_pictures_dir() -> PathBuf {
        if let Some(dir) = directories::UserDirs::new()
            .and_then(|dirs| dirs.picture_dir().map(|p| p.to_path_buf()))
        {
            return dir;
        }
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join("Pictures"))
            .unwrap_or_else(|| PathBuf::from("Pictures"))
    }

    fn default_storage_dir() -> String {
        "GYL-Data".to_string()
    }

    /// `<pictures_dir>/<storage_dir>`, the parent of all session directories.
    pub fn dataset_root(&self) -> PathBuf {
        self.pictures_dir.join(&self.storage_dir)
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            pictures_dir: Self::default_pictures_dir(),
            storage_dir: Self::default_storage_dir(),
        }
    }
}

/// Capture pipeline tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// JPEG quality used for every frame (1-100).
    #[serde(default = "CaptureConfig::default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Preview width of the synthetic camera used by `gyl-record`.
    #[serde(default = "CaptureConfig::default_frame_width")]
    pub frame_width: u32,

    /// Preview height of the synthetic camera.
    #[serde(default = "CaptureConfig::default_frame_height")]
    pub frame_height: u32,

    /// Period of the elapsed-seconds feedback tick.
    #[serde(default = "CaptureConfig::default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Capacity of the ordered background frame write queue.
    #[serde(default = "CaptureConfig::default_frame_queue_depth")]
    pub frame_queue_depth: usize,
}

impl CaptureConfig {
    fn default_jpeg_quality() -> u8 {
        90
    }

    fn default_frame_width() -> u32 {
        640
    }

    fn default_frame_height() -> u32 {
        480
    }

    fn default_tick_interval_ms() -> u64 {
        1000
    }

    fn default_frame_queue_depth() -> usize {
        64
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: Self::default_jpeg_quality(),
            frame_width: Self::default_frame_width(),
            frame_height: Self::default_frame_height(),
            tick_interval_ms: Self::default_tick_interval_ms(),
            frame_queue_depth: Self::default_frame_queue_depth(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// EnvFilter directive, e.g. "info" or "gylcapture=debug".
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
