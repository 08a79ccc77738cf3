//! On-disk layout of one recording session.
//!
//! ```text
//! {dataset_root}/{session_id}/
//! ├── JPEGImages/
//! │   ├── 1.jpg
//! │   ├── 2.jpg
//! │   └── ...
//! ├── sensor.txt       # header + "<idx> : <focal>;<sensor line>"
//! └── annotation.txt   # "<timestamp> : <text>"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const FRAMES_DIR: &str = "JPEGImages";
pub const SENSOR_FILENAME: &str = "sensor.txt";
pub const ANNOTATION_FILENAME: &str = "annotation.txt";

/// Resolved paths for a single session directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLayout {
    root_dir: PathBuf,
}

impl SessionLayout {
    pub fn new(dataset_root: &Path, session_id: &str) -> Self {
        Self {
            root_dir: dataset_root.join(session_id),
        }
    }

    /// `<dataset_root>/<session_id>/`
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.root_dir.join(FRAMES_DIR)
    }

    pub fn sensor_log_path(&self) -> PathBuf {
        self.root_dir.join(SENSOR_FILENAME)
    }

    pub fn annotation_path(&self) -> PathBuf {
        self.root_dir.join(ANNOTATION_FILENAME)
    }
}

/// `<frames_dir>/<index>.jpg`
pub fn frame_path(frames_dir: &Path, frame_index: u32) -> PathBuf {
    frames_dir.join(format!("{}.jpg", frame_index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = SessionLayout::new(Path::new("/pics/GYL-Data"), "20240102_030405_006");
        assert_eq!(layout.root_dir(), Path::new("/pics/GYL-Data/20240102_030405_006"));
        assert_eq!(
            layout.frames_dir(),
            PathBuf::from("/pics/GYL-Data/20240102_030405_006/JPEGImages")
        );
        assert_eq!(
            layout.sensor_log_path(),
            PathBuf::from("/pics/GYL-Data/20240102_030405_006/sensor.txt")
        );
        assert_eq!(
            layout.annotation_path(),
            PathBuf::from("/pics/GYL-Data/20240102_030405_006/annotation.txt")
        );
    }

    #[test]
    fn test_frame_path_is_one_based_index() {
        assert_eq!(frame_path(Path::new("/f"), 1), PathBuf::from("/f/1.jpg"));
        assert_eq!(frame_path(Path::new("/f"), 120), PathBuf::from("/f/120.jpg"));
    }
}
