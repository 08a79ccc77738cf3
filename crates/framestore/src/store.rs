//! FileStore: writes session trees to a local (or mounted) filesystem.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;
use crate::layout::{frame_path, SessionLayout, ANNOTATION_FILENAME, SENSOR_FILENAME};
use crate::nv21::encode_nv21_jpeg;

/// Storage settings derived from the recorder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `<public-pictures>/<STORAGE_DIR>`; each session is a child directory.
    pub dataset_root: PathBuf,

    /// JPEG quality for every frame (1-100).
    pub jpeg_quality: u8,
}

impl StoreConfig {
    pub fn new(dataset_root: impl Into<PathBuf>) -> Self {
        Self {
            dataset_root: dataset_root.into(),
            jpeg_quality: 90,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }
}

impl From<&gylconf::GylConfig> for StoreConfig {
    fn from(config: &gylconf::GylConfig) -> Self {
        Self::new(config.paths.dataset_root()).with_jpeg_quality(config.capture.jpeg_quality)
    }
}

/// Persistence backend for recording sessions.
///
/// Every method reports a typed [`StoreError`]; nothing panics past the caller.
pub trait DatasetStore: Send + Sync {
    /// Create `<root>/<session_id>/JPEGImages` and its parents.
    ///
    /// Idempotent: an existing directory tree is left untouched.
    fn create_session_directories(&self, session_id: &str) -> Result<SessionLayout, StoreError>;

    /// Encode a raw NV21 frame and write it to `<frames_dir>/<frame_index>.jpg`.
    fn write_frame(
        &self,
        frames_dir: &Path,
        frame_index: u32,
        raw_frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<PathBuf, StoreError>;

    /// Write `sensor.txt`: one header line plus one line per record, indices from 1.
    fn write_sensor_log(
        &self,
        root_dir: &Path,
        header: &str,
        records: &[(f32, &str)],
    ) -> Result<PathBuf, StoreError>;

    /// Write `annotation.txt` as a single `"<timestamp> : <text>"` line.
    fn write_annotation(
        &self,
        root_dir: &Path,
        timestamp: &str,
        text: &str,
    ) -> Result<PathBuf, StoreError>;
}

/// Filesystem-backed dataset store.
#[derive(Debug, Clone)]
pub struct FileStore {
    config: StoreConfig,
}

impl FileStore {
    /// No directories are created until a session asks for one.
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn at_path(dataset_root: impl Into<PathBuf>) -> Self {
        Self::new(StoreConfig::new(dataset_root))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn layout_for(&self, session_id: &str) -> SessionLayout {
        SessionLayout::new(&self.config.dataset_root, session_id)
    }
}

fn ensure_dir(path: &Path) -> Result<(), StoreError> {
    if path.exists() && !path.is_dir() {
        return Err(StoreError::DirectoryCreateFailed {
            path: path.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                "path exists and is not a directory",
            ),
        });
    }
    fs::create_dir_all(path).map_err(|source| StoreError::DirectoryCreateFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Render a focal length the way the device log always has: at least one
/// fractional digit, so `4` is written `4.0`.
pub fn format_focal_length(value: f32) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// One `sensor.txt` data line for the 1-based `index`.
pub fn sensor_log_line(index: usize, focal_length: f32, sensor_line: &str) -> String {
    format!(
        "{} : {};{}",
        index,
        format_focal_length(focal_length),
        sensor_line
    )
}

/// The `sensor.txt` header line for a sensor field description.
pub fn sensor_log_header(description: &str) -> String {
    format!("frame,focal-length,{}", description)
}

impl DatasetStore for FileStore {
    fn create_session_directories(&self, session_id: &str) -> Result<SessionLayout, StoreError> {
        let layout = self.layout_for(session_id);
        ensure_dir(layout.root_dir())?;
        ensure_dir(&layout.frames_dir())?;
        debug!("session directories ready at {}", layout.root_dir().display());
        Ok(layout)
    }

    fn write_frame(
        &self,
        frames_dir: &Path,
        frame_index: u32,
        raw_frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<PathBuf, StoreError> {
        let jpeg = encode_nv21_jpeg(
            frame_index,
            raw_frame,
            width,
            height,
            self.config.jpeg_quality,
        )?;

        let path = frame_path(frames_dir, frame_index);
        fs::write(&path, &jpeg).map_err(|source| StoreError::FrameWriteFailed {
            index: frame_index,
            path: path.clone(),
            source,
        })?;

        debug!("frame {} saved ({} bytes)", frame_index, jpeg.len());
        Ok(path)
    }

    fn write_sensor_log(
        &self,
        root_dir: &Path,
        header: &str,
        records: &[(f32, &str)],
    ) -> Result<PathBuf, StoreError> {
        let path = root_dir.join(SENSOR_FILENAME);
        let to_error = |source| StoreError::SensorLogWriteFailed {
            path: path.clone(),
            source,
        };

        let file = File::create(&path).map_err(to_error)?;
        let mut out = BufWriter::new(file);
        writeln!(out, "{}", sensor_log_header(header)).map_err(to_error)?;
        for (i, (focal_length, sensor_line)) in records.iter().enumerate() {
            writeln!(out, "{}", sensor_log_line(i + 1, *focal_length, sensor_line))
                .map_err(to_error)?;
        }
        out.flush().map_err(to_error)?;

        debug!("sensor log written: {} records", records.len());
        Ok(path)
    }

    fn write_annotation(
        &self,
        root_dir: &Path,
        timestamp: &str,
        text: &str,
    ) -> Result<PathBuf, StoreError> {
        let path = root_dir.join(ANNOTATION_FILENAME);
        fs::write(&path, format!("{} : {}\n", timestamp, text)).map_err(|source| {
            StoreError::AnnotationWriteFailed {
                path: path.clone(),
                source,
            }
        })?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nv21::nv21_len;
    use tempfile::TempDir;

    #[test]
    fn test_create_session_directories() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::at_path(temp_dir.path().join("GYL-Data"));

        let layout = store.create_session_directories("s1").unwrap();
        assert!(layout.frames_dir().is_dir());
        assert_eq!(layout.root_dir(), temp_dir.path().join("GYL-Data/s1"));
    }

    #[test]
    fn test_create_fails_when_root_is_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("GYL-Data");
        fs::write(&blocker, b"not a directory").unwrap();

        let store = FileStore::at_path(&blocker);
        let err = store.create_session_directories("s1").unwrap_err();
        assert!(matches!(err, StoreError::DirectoryCreateFailed { .. }));
    }

    #[test]
    fn test_create_fails_when_session_path_is_a_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("s1"), b"").unwrap();

        let store = FileStore::at_path(temp_dir.path());
        let err = store.create_session_directories("s1").unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_write_frame_names_file_by_index() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::at_path(temp_dir.path());
        let layout = store.create_session_directories("s1").unwrap();

        let frame = vec![128u8; nv21_len(8, 8)];
        let path = store
            .write_frame(&layout.frames_dir(), 5, &frame, 8, 8)
            .unwrap();
        assert_eq!(path, layout.frames_dir().join("5.jpg"));
        assert!(path.exists());
    }

    #[test]
    fn test_write_frame_into_missing_dir_is_write_failure() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::at_path(temp_dir.path());

        let frame = vec![128u8; nv21_len(4, 4)];
        let err = store
            .write_frame(&temp_dir.path().join("gone"), 1, &frame, 4, 4)
            .unwrap_err();
        assert!(matches!(err, StoreError::FrameWriteFailed { index: 1, .. }));
    }

    #[test]
    fn test_format_focal_length() {
        assert_eq!(format_focal_length(4.0), "4.0");
        assert_eq!(format_focal_length(0.0), "0.0");
        assert_eq!(format_focal_length(4.25), "4.25");
        assert_eq!(format_focal_length(1.5), "1.5");
    }

    #[test]
    fn test_sensor_log_line_format() {
        assert_eq!(sensor_log_line(1, 4.0, "0.1,0.2,0.3"), "1 : 4.0;0.1,0.2,0.3");
        assert_eq!(sensor_log_header("azimuth,pitch,roll"), "frame,focal-length,azimuth,pitch,roll");
    }

    #[test]
    fn test_write_annotation_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::at_path(temp_dir.path());
        let layout = store.create_session_directories("s1").unwrap();

        store
            .write_annotation(layout.root_dir(), "20240101_000000_000", "first")
            .unwrap();
        let path = store
            .write_annotation(layout.root_dir(), "20240101_000001_000", "second")
            .unwrap();

        let contents = fs::read_to_string(path).unwrap();
        assert_eq!(contents, "20240101_000001_000 : second\n");
    }
}
