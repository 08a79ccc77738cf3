//! Storage side of the GYL dataset recorder.
//!
//! Owns everything that touches disk during a recording session:
//! - **layout**: where a session's frames and logs live
//! - **store**: the [`DatasetStore`] trait and its filesystem implementation
//! - **nv21**: raw preview buffer to JPEG conversion
//! - **writer**: an ordered background queue so frame I/O never blocks capture
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use framestore::{DatasetStore, FileStore};
//!
//! let store = FileStore::at_path("/sdcard/Pictures/GYL-Data");
//! let layout = store.create_session_directories("20240101_120000_000").unwrap();
//!
//! let nv21 = vec![128u8; framestore::nv21_len(640, 480)];
//! store.write_frame(&layout.frames_dir(), 1, &nv21, 640, 480).unwrap();
//!
//! store
//!     .write_sensor_log(layout.root_dir(), "azimuth,pitch,roll", &[(4.0, "0.1,0.2,0.3")])
//!     .unwrap();
//! ```
//!
//! # Failure model
//!
//! Writes are whole-file and never resumed. A failure part way through leaves
//! the file in whatever state the OS left it; sessions are re-recorded, not
//! repaired.

pub mod error;
pub mod layout;
pub mod nv21;
pub mod store;
pub mod writer;

pub use error::{StoreError, StoreErrorKind};
pub use layout::{frame_path, SessionLayout, ANNOTATION_FILENAME, FRAMES_DIR, SENSOR_FILENAME};
pub use nv21::{encode_nv21_jpeg, nv21_len, nv21_to_rgb};
pub use store::{
    format_focal_length, sensor_log_header, sensor_log_line, DatasetStore, FileStore, StoreConfig,
};
pub use writer::{FrameJob, FrameWriteReport, FrameWriter};
