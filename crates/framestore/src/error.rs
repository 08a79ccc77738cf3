//! Typed storage failures.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while persisting a session.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create session directory {path}: {source}")]
    DirectoryCreateFailed { path: PathBuf, source: io::Error },

    #[error("failed to encode frame {index}: {reason}")]
    FrameEncodeFailed { index: u32, reason: String },

    #[error("failed to write frame {index} to {path}: {source}")]
    FrameWriteFailed {
        index: u32,
        path: PathBuf,
        source: io::Error,
    },

    #[error("frame {index} dropped: write queue is full")]
    QueueFull { index: u32 },

    #[error("failed to write sensor log {path}: {source}")]
    SensorLogWriteFailed { path: PathBuf, source: io::Error },

    #[error("failed to write annotation {path}: {source}")]
    AnnotationWriteFailed { path: PathBuf, source: io::Error },

    #[error("frame writer is closed")]
    WriterClosed,
}

/// Cloneable discriminant of [`StoreError`] for fan-out to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreErrorKind {
    DirectoryCreateFailed,
    FrameEncodeFailed,
    FrameWriteFailed,
    QueueFull,
    SensorLogWriteFailed,
    AnnotationWriteFailed,
    WriterClosed,
}

impl StoreError {
    pub fn kind(&self) -> StoreErrorKind {
        match self {
            StoreError::DirectoryCreateFailed { .. } => StoreErrorKind::DirectoryCreateFailed,
            StoreError::FrameEncodeFailed { .. } => StoreErrorKind::FrameEncodeFailed,
            StoreError::FrameWriteFailed { .. } => StoreErrorKind::FrameWriteFailed,
            StoreError::QueueFull { .. } => StoreErrorKind::QueueFull,
            StoreError::SensorLogWriteFailed { .. } => StoreErrorKind::SensorLogWriteFailed,
            StoreError::AnnotationWriteFailed { .. } => StoreErrorKind::AnnotationWriteFailed,
            StoreError::WriterClosed => StoreErrorKind::WriterClosed,
        }
    }

    /// True for per-frame failures, which consume the index but do not stop the session.
    pub fn is_frame_error(&self) -> bool {
        matches!(
            self,
            StoreError::FrameEncodeFailed { .. }
                | StoreError::FrameWriteFailed { .. }
                | StoreError::QueueFull { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_frame_classification() {
        let encode = StoreError::FrameEncodeFailed {
            index: 3,
            reason: "empty frame payload".to_string(),
        };
        assert_eq!(encode.kind(), StoreErrorKind::FrameEncodeFailed);
        assert!(encode.is_frame_error());
        assert!(encode.to_string().contains("frame 3"));

        let dir = StoreError::DirectoryCreateFailed {
            path: PathBuf::from("/nope"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(dir.kind(), StoreErrorKind::DirectoryCreateFailed);
        assert!(!dir.is_frame_error());

        let full = StoreError::QueueFull { index: 7 };
        assert_eq!(full.kind(), StoreErrorKind::QueueFull);
        assert!(full.is_frame_error());
    }
}
