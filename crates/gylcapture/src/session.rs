//! Domain types for recording sessions.
//!
//! A session is one bounded run that produces one directory of frames and logs.
//! Records are aligned by position: entry `i` of every buffer describes frame `i`.

use chrono::{DateTime, Local};
use framestore::StoreErrorKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Timestamp layout shared by session ids and annotation lines.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// Filesystem-safe rendering of a wall-clock instant.
pub fn format_timestamp(at: DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Unique identifier for a recording session, also its directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out timestamp ids that never repeat within one process.
///
/// Two sessions started within the same millisecond (or after the clock
/// stepped backwards) get a `_<n>` suffix instead of sharing a directory.
#[derive(Debug, Default)]
pub struct SessionIdGenerator {
    last_base: Option<String>,
    collisions: u32,
}

impl SessionIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_at(&mut self, now: DateTime<Local>) -> SessionId {
        let base = format_timestamp(now);
        match &self.last_base {
            Some(last) if base.as_str() <= last.as_str() => {
                self.collisions += 1;
                SessionId(format!("{}_{}", last, self.collisions))
            }
            _ => {
                self.last_base = Some(base.clone());
                self.collisions = 0;
                SessionId(base)
            }
        }
    }

    pub fn next_id(&mut self) -> SessionId {
        self.next_at(Local::now())
    }
}

/// Lifecycle of the capture state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Recording,
    /// Collecting the annotation and flushing logs
    Finalizing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Recording => write!(f, "recording"),
            SessionState::Finalizing => write!(f, "finalizing"),
        }
    }
}

/// One aligned observation. `frame_index` is its 1-based buffer position.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRecord<'a> {
    pub frame_index: u32,
    pub focal_length: f32,
    pub sensor_line: &'a str,
}

/// Free-text note attached to a session at finalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub timestamp: String,
    pub text: String,
}

impl AnnotationRecord {
    pub fn now(text: impl Into<String>) -> Self {
        Self {
            timestamp: format_timestamp(Local::now()),
            text: text.into(),
        }
    }
}

/// A frame whose index was consumed but whose image file is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameFailure {
    pub index: u32,
    pub kind: StoreErrorKind,
    pub message: String,
}

/// What a finished session left on disk.
///
/// `frame_count` counts attempted frames; sensor lines exist for all of them
/// even when `failed_frames` lists indices with no image file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub root_dir: PathBuf,
    pub frame_count: u32,
    pub elapsed_seconds: u32,
    pub failed_frames: Vec<FrameFailure>,
    pub sensor_log_saved: bool,
    pub annotation_saved: bool,
}

impl SessionSummary {
    pub fn frames_written(&self) -> u32 {
        self.frame_count
            .saturating_sub(self.failed_frames.len() as u32)
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame count: {}\nData saved to {}",
            self.frame_count,
            self.root_dir.display()
        )
    }
}
