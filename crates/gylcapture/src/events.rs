//! Feedback published to the UI layer.

use std::path::PathBuf;

use framestore::StoreErrorKind;
use serde::Serialize;

use crate::session::{SessionId, SessionSummary};

/// Broadcast to every [`subscribe`](crate::CaptureHandle::subscribe)r.
///
/// Slow subscribers may lag and miss events; nothing in the capture path waits on them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CaptureEvent {
    Started {
        session_id: SessionId,
        root_dir: PathBuf,
    },
    /// Seconds since start, published once at start and once per tick.
    Elapsed { seconds: u32 },
    /// Frame `index` was counted and logged but has no image file.
    FrameWriteFailed {
        index: u32,
        kind: StoreErrorKind,
        message: String,
    },
    AnnotationRequested { session_id: SessionId },
    /// The sensor log or annotation could not be written.
    FinalizeWriteFailed {
        kind: StoreErrorKind,
        message: String,
    },
    Finalized(SessionSummary),
}
