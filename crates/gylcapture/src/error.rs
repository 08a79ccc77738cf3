//! Typed errors for the capture pipeline.

use framestore::StoreError;
use thiserror::Error;

use crate::session::SessionState;

/// Failure of a capture collaborator (camera or sensor driver).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("device busy: {0}")]
    Busy(String),

    #[error("device unavailable: {0}")]
    Unavailable(String),

    #[error("unsupported setting: {0}")]
    Unsupported(String),
}

/// Errors returned to the orchestrator by the capture controller.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("a session is already recording")]
    AlreadyRecording,

    #[error("previous session is still finalizing")]
    Busy,

    #[error("no session is recording (state: {0})")]
    NotRecording(SessionState),

    #[error("cannot start session: {0}")]
    DirectoryCreateFailed(#[source] StoreError),

    #[error("capture hardware unavailable: {0}")]
    DeviceUnavailable(#[from] DeviceError),

    #[error("frame writer failed to start: {0}")]
    WriterUnavailable(#[source] StoreError),

    #[error("capture controller has shut down")]
    ControllerClosed,
}

pub type Result<T> = std::result::Result<T, CaptureError>;
