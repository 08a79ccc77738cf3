//! Collaborator interfaces: the camera and the orientation sensor.
//!
//! Drivers live outside this crate. They only need to hand frames to a
//! [`FrameSink`] and answer a few synchronous queries.

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

use crate::controller::ControlCommand;
use crate::error::DeviceError;

/// Highest value of the focal-length slider.
pub const MAX_FOCAL_PROGRESS: u32 = 200;

/// Map slider progress to a focal length: `progress / 100`, clamped to the slider range.
pub fn focal_length_from_progress(progress: u32) -> f32 {
    progress.min(MAX_FOCAL_PROGRESS) as f32 / 100.0
}

/// One raw NV21 preview buffer with its declared dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RawFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }
}

/// Preview size negotiated when the camera opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

/// Orientation/inertial sensor.
pub trait SensorSource: Send {
    /// Current readings as one comma-separated line.
    fn snapshot_line(&self) -> String;

    /// Field names matching [`snapshot_line`](Self::snapshot_line), comma-separated.
    fn header_description(&self) -> String;

    fn register(&mut self) -> Result<(), DeviceError>;

    fn unregister(&mut self);

    /// Clear accumulated state (filters, integrators) before a new session.
    fn reset(&mut self);
}

/// Camera delivering preview frames.
pub trait FrameSource: Send {
    /// Begin delivering frames into `sink`. Frames may arrive on any thread.
    fn open(&mut self, sink: FrameSink) -> Result<FrameGeometry, DeviceError>;

    /// Stop delivery and free the hardware handle.
    fn close(&mut self);

    fn current_focal_length(&self) -> f32;

    fn set_focal_length(&mut self, value: f32) -> Result<(), DeviceError>;
}

/// Per-frame callback target handed to a [`FrameSource`].
///
/// Holds a weak reference to the controller mailbox, so a camera that
/// outlives the controller just sees deliveries fail.
#[derive(Debug, Clone)]
pub struct FrameSink {
    tx: mpsc::WeakSender<ControlCommand>,
}

impl FrameSink {
    pub(crate) fn new(tx: mpsc::WeakSender<ControlCommand>) -> Self {
        Self { tx }
    }

    /// Hand a frame to the capture session without blocking.
    ///
    /// Returns false if the frame was dropped (mailbox full or controller gone).
    /// A dropped frame is never counted, so indices stay aligned.
    pub fn deliver(&self, frame: RawFrame) -> bool {
        let Some(tx) = self.tx.upgrade() else {
            return false;
        };
        match tx.try_send(ControlCommand::Frame(frame)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("capture mailbox full, frame dropped");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_focal_length_from_progress() {
        assert_eq!(focal_length_from_progress(0), 0.0);
        assert_eq!(focal_length_from_progress(150), 1.5);
        assert_eq!(focal_length_from_progress(200), 2.0);
        assert_eq!(focal_length_from_progress(500), 2.0);
    }

    #[test]
    fn test_sink_without_controller_drops() {
        let (tx, rx) = mpsc::channel(1);
        let sink = FrameSink::new(tx.downgrade());
        drop(tx);
        drop(rx);
        assert!(!sink.deliver(RawFrame::new(vec![1, 2, 3], 1, 1)));
    }

    #[test]
    fn test_sink_full_mailbox_drops() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = FrameSink::new(tx.downgrade());
        assert!(sink.deliver(RawFrame::new(vec![1], 1, 1)));
        assert!(!sink.deliver(RawFrame::new(vec![2], 1, 1)));
        assert!(matches!(rx.try_recv(), Ok(ControlCommand::Frame(f)) if f.data == vec![1]));
    }
}
