//! Synchronized camera/sensor capture for the GYL localization dataset.
//!
//! Every camera frame is paired with a sensor snapshot and a focal-length
//! reading taken at the same instant. Frames are written as they arrive; the
//! sensor log and annotation are written when the session stops.
//!
//! # Modules
//!
//! - **session**: ids, states, records and the end-of-session summary
//! - **sources**: camera and sensor traits plus the [`FrameSink`] callback
//! - **lease**: idempotent acquire/release of the hardware
//! - **capture**: the [`CaptureSession`] state machine
//! - **controller**: the task that serializes all inputs, and its [`CaptureHandle`]
//! - **annotation**: the end-of-session prompt
//!
//! # Example
//!
//! ```rust,ignore
//! let handle = gylcapture::spawn(config, store, sensor, camera, prompt);
//! let mut events = handle.subscribe();
//!
//! handle.start().await?;
//! // camera pushes frames into handle.frame_sink()
//! let summary = handle.stop().await?;
//! println!("{}", summary);
//! ```

pub mod annotation;
pub mod capture;
pub mod controller;
pub mod error;
pub mod events;
pub mod lease;
pub mod session;
pub mod sources;

pub use annotation::{AnnotationPrompt, AnnotationRequest, ChannelAnnotationPrompt, FixedAnnotation};
pub use capture::{CaptureSession, FinalizeOutcome, Finalization, FrameOutcome};
pub use controller::{spawn, CaptureHandle, CaptureStatus, ControllerConfig};
pub use error::{CaptureError, DeviceError, Result};
pub use events::CaptureEvent;
pub use lease::HardwareLease;
pub use session::{
    format_timestamp, AnnotationRecord, CaptureRecord, FrameFailure, SessionId,
    SessionIdGenerator, SessionState, SessionSummary, TIMESTAMP_FORMAT,
};
pub use sources::{
    focal_length_from_progress, FrameGeometry, FrameSink, FrameSource, RawFrame, SensorSource,
    MAX_FOCAL_PROGRESS,
};
