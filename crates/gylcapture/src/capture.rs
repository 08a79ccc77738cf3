//! The capture session state machine.
//!
//! ```text
//!   Idle ──start──▶ Recording ──begin_finalize──▶ Finalizing ──complete_finalize──▶ Idle
//!                     │  ▲
//!                     └──┘ on_frame / tick
//! ```
//!
//! `CaptureSession` is plain synchronous state. The controller owns it and
//! feeds it one command at a time, which is what makes "check state, append,
//! count" atomic per frame.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use framestore::{DatasetStore, FrameJob, FrameWriter, SessionLayout, StoreError};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::error::{CaptureError, Result};
use crate::events::CaptureEvent;
use crate::session::{
    AnnotationRecord, CaptureRecord, FrameFailure, SessionId, SessionState, SessionSummary,
};
use crate::sources::{FrameSource, RawFrame, SensorSource};

/// What happened to one frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Buffered and queued for writing under `index`.
    Accepted { index: u32 },
    /// Arrived outside `Recording`; not buffered, not counted.
    Dropped,
}

type FailureLog = Arc<Mutex<Vec<FrameFailure>>>;

fn record_failure(
    failures: &FailureLog,
    events: &broadcast::Sender<CaptureEvent>,
    index: u32,
    err: &StoreError,
) {
    warn!("frame {} not saved: {}", index, err);
    let failure = FrameFailure {
        index,
        kind: err.kind(),
        message: err.to_string(),
    };
    failures
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .push(failure.clone());
    let _ = events.send(CaptureEvent::FrameWriteFailed {
        index,
        kind: failure.kind,
        message: failure.message,
    });
}

pub struct CaptureSession {
    store: Arc<dyn DatasetStore>,
    events: broadcast::Sender<CaptureEvent>,
    queue_depth: usize,

    state: SessionState,
    session_id: Option<SessionId>,
    layout: Option<SessionLayout>,
    frame_counter: u32,
    elapsed_seconds: u32,
    sensor_buffer: Vec<String>,
    focal_buffer: Vec<f32>,
    writer: Option<FrameWriter>,
    failures: FailureLog,
}

impl CaptureSession {
    pub fn new(
        store: Arc<dyn DatasetStore>,
        events: broadcast::Sender<CaptureEvent>,
        queue_depth: usize,
    ) -> Self {
        Self {
            store,
            events,
            queue_depth,
            state: SessionState::Idle,
            session_id: None,
            layout: None,
            frame_counter: 1,
            elapsed_seconds: 0,
            sensor_buffer: Vec::new(),
            focal_buffer: Vec::new(),
            writer: None,
            failures: Arc::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn layout(&self) -> Option<&SessionLayout> {
        self.layout.as_ref()
    }

    /// Index the next accepted frame will get.
    pub fn frame_counter(&self) -> u32 {
        self.frame_counter
    }

    pub fn elapsed_seconds(&self) -> u32 {
        self.elapsed_seconds
    }

    pub fn buffered_records(&self) -> usize {
        debug_assert_eq!(self.sensor_buffer.len(), self.focal_buffer.len());
        self.sensor_buffer.len()
    }

    /// Aligned view of the buffers, indices from 1.
    pub fn records(&self) -> impl Iterator<Item = CaptureRecord<'_>> {
        aligned_records(&self.sensor_buffer, &self.focal_buffer)
    }

    /// Enter `Recording` for a session whose directories already exist.
    ///
    /// Counters and buffers are reset even if a previous session left
    /// residue. Nothing changes if this returns an error.
    pub fn start(
        &mut self,
        session_id: SessionId,
        layout: SessionLayout,
        sensor: &mut dyn SensorSource,
    ) -> Result<()> {
        match self.state {
            SessionState::Idle => {}
            SessionState::Recording => return Err(CaptureError::AlreadyRecording),
            SessionState::Finalizing => return Err(CaptureError::Busy),
        }

        let failures: FailureLog = Arc::default();
        let writer = {
            let failures = Arc::clone(&failures);
            let events = self.events.clone();
            FrameWriter::spawn(Arc::clone(&self.store), self.queue_depth, move |report| {
                if let Err(e) = report.result {
                    record_failure(&failures, &events, report.index, &e);
                }
            })
            .map_err(CaptureError::WriterUnavailable)?
        };

        sensor.reset();
        self.session_id = Some(session_id);
        self.layout = Some(layout);
        self.frame_counter = 1;
        self.elapsed_seconds = 0;
        self.sensor_buffer.clear();
        self.focal_buffer.clear();
        self.writer = Some(writer);
        self.failures = failures;
        self.state = SessionState::Recording;
        Ok(())
    }

    /// Capture one frame: snapshot sensor and focal length, buffer both, queue
    /// the image, advance the counter.
    ///
    /// Never blocks. A frame whose write fails, or that finds the write queue
    /// full, still consumes its index and is reported as a failed frame.
    pub fn on_frame(
        &mut self,
        frame: RawFrame,
        sensor: &dyn SensorSource,
        camera: &dyn FrameSource,
    ) -> FrameOutcome {
        if self.state != SessionState::Recording {
            debug!("frame outside recording dropped");
            return FrameOutcome::Dropped;
        }
        let (Some(layout), Some(writer)) = (self.layout.as_ref(), self.writer.as_ref()) else {
            return FrameOutcome::Dropped;
        };

        let index = self.frame_counter;
        self.sensor_buffer.push(sensor.snapshot_line());
        self.focal_buffer.push(camera.current_focal_length());

        let job = FrameJob {
            index,
            frames_dir: layout.frames_dir(),
            payload: frame.data,
            width: frame.width,
            height: frame.height,
        };
        if let Err(e) = writer.try_submit(job) {
            record_failure(&self.failures, &self.events, index, &e);
        }

        self.frame_counter += 1;
        FrameOutcome::Accepted { index }
    }

    /// One second passed. Returns the new elapsed count while recording.
    pub fn tick(&mut self) -> Option<u32> {
        if self.state != SessionState::Recording {
            return None;
        }
        self.elapsed_seconds += 1;
        Some(self.elapsed_seconds)
    }

    /// Leave `Recording`. No frame is buffered after this returns.
    ///
    /// The buffers and the frame writer move into the returned
    /// [`Finalization`]; the session stays `Finalizing` until
    /// [`complete_finalize`](Self::complete_finalize).
    pub fn begin_finalize(&mut self) -> Result<Finalization> {
        if self.state != SessionState::Recording {
            return Err(CaptureError::NotRecording(self.state));
        }
        let (Some(session_id), Some(layout)) = (self.session_id.clone(), self.layout.clone())
        else {
            return Err(CaptureError::NotRecording(self.state));
        };

        self.state = SessionState::Finalizing;
        info!(
            "finalizing {} after {} frames",
            session_id,
            self.frame_counter - 1
        );

        Ok(Finalization {
            session_id,
            layout,
            frame_count: self.frame_counter - 1,
            elapsed_seconds: self.elapsed_seconds,
            sensor_buffer: std::mem::take(&mut self.sensor_buffer),
            focal_buffer: std::mem::take(&mut self.focal_buffer),
            writer: self.writer.take(),
            failures: Arc::clone(&self.failures),
        })
    }

    pub fn complete_finalize(&mut self) {
        if self.state == SessionState::Finalizing {
            self.state = SessionState::Idle;
        }
    }
}

fn aligned_records<'a>(
    sensor: &'a [String],
    focal: &'a [f32],
) -> impl Iterator<Item = CaptureRecord<'a>> {
    sensor
        .iter()
        .zip(focal.iter())
        .enumerate()
        .map(|(i, (line, focal_length))| CaptureRecord {
            frame_index: i as u32 + 1,
            focal_length: *focal_length,
            sensor_line: line.as_str(),
        })
}

/// Everything a stopped session still has to persist.
pub struct Finalization {
    session_id: SessionId,
    layout: SessionLayout,
    frame_count: u32,
    elapsed_seconds: u32,
    sensor_buffer: Vec<String>,
    focal_buffer: Vec<f32>,
    writer: Option<FrameWriter>,
    failures: FailureLog,
}

/// Result of persisting a finalization. Write errors are collected, not raised.
pub struct FinalizeOutcome {
    pub summary: SessionSummary,
    pub errors: Vec<StoreError>,
}

impl Finalization {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn root_dir(&self) -> PathBuf {
        self.layout.root_dir().to_path_buf()
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn records(&self) -> impl Iterator<Item = CaptureRecord<'_>> {
        aligned_records(&self.sensor_buffer, &self.focal_buffer)
    }

    /// Wait until every queued frame has been written or reported, then stop
    /// the writer thread.
    pub async fn drain_frames(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.flush().await {
                warn!("frame writer closed before flush: {}", e);
            }
        }
    }

    /// Blocking variant of [`drain_frames`](Self::drain_frames).
    pub fn drain_frames_blocking(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.flush_blocking() {
                warn!("frame writer closed before flush: {}", e);
            }
        }
    }

    /// Write the annotation (if any) and the sensor log.
    ///
    /// Call after the frames are drained so the summary lists every failure.
    pub fn persist(
        self,
        store: &dyn DatasetStore,
        sensor_header: &str,
        annotation: Option<AnnotationRecord>,
    ) -> FinalizeOutcome {
        let mut errors = Vec::new();
        let root_dir = self.layout.root_dir();

        let annotation_saved = match annotation {
            Some(record) => match store.write_annotation(root_dir, &record.timestamp, &record.text) {
                Ok(_) => true,
                Err(e) => {
                    error!("{}", e);
                    errors.push(e);
                    false
                }
            },
            None => {
                info!("annotation input cancelled");
                false
            }
        };

        let records: Vec<(f32, &str)> = self
            .records()
            .map(|r| (r.focal_length, r.sensor_line))
            .collect();
        let sensor_log_saved = match store.write_sensor_log(root_dir, sensor_header, &records) {
            Ok(_) => true,
            Err(e) => {
                error!("{}", e);
                errors.push(e);
                false
            }
        };

        let mut failed_frames = self
            .failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        failed_frames.sort_by_key(|f| f.index);

        let summary = SessionSummary {
            session_id: self.session_id.clone(),
            root_dir: root_dir.to_path_buf(),
            frame_count: self.frame_count,
            elapsed_seconds: self.elapsed_seconds,
            failed_frames,
            sensor_log_saved,
            annotation_saved,
        };
        FinalizeOutcome { summary, errors }
    }
}
