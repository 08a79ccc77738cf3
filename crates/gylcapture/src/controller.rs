//! Capture controller: a single task that owns the session and the hardware.
//!
//! Every input (UI commands, camera frames, timer ticks) arrives through one
//! mailbox and is handled to completion before the next, so a frame can never
//! interleave with a stop.
//!
//! ```text
//!   CaptureHandle ─┐
//!   FrameSink ─────┼──▶ mailbox ──▶ controller task ──▶ CaptureSession ──▶ FrameWriter thread
//!   ticker task ───┘                     │
//!                                        └──▶ broadcast<CaptureEvent>
//! ```
//!
//! Finalization runs in its own task and reports back through the mailbox,
//! so the controller keeps answering (and rejecting) commands meanwhile.

use std::sync::Arc;
use std::time::Duration;

use framestore::{DatasetStore, StoreError};
use gylconf::GylConfig;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::annotation::AnnotationPrompt;
use crate::capture::{CaptureSession, Finalization, FrameOutcome};
use crate::error::{CaptureError, Result};
use crate::events::CaptureEvent;
use crate::lease::HardwareLease;
use crate::session::{
    AnnotationRecord, SessionId, SessionIdGenerator, SessionState, SessionSummary,
};
use crate::sources::{
    focal_length_from_progress, FrameGeometry, FrameSink, FrameSource, RawFrame, SensorSource,
};

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub tick_interval: Duration,
    /// Capacity of the background frame write queue.
    pub queue_depth: usize,
    /// Capacity of the controller mailbox; frames beyond it are dropped uncounted.
    pub mailbox_depth: usize,
    pub event_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            queue_depth: 64,
            mailbox_depth: 256,
            event_capacity: 256,
        }
    }
}

impl From<&GylConfig> for ControllerConfig {
    fn from(config: &GylConfig) -> Self {
        Self {
            tick_interval: Duration::from_millis(config.capture.tick_interval_ms),
            queue_depth: config.capture.frame_queue_depth,
            ..Self::default()
        }
    }
}

/// Snapshot of the controller for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureStatus {
    pub state: SessionState,
    pub session_id: Option<SessionId>,
    pub frame_counter: u32,
    pub elapsed_seconds: u32,
    pub buffered_records: usize,
    pub hardware_held: bool,
    /// Negotiated preview size while the camera is open.
    pub preview: Option<FrameGeometry>,
}

#[derive(Debug)]
pub(crate) enum ControlCommand {
    Start {
        reply: oneshot::Sender<Result<SessionId>>,
    },
    Stop {
        reply: oneshot::Sender<Result<SessionSummary>>,
    },
    Frame(RawFrame),
    Tick {
        generation: u64,
    },
    SetVisible {
        visible: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    SetFocalLength {
        value: f32,
        reply: oneshot::Sender<Result<()>>,
    },
    Status {
        reply: oneshot::Sender<CaptureStatus>,
    },
    FinalizeComplete {
        summary: SessionSummary,
        reply: oneshot::Sender<Result<SessionSummary>>,
    },
}

/// Orchestrator-facing API. Cheap to clone; the controller exits once every
/// handle is dropped.
#[derive(Debug, Clone)]
pub struct CaptureHandle {
    tx: mpsc::Sender<ControlCommand>,
    events: broadcast::Sender<CaptureEvent>,
}

impl CaptureHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ControlCommand,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| CaptureError::ControllerClosed)?;
        response.await.map_err(|_| CaptureError::ControllerClosed)
    }

    /// Acquire hardware if needed, create the session directories, start recording.
    pub async fn start(&self) -> Result<SessionId> {
        self.request(|reply| ControlCommand::Start { reply }).await?
    }

    /// Stop recording and wait for finalization (annotation plus logs).
    ///
    /// Frames submitted before this call are part of the session; anything
    /// later is dropped.
    pub async fn stop(&self) -> Result<SessionSummary> {
        self.request(|reply| ControlCommand::Stop { reply }).await?
    }

    /// Deliver a frame without waiting. False if it was dropped.
    pub fn submit_frame(&self, frame: RawFrame) -> bool {
        self.frame_sink().deliver(frame)
    }

    pub fn frame_sink(&self) -> FrameSink {
        FrameSink::new(self.tx.downgrade())
    }

    /// Hidden releases the camera and sensor; visible re-acquires them.
    pub async fn set_visible(&self, visible: bool) -> Result<()> {
        self.request(|reply| ControlCommand::SetVisible { visible, reply })
            .await?
    }

    pub async fn set_focal_length(&self, value: f32) -> Result<()> {
        self.request(|reply| ControlCommand::SetFocalLength { value, reply })
            .await?
    }

    /// Apply a focal-length slider position (0..=200).
    pub async fn set_focal_progress(&self, progress: u32) -> Result<()> {
        self.set_focal_length(focal_length_from_progress(progress))
            .await
    }

    pub async fn status(&self) -> Result<CaptureStatus> {
        self.request(|reply| ControlCommand::Status { reply }).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.events.subscribe()
    }
}

/// Start the controller task on the current tokio runtime.
pub fn spawn(
    config: ControllerConfig,
    store: Arc<dyn DatasetStore>,
    sensor: Box<dyn SensorSource>,
    camera: Box<dyn FrameSource>,
    prompt: Arc<dyn AnnotationPrompt>,
) -> CaptureHandle {
    let (tx, rx) = mpsc::channel(config.mailbox_depth.max(1));
    let (events, _) = broadcast::channel(config.event_capacity.max(1));

    let controller = Controller {
        session: CaptureSession::new(Arc::clone(&store), events.clone(), config.queue_depth),
        lease: HardwareLease::new(sensor, camera),
        ids: SessionIdGenerator::new(),
        store,
        prompt,
        events: events.clone(),
        self_tx: tx.downgrade(),
        tick_interval: config.tick_interval,
        ticker: None,
        generation: 0,
    };
    tokio::spawn(controller.run(rx));

    CaptureHandle { tx, events }
}

struct Controller {
    session: CaptureSession,
    lease: HardwareLease,
    ids: SessionIdGenerator,
    store: Arc<dyn DatasetStore>,
    prompt: Arc<dyn AnnotationPrompt>,
    events: broadcast::Sender<CaptureEvent>,
    self_tx: mpsc::WeakSender<ControlCommand>,
    tick_interval: Duration,
    ticker: Option<CancellationToken>,
    generation: u64,
}

impl Controller {
    async fn run(mut self, mut rx: mpsc::Receiver<ControlCommand>) {
        debug!("capture controller started");
        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        self.cancel_ticker();
        if self.session.state() == SessionState::Recording {
            self.save_abandoned_session().await;
        }
        self.lease.release();
        debug!("capture controller stopped");
    }

    /// Every handle went away mid-recording. Nobody is left to answer an
    /// annotation prompt, so the session is saved without one.
    async fn save_abandoned_session(&mut self) {
        let mut finalization = match self.session.begin_finalize() {
            Ok(finalization) => finalization,
            Err(e) => {
                error!("could not finalize abandoned session: {}", e);
                return;
            }
        };
        let session_id = finalization.session_id().clone();
        warn!(
            "controller closed while recording {}, saving without annotation",
            session_id
        );

        finalization.drain_frames().await;
        let header = self.lease.sensor().header_description();
        let outcome = finalization.persist(self.store.as_ref(), &header, None);
        for e in &outcome.errors {
            report_finalize_error(&self.events, e);
        }

        self.session.complete_finalize();
        info!(
            "session {} finalized on shutdown: {} frames, {} failed",
            session_id,
            outcome.summary.frame_count,
            outcome.summary.failed_frames.len()
        );
        self.publish(CaptureEvent::Finalized(outcome.summary));
    }

    fn publish(&self, event: CaptureEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn handle(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::Start { reply } => {
                let _ = reply.send(self.start());
            }
            ControlCommand::Stop { reply } => self.stop(reply),
            ControlCommand::Frame(frame) => {
                let outcome = self
                    .session
                    .on_frame(frame, self.lease.sensor(), self.lease.camera());
                if let FrameOutcome::Accepted { index } = outcome {
                    debug!("frame {} captured", index);
                }
            }
            ControlCommand::Tick { generation } => {
                if generation != self.generation {
                    return;
                }
                if let Some(seconds) = self.session.tick() {
                    self.publish(CaptureEvent::Elapsed { seconds });
                }
            }
            ControlCommand::SetVisible { visible, reply } => {
                let result = if visible {
                    self.lease
                        .acquire(FrameSink::new(self.self_tx.clone()))
                        .map(|_| ())
                        .map_err(CaptureError::from)
                } else {
                    self.lease.release();
                    Ok(())
                };
                let _ = reply.send(result);
            }
            ControlCommand::SetFocalLength { value, reply } => {
                let result = self
                    .lease
                    .camera_mut()
                    .set_focal_length(value)
                    .map_err(CaptureError::from);
                let _ = reply.send(result);
            }
            ControlCommand::Status { reply } => {
                let _ = reply.send(self.status());
            }
            ControlCommand::FinalizeComplete { summary, reply } => {
                self.session.complete_finalize();
                info!(
                    "session {} finalized: {} frames, {} failed",
                    summary.session_id,
                    summary.frame_count,
                    summary.failed_frames.len()
                );
                self.publish(CaptureEvent::Finalized(summary.clone()));
                let _ = reply.send(Ok(summary));
            }
        }
    }

    fn status(&self) -> CaptureStatus {
        CaptureStatus {
            state: self.session.state(),
            session_id: self.session.session_id().cloned(),
            frame_counter: self.session.frame_counter(),
            elapsed_seconds: self.session.elapsed_seconds(),
            buffered_records: self.session.buffered_records(),
            hardware_held: self.lease.is_held(),
            preview: self.lease.geometry(),
        }
    }

    fn start(&mut self) -> Result<SessionId> {
        match self.session.state() {
            SessionState::Idle => {}
            SessionState::Recording => return Err(CaptureError::AlreadyRecording),
            SessionState::Finalizing => return Err(CaptureError::Busy),
        }

        self.lease.acquire(FrameSink::new(self.self_tx.clone()))?;

        let session_id = self.ids.next_id();
        let layout = self
            .store
            .create_session_directories(session_id.as_str())
            .map_err(|e| {
                error!("session {} not started: {}", session_id, e);
                CaptureError::DirectoryCreateFailed(e)
            })?;
        let root_dir = layout.root_dir().to_path_buf();

        self.session
            .start(session_id.clone(), layout, self.lease.sensor_mut())?;

        self.generation += 1;
        self.spawn_ticker();

        info!("recording session {} into {}", session_id, root_dir.display());
        self.publish(CaptureEvent::Started {
            session_id: session_id.clone(),
            root_dir,
        });
        self.publish(CaptureEvent::Elapsed { seconds: 0 });
        Ok(session_id)
    }

    fn stop(&mut self, reply: oneshot::Sender<Result<SessionSummary>>) {
        let finalization = match self.session.begin_finalize() {
            Ok(finalization) => finalization,
            Err(e) => {
                debug!("stop rejected: {}", e);
                let _ = reply.send(Err(e));
                return;
            }
        };
        self.cancel_ticker();

        let span = info_span!("session", id = %finalization.session_id());
        let task = FinalizeTask {
            finalization,
            store: Arc::clone(&self.store),
            prompt: Arc::clone(&self.prompt),
            events: self.events.clone(),
            sensor_header: self.lease.sensor().header_description(),
            self_tx: self.self_tx.clone(),
        };
        tokio::spawn(task.run(reply).instrument(span));
    }

    fn spawn_ticker(&mut self) {
        self.cancel_ticker();
        let cancel = CancellationToken::new();
        self.ticker = Some(cancel.clone());

        let tx = self.self_tx.clone();
        let period = self.tick_interval;
        let generation = self.generation;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(tx) = tx.upgrade() else { break };
                        if tx.send(ControlCommand::Tick { generation }).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }

    fn cancel_ticker(&mut self) {
        if let Some(cancel) = self.ticker.take() {
            cancel.cancel();
        }
    }
}

struct FinalizeTask {
    finalization: Finalization,
    store: Arc<dyn DatasetStore>,
    prompt: Arc<dyn AnnotationPrompt>,
    events: broadcast::Sender<CaptureEvent>,
    sensor_header: String,
    self_tx: mpsc::WeakSender<ControlCommand>,
}

impl FinalizeTask {
    async fn run(self, reply: oneshot::Sender<Result<SessionSummary>>) {
        let FinalizeTask {
            mut finalization,
            store,
            prompt,
            events,
            sensor_header,
            self_tx,
        } = self;

        finalization.drain_frames().await;

        let session_id = finalization.session_id().clone();
        let _ = events.send(CaptureEvent::AnnotationRequested {
            session_id: session_id.clone(),
        });
        let annotation = prompt
            .request_annotation(&session_id)
            .await
            .map(AnnotationRecord::now);

        let outcome = finalization.persist(store.as_ref(), &sensor_header, annotation);

        for e in &outcome.errors {
            report_finalize_error(&events, e);
        }

        match self_tx.upgrade() {
            Some(tx) => {
                let command = ControlCommand::FinalizeComplete {
                    summary: outcome.summary,
                    reply,
                };
                if tx.send(command).await.is_err() {
                    warn!("controller gone before finalization completed");
                }
            }
            None => {
                let _ = reply.send(Ok(outcome.summary));
            }
        }
    }
}

fn report_finalize_error(events: &broadcast::Sender<CaptureEvent>, err: &StoreError) {
    let _ = events.send(CaptureEvent::FinalizeWriteFailed {
        kind: err.kind(),
        message: err.to_string(),
    });
}
