//! Scripted hardware and a controller rig shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use framestore::{nv21_len, DatasetStore, FileStore, SessionLayout, StoreError};
use gylcapture::{
    AnnotationPrompt, CaptureEvent, CaptureHandle, ControllerConfig, DeviceError, FrameGeometry,
    FrameSink, FrameSource, RawFrame, SensorSource,
};
use tokio::sync::broadcast;

pub const WIDTH: u32 = 8;
pub const HEIGHT: u32 = 6;

/// Counts lifecycle calls on the scripted devices.
#[derive(Debug, Default)]
pub struct DeviceLog {
    pub sensor_registered: u32,
    pub sensor_unregistered: u32,
    pub sensor_resets: u32,
    pub camera_opened: u32,
    pub camera_closed: u32,
}

pub type SharedLog = Arc<Mutex<DeviceLog>>;

/// Emits `"<n>.0,<n>.5,-<n>.0"` for the n-th snapshot since the last reset.
pub struct ScriptedSensor {
    reads: AtomicU32,
    log: SharedLog,
}

impl SensorSource for ScriptedSensor {
    fn snapshot_line(&self) -> String {
        let n = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{n}.0,{n}.5,-{n}.0")
    }

    fn header_description(&self) -> String {
        "azimuth,pitch,roll".to_string()
    }

    fn register(&mut self) -> Result<(), DeviceError> {
        self.log.lock().unwrap().sensor_registered += 1;
        Ok(())
    }

    fn unregister(&mut self) {
        self.log.lock().unwrap().sensor_unregistered += 1;
    }

    fn reset(&mut self) {
        self.reads.store(0, Ordering::SeqCst);
        self.log.lock().unwrap().sensor_resets += 1;
    }
}

/// Camera that never produces frames on its own; tests push them through the handle.
pub struct ScriptedCamera {
    focal_length: f32,
    unavailable: bool,
    log: SharedLog,
}

impl FrameSource for ScriptedCamera {
    fn open(&mut self, _sink: FrameSink) -> Result<FrameGeometry, DeviceError> {
        if self.unavailable {
            return Err(DeviceError::Unavailable("no camera".to_string()));
        }
        self.log.lock().unwrap().camera_opened += 1;
        Ok(FrameGeometry {
            width: WIDTH,
            height: HEIGHT,
        })
    }

    fn close(&mut self) {
        self.log.lock().unwrap().camera_closed += 1;
    }

    fn current_focal_length(&self) -> f32 {
        self.focal_length
    }

    fn set_focal_length(&mut self, value: f32) -> Result<(), DeviceError> {
        self.focal_length = value;
        Ok(())
    }
}

/// File store whose frame writes take `delay` each.
pub struct SlowStore {
    inner: FileStore,
    delay: Duration,
}

impl DatasetStore for SlowStore {
    fn create_session_directories(&self, session_id: &str) -> Result<SessionLayout, StoreError> {
        self.inner.create_session_directories(session_id)
    }

    fn write_frame(
        &self,
        frames_dir: &Path,
        frame_index: u32,
        raw_frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<PathBuf, StoreError> {
        std::thread::sleep(self.delay);
        self.inner
            .write_frame(frames_dir, frame_index, raw_frame, width, height)
    }

    fn write_sensor_log(
        &self,
        root_dir: &Path,
        header: &str,
        records: &[(f32, &str)],
    ) -> Result<PathBuf, StoreError> {
        self.inner.write_sensor_log(root_dir, header, records)
    }

    fn write_annotation(
        &self,
        root_dir: &Path,
        timestamp: &str,
        text: &str,
    ) -> Result<PathBuf, StoreError> {
        self.inner.write_annotation(root_dir, timestamp, text)
    }
}

pub struct Rig {
    pub handle: CaptureHandle,
    pub events: broadcast::Receiver<CaptureEvent>,
    pub devices: SharedLog,
}

pub struct RigBuilder {
    store: Arc<dyn DatasetStore>,
    prompt: Arc<dyn AnnotationPrompt>,
    camera_unavailable: bool,
    focal_length: f32,
    config: ControllerConfig,
}

impl RigBuilder {
    pub fn new(dataset_root: &Path, prompt: impl AnnotationPrompt + 'static) -> Self {
        Self {
            store: Arc::new(FileStore::at_path(dataset_root)),
            prompt: Arc::new(prompt),
            camera_unavailable: false,
            focal_length: 4.0,
            config: ControllerConfig::default(),
        }
    }

    pub fn camera_unavailable(mut self) -> Self {
        self.camera_unavailable = true;
        self
    }

    pub fn focal_length(mut self, value: f32) -> Self {
        self.focal_length = value;
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.config.tick_interval = interval;
        self
    }

    pub fn slow_writes(mut self, dataset_root: &Path, delay: Duration) -> Self {
        self.store = Arc::new(SlowStore {
            inner: FileStore::at_path(dataset_root),
            delay,
        });
        self
    }

    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.config.queue_depth = depth;
        self
    }

    pub fn build(self) -> Rig {
        let devices = SharedLog::default();
        let sensor = ScriptedSensor {
            reads: AtomicU32::new(0),
            log: Arc::clone(&devices),
        };
        let camera = ScriptedCamera {
            focal_length: self.focal_length,
            unavailable: self.camera_unavailable,
            log: Arc::clone(&devices),
        };
        let handle = gylcapture::spawn(
            self.config,
            self.store,
            Box::new(sensor),
            Box::new(camera),
            self.prompt,
        );
        let events = handle.subscribe();
        Rig {
            handle,
            events,
            devices,
        }
    }
}

pub fn valid_frame() -> RawFrame {
    RawFrame::new(vec![120u8; nv21_len(WIDTH, HEIGHT)], WIDTH, HEIGHT)
}

pub fn empty_frame() -> RawFrame {
    RawFrame::new(Vec::new(), WIDTH, HEIGHT)
}

/// Everything already published, without waiting.
pub fn drain_events(events: &mut broadcast::Receiver<CaptureEvent>) -> Vec<CaptureEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}
