//! gyl-record: drive one capture session end to end with synthetic hardware.
//!
//! Produces a real session directory (JPEG frames, sensor.txt, annotation.txt)
//! under the configured dataset root. Useful for checking storage, config and
//! permissions on a machine without a camera.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use framestore::{nv21_len, FileStore, StoreConfig};
use gylcapture::{
    CaptureEvent, ControllerConfig, DeviceError, FixedAnnotation, FrameGeometry, FrameSink,
    FrameSource, RawFrame, SensorSource,
};
use gylconf::GylConfig;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Record a synthetic GYL capture session", long_about = None)]
struct Cli {
    /// Config file to use instead of ./gyl.toml
    #[arg(short, long, env = "GYL_CONFIG")]
    config: Option<PathBuf>,

    /// How long to record
    #[arg(short, long, default_value = "3")]
    seconds: u64,

    /// Synthetic camera frame rate
    #[arg(long, default_value = "10")]
    fps: u32,

    /// Annotation text; omit to cancel the prompt
    #[arg(short, long)]
    annotation: Option<String>,

    /// Focal-length slider position (0-200)
    #[arg(long)]
    focal_progress: Option<u32>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    show_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = GylConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load config")?;

    if cli.show_config {
        print!("{}", config.to_toml());
        return Ok(());
    }

    let filter = EnvFilter::try_new(&config.telemetry.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("gyl-record {} starting", env!("CARGO_PKG_VERSION"));
    for file in &sources.files {
        info!("config file: {}", file.display());
    }
    for var in &sources.env_overrides {
        info!("config override: {}", var);
    }

    let store = Arc::new(FileStore::new(StoreConfig::from(&config)));
    let camera = SyntheticCamera::new(
        config.capture.frame_width,
        config.capture.frame_height,
        cli.fps,
    );
    let handle = gylcapture::spawn(
        ControllerConfig::from(&config),
        store,
        Box::new(SyntheticSensor::new()),
        Box::new(camera),
        Arc::new(FixedAnnotation(cli.annotation.clone())),
    );

    let mut events = handle.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                CaptureEvent::Elapsed { seconds } => info!("elapsed {}s", seconds),
                CaptureEvent::FrameWriteFailed { index, message, .. } => {
                    warn!("frame {} failed: {}", index, message)
                }
                CaptureEvent::FinalizeWriteFailed { message, .. } => warn!("{}", message),
                _ => {}
            }
        }
    });

    if let Some(progress) = cli.focal_progress {
        handle
            .set_focal_progress(progress)
            .await
            .context("Failed to set focal length")?;
    }

    let session_id = handle.start().await.context("Failed to start session")?;
    info!("recording {} for {}s", session_id, cli.seconds);

    tokio::time::sleep(Duration::from_secs(cli.seconds)).await;

    let summary = handle.stop().await.context("Failed to stop session")?;
    handle
        .set_visible(false)
        .await
        .context("Failed to release hardware")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", summary);
    }
    Ok(())
}

/// Orientation readings that drift slowly, so consecutive lines differ.
struct SyntheticSensor {
    started: Instant,
}

impl SyntheticSensor {
    fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl SensorSource for SyntheticSensor {
    fn snapshot_line(&self) -> String {
        let t = self.started.elapsed().as_secs_f32();
        format!(
            "{:.3},{:.3},{:.3}",
            t.sin() * 180.0,
            t.cos() * 10.0,
            (t * 0.5).sin() * 5.0
        )
    }

    fn header_description(&self) -> String {
        "azimuth,pitch,roll".to_string()
    }

    fn register(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn unregister(&mut self) {}

    fn reset(&mut self) {
        self.started = Instant::now();
    }
}

/// Emits gradient NV21 frames from a background thread at a fixed rate.
struct SyntheticCamera {
    width: u32,
    height: u32,
    fps: u32,
    focal_hundredths: Arc<AtomicU32>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl SyntheticCamera {
    fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            fps: fps.max(1),
            focal_hundredths: Arc::new(AtomicU32::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

fn gradient_frame(width: u32, height: u32, shift: u32) -> Vec<u8> {
    let mut data = vec![128u8; nv21_len(width, height)];
    let luma = (width * height) as usize;
    for (i, px) in data[..luma].iter_mut().enumerate() {
        let x = i as u32 % width;
        *px = ((x + shift) % 256) as u8;
    }
    data
}

impl FrameSource for SyntheticCamera {
    fn open(&mut self, sink: FrameSink) -> Result<FrameGeometry, DeviceError> {
        if self.worker.is_some() {
            return Err(DeviceError::Busy("synthetic camera already open".to_string()));
        }
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let (width, height) = (self.width, self.height);
        let period = Duration::from_secs(1) / self.fps;
        let worker = thread::Builder::new()
            .name("gyl-synthetic-camera".to_string())
            .spawn(move || {
                let mut shift = 0u32;
                while running.load(Ordering::SeqCst) {
                    let frame = gradient_frame(width, height, shift);
                    sink.deliver(RawFrame::new(frame, width, height));
                    shift = shift.wrapping_add(4);
                    thread::sleep(period);
                }
            })
            .map_err(|e| DeviceError::Unavailable(e.to_string()))?;
        self.worker = Some(worker);

        Ok(FrameGeometry { width, height })
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    fn current_focal_length(&self) -> f32 {
        self.focal_hundredths.load(Ordering::SeqCst) as f32 / 100.0
    }

    fn set_focal_length(&mut self, value: f32) -> Result<(), DeviceError> {
        if !(0.0..=2.0).contains(&value) {
            return Err(DeviceError::Unsupported(format!("focal length {}", value)));
        }
        self.focal_hundredths
            .store((value * 100.0).round() as u32, Ordering::SeqCst);
        Ok(())
    }
}
