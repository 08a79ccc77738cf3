//! Ordered background frame writer.
//!
//! Frame encoding and file I/O are too slow for the frame callback, so jobs go
//! through a bounded FIFO to one dedicated thread. A single consumer means
//! frame N is always written before frame N+1.
//!
//! ```text
//! capture callback ──submit──▶ [ FIFO (frame_queue_depth) ] ──▶ writer thread
//!                                                                 │
//!                                     on_report(FrameWriteReport) ◀┘
//! ```

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::DatasetStore;

/// One raw frame waiting to be persisted.
#[derive(Debug)]
pub struct FrameJob {
    pub index: u32,
    pub frames_dir: PathBuf,
    pub payload: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Outcome of one job, delivered in submission order.
#[derive(Debug)]
pub struct FrameWriteReport {
    pub index: u32,
    pub result: Result<PathBuf, StoreError>,
}

enum WriterMessage {
    Write(FrameJob),
    Flush(oneshot::Sender<()>),
}

type ReportFn = Box<dyn Fn(FrameWriteReport) + Send + 'static>;

/// Handle to the writer thread. Dropping it drains the queue and joins the thread.
pub struct FrameWriter {
    tx: Option<SyncSender<WriterMessage>>,
    handle: Option<JoinHandle<()>>,
}

impl FrameWriter {
    /// Start the writer thread.
    ///
    /// `on_report` runs on the writer thread once per job, in job order.
    pub fn spawn<F>(
        store: Arc<dyn DatasetStore>,
        queue_depth: usize,
        on_report: F,
    ) -> Result<Self, StoreError>
    where
        F: Fn(FrameWriteReport) + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(queue_depth.max(1));
        let report: ReportFn = Box::new(on_report);

        let handle = thread::Builder::new()
            .name("gyl-frame-writer".to_string())
            .spawn(move || run_writer_loop(store, rx, report))
            .map_err(|_| StoreError::WriterClosed)?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// Queue a frame, blocking while the queue is full.
    ///
    /// Not for use on an async runtime thread; see [`try_submit`](Self::try_submit).
    pub fn submit(&self, job: FrameJob) -> Result<(), StoreError> {
        let tx = self.tx.as_ref().ok_or(StoreError::WriterClosed)?;
        tx.send(WriterMessage::Write(job))
            .map_err(|_| StoreError::WriterClosed)
    }

    /// Queue a frame without waiting. A full queue rejects the job with
    /// [`StoreError::QueueFull`] and the frame is not written.
    pub fn try_submit(&self, job: FrameJob) -> Result<(), StoreError> {
        let tx = self.tx.as_ref().ok_or(StoreError::WriterClosed)?;
        let index = job.index;
        tx.try_send(WriterMessage::Write(job)).map_err(|e| match e {
            TrySendError::Full(_) => StoreError::QueueFull { index },
            TrySendError::Disconnected(_) => StoreError::WriterClosed,
        })
    }

    /// Resolves once every frame submitted before this call has been reported.
    ///
    /// Waiting for queue space happens on the blocking pool, so this never
    /// stalls the runtime thread.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let tx = self.tx.clone().ok_or(StoreError::WriterClosed)?;
        let (ack_tx, ack_rx) = oneshot::channel();
        tokio::task::spawn_blocking(move || tx.send(WriterMessage::Flush(ack_tx)))
            .await
            .map_err(|_| StoreError::WriterClosed)?
            .map_err(|_| StoreError::WriterClosed)?;
        ack_rx.await.map_err(|_| StoreError::WriterClosed)
    }

    /// Blocking variant of [`flush`](Self::flush) for non-async callers.
    ///
    /// Must not be called from inside an async runtime.
    pub fn flush_blocking(&self) -> Result<(), StoreError> {
        let tx = self.tx.as_ref().ok_or(StoreError::WriterClosed)?;
        let (ack_tx, ack_rx) = oneshot::channel();
        tx.send(WriterMessage::Flush(ack_tx))
            .map_err(|_| StoreError::WriterClosed)?;
        ack_rx.blocking_recv().map_err(|_| StoreError::WriterClosed)
    }
}

impl Drop for FrameWriter {
    fn drop(&mut self) {
        // Closing the channel lets the loop finish the backlog and exit
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("frame writer thread panicked");
            }
        }
    }
}

fn run_writer_loop(store: Arc<dyn DatasetStore>, rx: Receiver<WriterMessage>, report: ReportFn) {
    debug!("frame writer started");
    while let Ok(message) = rx.recv() {
        match message {
            WriterMessage::Write(job) => {
                let result = store.write_frame(
                    &job.frames_dir,
                    job.index,
                    &job.payload,
                    job.width,
                    job.height,
                );
                report(FrameWriteReport {
                    index: job.index,
                    result,
                });
            }
            WriterMessage::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("frame writer stopped");
}
