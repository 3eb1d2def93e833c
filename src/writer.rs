//! Dedicated writer task for outbound connection messages.
//!
//! Operations never touch the socket directly. Each connection owns a
//! writer task that receives text frames over an mpsc channel and hands
//! each one, as a single websocket message, to the transport's sink.
//!
//! # Architecture
//!
//! ```text
//! ping    ─┐
//! login   ─┼─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► Sink<String>
//! channel ─┘
//! ```
//!
//! Frames from one connection are delivered in the order they were queued.

use std::fmt::Display;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{ProtocolError, Result};

/// Default maximum pending frames before backpressure kicks in.
pub const DEFAULT_MAX_PENDING_FRAMES: usize = 1024;

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default backpressure timeout.
pub const DEFAULT_BACKPRESSURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum frames fed to the sink before one flush.
const MAX_BATCH_SIZE: usize = 64;

/// One text message ready for the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    /// Serialized JSON frame.
    pub text: String,
}

impl OutboundFrame {
    /// Create a frame from owned text.
    #[inline]
    pub fn text(text: String) -> Self {
        Self { text }
    }
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Maximum pending frames before backpressure kicks in.
    pub max_pending_frames: usize,
    /// Channel capacity for frame queue.
    pub channel_capacity: usize,
    /// Timeout when waiting for backpressure to clear.
    pub backpressure_timeout: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_pending_frames: DEFAULT_MAX_PENDING_FRAMES,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            backpressure_timeout: DEFAULT_BACKPRESSURE_TIMEOUT,
        }
    }
}

/// Handle for queueing frames on a connection's writer task.
///
/// Cheaply cloneable.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
    pending: Arc<AtomicUsize>,
    max_pending: usize,
    timeout: Duration,
}

impl WriterHandle {
    fn new(
        tx: mpsc::Sender<OutboundFrame>,
        pending: Arc<AtomicUsize>,
        max_pending: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            tx,
            pending,
            max_pending,
            timeout,
        }
    }

    /// Queue a frame, waiting for backpressure to clear if needed.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::DeliveryFailure`] if the writer task is gone or
    /// backpressure does not clear within the configured timeout.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        if self.pending.load(Ordering::Acquire) >= self.max_pending {
            self.wait_for_backpressure().await?;
        }

        self.pending.fetch_add(1, Ordering::AcqRel);

        self.tx.send(frame).await.map_err(|_| {
            self.pending.fetch_sub(1, Ordering::Release);
            ProtocolError::DeliveryFailure("connection closed".into())
        })
    }

    async fn wait_for_backpressure(&self) -> Result<()> {
        let start = Instant::now();
        let check_interval = Duration::from_micros(100);

        loop {
            if self.pending.load(Ordering::Acquire) < self.max_pending {
                return Ok(());
            }

            if start.elapsed() > self.timeout {
                return Err(ProtocolError::DeliveryFailure(
                    "backpressure timeout".into(),
                ));
            }

            tokio::time::sleep(check_interval).await;
        }
    }

    /// Frames queued but not yet handed to the sink.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

/// Spawn the writer task and return a handle for queueing frames.
///
/// `sink` is the transport's outbound half (for example the split sink
/// of a websocket, mapped to text messages). The task ends cleanly when
/// every [`WriterHandle`] is dropped, and with an error when the sink
/// rejects a message.
pub fn spawn_writer_task<S>(sink: S, config: WriterConfig) -> (WriterHandle, JoinHandle<Result<()>>)
where
    S: Sink<String> + Unpin + Send + 'static,
    S::Error: Display,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let pending = Arc::new(AtomicUsize::new(0));

    let handle = WriterHandle::new(
        tx,
        pending.clone(),
        config.max_pending_frames,
        config.backpressure_timeout,
    );

    let task = tokio::spawn(writer_loop(rx, sink, pending));

    (handle, task)
}

async fn writer_loop<S>(
    mut rx: mpsc::Receiver<OutboundFrame>,
    mut sink: S,
    pending: Arc<AtomicUsize>,
) -> Result<()>
where
    S: Sink<String> + Unpin,
    S::Error: Display,
{
    while let Some(first) = rx.recv().await {
        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);

        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        let batch_size = batch.len();
        let written = write_batch(&mut sink, batch).await;
        pending.fetch_sub(batch_size, Ordering::Release);

        if let Err(e) = written {
            tracing::warn!(error = %e, "connection write failed, stopping writer");
            return Err(e);
        }
    }

    Ok(())
}

/// Feed every frame of a batch as its own message, then flush once.
async fn write_batch<S>(sink: &mut S, batch: Vec<OutboundFrame>) -> Result<()>
where
    S: Sink<String> + Unpin,
    S::Error: Display,
{
    if batch.is_empty() {
        return Ok(());
    }

    for frame in batch {
        sink.feed(frame.text).await.map_err(delivery_failure)?;
    }
    sink.flush().await.map_err(delivery_failure)
}

fn delivery_failure(e: impl Display) -> ProtocolError {
    ProtocolError::DeliveryFailure(e.to_string())
}
