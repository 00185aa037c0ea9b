//! The continuously running screen update pipeline.
//!
//! One dedicated worker executes the full cycle sequentially:
//!
//! ```text
//! begin → capture (diff inside) → encode video? → capture cursor?
//!       → encode cursor? → publish? → wait → begin …
//! ```
//!
//! The consumer talks back through exactly two signals: an acknowledgement
//! ("update consumed, ready for more") and termination. After publishing,
//! the worker holds until one of them arrives — an unconsumed update is
//! never overtaken. When a cycle publishes nothing, the worker instead
//! waits out the scheduler's remaining delay and captures again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::desktop::capturer::{GdiScreenCapturer, ScreenCapturer};
use crate::desktop::cursor::{CursorCapturer, GdiCursorCapturer};
use crate::desktop::encoder::{
    CursorEncoder, CursorShape, VideoEncoder, VideoEncoding, VideoPacket, create_cursor_encoder,
    create_video_encoder,
};
use crate::desktop::scheduler::CaptureScheduler;
use crate::error::VizorError;

// ── Features ─────────────────────────────────────────────────────

bitflags::bitflags! {
    /// Per-session feature toggles supplied by configuration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UpdaterFeatures: u32 {
        /// Capture and encode the pointer shape alongside video.
        const CURSOR_SHAPE = 0b0000_0001;
    }
}

// ── UpdaterConfig ────────────────────────────────────────────────

/// Configuration for [`ScreenUpdater`].
#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    /// Target interval between capture cycles.
    pub update_interval: Duration,
    /// Video encoding algorithm identifier.
    pub encoding: VideoEncoding,
    /// Compression parameter for the selected algorithm.
    pub compression_level: i32,
    /// Enabled session features.
    pub features: UpdaterFeatures,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_millis(30),
            encoding: VideoEncoding::Zstd,
            compression_level: 1,
            features: UpdaterFeatures::CURSOR_SHAPE,
        }
    }
}

// ── UpdateEvent ──────────────────────────────────────────────────

/// One published update: an encoded frame and/or an encoded cursor shape.
///
/// At least one of the two is always present; a cycle that produces
/// neither publishes nothing.
#[derive(Debug, Clone)]
pub struct UpdateEvent {
    pub video_packet: Option<VideoPacket>,
    pub cursor_shape: Option<CursorShape>,
}

// ── ScreenUpdater ────────────────────────────────────────────────

/// Consecutive failed cycles before the one-time escalation log. The
/// worker keeps retrying either way; transient failures never stop it.
const CAPTURE_FAILURE_ESCALATION: u32 = 30;

/// Consumer-side handle to the update pipeline.
///
/// Updates arrive in production order via [`next_update`](Self::next_update);
/// the consumer must call [`acknowledge`](Self::acknowledge) after handling
/// each one to unblock the next cycle.
pub struct ScreenUpdater {
    events: mpsc::Receiver<UpdateEvent>,
    ack: Arc<Notify>,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl ScreenUpdater {
    /// Start the pipeline with the platform's GDI capturers.
    ///
    /// Encoder selection happens here, before the worker is spawned: an
    /// unsupported encoding returns the error once and the loop never runs.
    pub fn start(config: UpdaterConfig) -> Result<Self, VizorError> {
        let cursor_capturer = config
            .features
            .contains(UpdaterFeatures::CURSOR_SHAPE)
            .then(GdiCursorCapturer::new);
        Self::start_with(config, GdiScreenCapturer::new(), cursor_capturer)
    }

    /// Start the pipeline with explicit capturers.
    pub fn start_with<C, K>(
        config: UpdaterConfig,
        capturer: C,
        cursor_capturer: Option<K>,
    ) -> Result<Self, VizorError>
    where
        C: ScreenCapturer + 'static,
        K: CursorCapturer + 'static,
    {
        let video_encoder = create_video_encoder(config.encoding, config.compression_level)?;
        let cursor_encoder = cursor_capturer
            .is_some()
            .then(|| create_cursor_encoder(config.compression_level));

        let (events_tx, events_rx) = mpsc::channel(1);
        let ack = Arc::new(Notify::new());
        let cancel = CancellationToken::new();

        let worker = UpdateWorker {
            capturer,
            cursor_capturer,
            video_encoder,
            cursor_encoder,
            scheduler: CaptureScheduler::new(),
            interval: config.update_interval,
            events: events_tx,
            ack: Arc::clone(&ack),
            cancel: cancel.clone(),
        };

        Ok(Self {
            events: events_rx,
            ack,
            cancel,
            worker: tokio::spawn(worker.run()),
        })
    }

    /// Receive the next update, in production order.
    ///
    /// Returns `None` once the worker has stopped and all pending updates
    /// were drained.
    pub async fn next_update(&mut self) -> Option<UpdateEvent> {
        self.events.recv().await
    }

    /// Signal that the last update was consumed.
    ///
    /// Unblocks the worker's publish wait; if the worker is in its idle
    /// delay instead, the delay is cut short and capture resumes at once.
    /// The signal is never lost: an acknowledgement sent before the worker
    /// reaches its wait point is held until it does.
    pub fn acknowledge(&self) {
        self.ack.notify_one();
    }

    /// A clonable termination token, e.g. for a ctrl-c task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request cooperative termination. The worker observes the signal at
    /// the top of every cycle and inside every wait.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stop the worker and wait for it to release its capture resources.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.worker.await;
    }
}

// ── UpdateWorker ─────────────────────────────────────────────────

/// The dedicated capture worker. Owns every capture resource exclusively;
/// the only cross-task state is the event channel, the acknowledgement
/// notifier, and the cancellation token.
struct UpdateWorker<C, K> {
    capturer: C,
    cursor_capturer: Option<K>,
    video_encoder: Box<dyn VideoEncoder>,
    cursor_encoder: Option<Box<dyn CursorEncoder>>,
    scheduler: CaptureScheduler,
    interval: Duration,
    events: mpsc::Sender<UpdateEvent>,
    ack: Arc<Notify>,
    cancel: CancellationToken,
}

impl<C, K> UpdateWorker<C, K>
where
    C: ScreenCapturer + 'static,
    K: CursorCapturer + 'static,
{
    async fn run(mut self) {
        debug!("update worker started");
        let mut failed_cycles: u32 = 0;

        while !self.cancel.is_cancelled() {
            self.scheduler.begin_cycle();
            let mut published = false;

            if let Some(frame) = self.capturer.capture_frame() {
                failed_cycles = 0;

                let video_packet = if frame.dirty_region().is_empty() {
                    None
                } else {
                    self.video_encoder.encode(frame)
                };

                let cursor_shape = match (&mut self.cursor_capturer, &mut self.cursor_encoder) {
                    (Some(capturer), Some(encoder)) => capturer
                        .capture_cursor()
                        .and_then(|cursor| encoder.encode(&cursor)),
                    _ => None,
                };

                if video_packet.is_some() || cursor_shape.is_some() {
                    let event = UpdateEvent {
                        video_packet,
                        cursor_shape,
                    };
                    if self.events.send(event).await.is_err() {
                        debug!("update channel closed; worker exiting");
                        break;
                    }
                    published = true;

                    // Hold until the consumer is ready for more or
                    // termination is requested. No timeout here: the
                    // pipeline never runs ahead of an unconsumed update.
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = self.ack.notified() => {}
                    }
                }
            } else {
                failed_cycles += 1;
                if failed_cycles == CAPTURE_FAILURE_ESCALATION {
                    error!("screen capture failing persistently ({failed_cycles} consecutive cycles)");
                } else {
                    debug!("capture produced no frame this cycle");
                }
            }

            if !published {
                // Idle path: nothing to deliver, wait out the rest of the
                // interval. An acknowledgement request or termination cuts
                // the wait short.
                let delay = self.scheduler.next_capture_delay(self.interval);
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = self.ack.notified() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        info!("update worker stopped");
        // Dropping `self` here releases every OS capture resource.
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_enables_cursor_shape() {
        let config = UpdaterConfig::default();
        assert!(config.features.contains(UpdaterFeatures::CURSOR_SHAPE));
        assert_eq!(config.encoding, VideoEncoding::Zstd);
    }

    #[tokio::test]
    async fn unsupported_encoding_never_starts_the_worker() {
        let config = UpdaterConfig {
            encoding: VideoEncoding::Vp9,
            ..Default::default()
        };
        let result =
            ScreenUpdater::start_with(config, GdiScreenCapturer::new(), None::<GdiCursorCapturer>);
        match result.err().expect("encoder construction must fail") {
            VizorError::UnsupportedEncoding(name) => assert_eq!(name, "vp9"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
