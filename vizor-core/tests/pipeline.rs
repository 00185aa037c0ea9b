//! Pipeline integration tests — full producer/consumer lifecycle with a
//! scripted capturer: publish gating, ack pacing, idle waits, and
//! cooperative termination.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::time::timeout;

use vizor_core::desktop::capturer::ScreenCapturer;
use vizor_core::desktop::cursor::{CursorCapturer, GdiCursorCapturer, MouseCursor};
use vizor_core::desktop::encoder::VideoEncoding;
use vizor_core::desktop::frame::{DesktopFrame, PixelFormat};
use vizor_core::desktop::region::Rect;
use vizor_core::desktop::updater::{ScreenUpdater, UpdaterConfig, UpdaterFeatures};

// ── Helpers ──────────────────────────────────────────────────────

/// Capturer that follows a script of "did anything change" flags and then
/// repeats the final behavior. Counts capture calls.
struct FakeCapturer {
    frame: DesktopFrame,
    script: VecDeque<bool>,
    default_dirty: bool,
    captures: Arc<AtomicU32>,
}

impl FakeCapturer {
    fn new(script: &[bool], default_dirty: bool) -> (Self, Arc<AtomicU32>) {
        let captures = Arc::new(AtomicU32::new(0));
        (
            Self {
                frame: DesktopFrame::new(64, 48, PixelFormat::Bgra8),
                script: script.iter().copied().collect(),
                default_dirty,
                captures: Arc::clone(&captures),
            },
            captures,
        )
    }
}

impl ScreenCapturer for FakeCapturer {
    fn capture_frame(&mut self) -> Option<&DesktopFrame> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        let dirty = self.script.pop_front().unwrap_or(self.default_dirty);
        let (width, height) = (self.frame.width(), self.frame.height());
        self.frame.dirty_region_mut().clear();
        if dirty {
            self.frame
                .dirty_region_mut()
                .push(Rect::new(0, 0, width, height));
        }
        Some(&self.frame)
    }
}

/// Cursor capturer that always reports the same small shape.
struct FakeCursorCapturer;

impl CursorCapturer for FakeCursorCapturer {
    fn capture_cursor(&mut self) -> Option<MouseCursor> {
        Some(MouseCursor::new(4, 4, 1, 1, vec![0xFF; 64]))
    }
}

fn config(interval_ms: u64, features: UpdaterFeatures) -> UpdaterConfig {
    UpdaterConfig {
        update_interval: Duration::from_millis(interval_ms),
        encoding: VideoEncoding::Zstd,
        compression_level: 1,
        features,
    }
}

// ── Publish path ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn changed_frame_publishes_video_within_one_cycle() {
    let (capturer, _) = FakeCapturer::new(&[true], false);
    let mut updater = ScreenUpdater::start_with(
        config(100, UpdaterFeatures::empty()),
        capturer,
        None::<GdiCursorCapturer>,
    )
    .unwrap();

    let event = timeout(Duration::from_millis(100), updater.next_update())
        .await
        .expect("update should arrive within one cycle")
        .expect("worker should still be running");

    let packet = event.video_packet.expect("video packet expected");
    assert_eq!((packet.width, packet.height), (64, 48));
    // Cursor feature disabled: no shape in the event.
    assert!(event.cursor_shape.is_none());

    updater.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn idle_cycles_publish_nothing_and_wait_the_full_delay() {
    let (capturer, captures) = FakeCapturer::new(&[], false);
    let mut updater = ScreenUpdater::start_with(
        config(100, UpdaterFeatures::empty()),
        capturer,
        None::<GdiCursorCapturer>,
    )
    .unwrap();

    // Nothing changes, cursor disabled: no event across several cycles.
    let waited = timeout(Duration::from_millis(350), updater.next_update()).await;
    assert!(waited.is_err(), "no update should be published when idle");

    // The worker paced itself: one capture per interval, not a busy loop.
    let calls = captures.load(Ordering::SeqCst);
    assert!((3..=5).contains(&calls), "expected ~4 paced cycles, got {calls}");

    updater.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn cursor_only_update_is_published_once() {
    // Frames never change; the cursor feature is on. The first cycle
    // publishes a cursor-only event, after which duplicate suppression
    // keeps the pipeline silent.
    let (capturer, _) = FakeCapturer::new(&[], false);
    let mut updater = ScreenUpdater::start_with(
        config(50, UpdaterFeatures::CURSOR_SHAPE),
        capturer,
        Some(FakeCursorCapturer),
    )
    .unwrap();

    let event = timeout(Duration::from_millis(50), updater.next_update())
        .await
        .expect("cursor update should arrive")
        .expect("worker should still be running");
    assert!(event.video_packet.is_none());
    let shape = event.cursor_shape.expect("cursor shape expected");
    assert_eq!((shape.width, shape.height), (4, 4));

    updater.acknowledge();
    let silence = timeout(Duration::from_millis(200), updater.next_update()).await;
    assert!(silence.is_err(), "identical cursor must not be re-published");

    updater.shutdown().await;
}

// ── Ack pacing ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn no_second_publish_before_acknowledge() {
    let (capturer, _) = FakeCapturer::new(&[], true); // always dirty
    let mut updater = ScreenUpdater::start_with(
        config(20, UpdaterFeatures::empty()),
        capturer,
        None::<GdiCursorCapturer>,
    )
    .unwrap();

    let first = timeout(Duration::from_millis(100), updater.next_update())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.video_packet.unwrap().frame_number, 0);

    // Without an acknowledgement the worker holds, no matter how many
    // intervals pass.
    let held = timeout(Duration::from_millis(300), updater.next_update()).await;
    assert!(held.is_err(), "worker must not publish past an unconsumed update");

    updater.acknowledge();
    let second = timeout(Duration::from_millis(100), updater.next_update())
        .await
        .unwrap()
        .unwrap();
    // Production order is preserved.
    assert_eq!(second.video_packet.unwrap().frame_number, 1);

    updater.shutdown().await;
}

// ── Termination ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn termination_unblocks_publish_wait() {
    let (capturer, captures) = FakeCapturer::new(&[], true);
    let mut updater = ScreenUpdater::start_with(
        config(20, UpdaterFeatures::empty()),
        capturer,
        None::<GdiCursorCapturer>,
    )
    .unwrap();

    // One update arrives; the worker is now blocked waiting for the ack.
    let _ = timeout(Duration::from_millis(100), updater.next_update())
        .await
        .unwrap()
        .unwrap();
    let captures_at_stop = captures.load(Ordering::SeqCst);

    // Terminate instead of acknowledging.
    updater.stop();

    // The worker exits without publishing again: the channel closes.
    let next = timeout(Duration::from_millis(100), updater.next_update())
        .await
        .expect("termination should unblock the worker promptly");
    assert!(next.is_none(), "no further updates after termination");
    assert_eq!(captures.load(Ordering::SeqCst), captures_at_stop);

    updater.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn termination_interrupts_idle_wait() {
    let (capturer, _) = FakeCapturer::new(&[], false);
    let mut updater = ScreenUpdater::start_with(
        config(10_000, UpdaterFeatures::empty()), // very long idle delay
        capturer,
        None::<GdiCursorCapturer>,
    )
    .unwrap();

    // Give the worker a moment to enter its idle wait, then stop it. The
    // ten-second delay must not hold up the shutdown.
    tokio::time::sleep(Duration::from_millis(10)).await;
    updater.stop();
    let next = timeout(Duration::from_millis(100), updater.next_update())
        .await
        .expect("idle wait should be interruptible");
    assert!(next.is_none());

    updater.shutdown().await;
}
