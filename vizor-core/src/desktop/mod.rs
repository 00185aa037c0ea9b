//! # vizor desktop pipeline
//!
//! The producer half of a remote-desktop stream: capture the screen and
//! pointer, reduce consecutive frames to dirty regions, encode the
//! changes, and publish update events to a consumer.
//!
//! ## Architecture
//!
//! ```text
//! HOST (producer)                               VIEWER (consumer side)
//! ┌──────────────────────────────┐
//! │ GdiScreenCapturer            │
//! │   FrameRing (2 slots)        │
//! │   ↓                          │
//! │ Differ → dirty region        │          UpdateEvent
//! │   ↓                          │  ───────────────────────►  consumer
//! │ VideoEncoder (zstd)          │   ◄─── acknowledge ───
//! │                              │   ◄─── terminate ─────
//! │ GdiCursorCapturer            │
//! │   ↓ mask reconstruction      │
//! │ CursorEncoder                │
//! │                              │
//! │ CaptureScheduler paces the   │
//! │ whole cycle (ScreenUpdater)  │
//! └──────────────────────────────┘
//! ```
//!
//! ## Sub-modules
//!
//! | Module      | Purpose                                             |
//! |-------------|-----------------------------------------------------|
//! | `region`    | Rectangles and dirty-region sets                    |
//! | `frame`     | Frame buffer and the two-slot frame ring            |
//! | `differ`    | Block-level change detection between frames         |
//! | `scheduler` | Capture cycle pacing                                |
//! | `capturer`  | GDI screen capture and its resource lifecycle       |
//! | `cursor`    | Pointer capture and mask → RGBA reconstruction      |
//! | `encoder`   | Video / cursor encoders and packet types            |
//! | `updater`   | The producer worker loop and consumer handle        |

pub mod capturer;
pub mod cursor;
pub mod differ;
pub mod encoder;
pub mod frame;
pub mod region;
pub mod scheduler;
pub mod updater;

#[cfg(target_os = "windows")]
pub(crate) mod gdi;

// ── Re-exports ───────────────────────────────────────────────────

pub use capturer::{GdiScreenCapturer, ScreenCapturer};
pub use cursor::{CursorCapturer, GdiCursorCapturer, MouseCursor, cursor_from_planes};
pub use differ::Differ;
pub use encoder::{
    CursorEncoder, CursorShape, VideoEncoder, VideoEncoding, VideoPacket, ZstdCursorEncoder,
    ZstdVideoEncoder, create_cursor_encoder, create_video_encoder,
};
pub use frame::{DesktopFrame, FrameRing, NUM_FRAMES, PixelFormat};
pub use region::{Rect, Region};
pub use scheduler::CaptureScheduler;
pub use updater::{ScreenUpdater, UpdateEvent, UpdaterConfig, UpdaterFeatures};
