//! # vizor-core
//!
//! Core library for the vizor remote-desktop host: the continuously
//! running capture → diff → encode → publish pipeline.
//!
//! This crate contains:
//! - **Frame model**: [`DesktopFrame`] and the two-slot [`FrameRing`]
//! - **Differencing**: [`Differ`] — block-level dirty-region detection
//! - **Scheduling**: [`CaptureScheduler`] — capture cycle pacing
//! - **Capture**: [`ScreenCapturer`] / [`GdiScreenCapturer`] with lazy OS
//!   resource lifecycle, and [`CursorCapturer`] with mask reconstruction
//! - **Encoding**: [`VideoEncoder`] / [`CursorEncoder`] capability traits
//!   with zstd-backed implementations
//! - **Pipeline**: [`ScreenUpdater`] — the ack-paced, cancellable worker
//! - **Error**: [`VizorError`] — typed, `thiserror`-based error hierarchy

pub mod desktop;
pub mod error;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use error::VizorError;

pub use desktop::{
    CaptureScheduler, CursorCapturer, CursorEncoder, CursorShape, DesktopFrame, Differ,
    FrameRing, GdiCursorCapturer, GdiScreenCapturer, MouseCursor, PixelFormat, Rect, Region,
    ScreenCapturer, ScreenUpdater, UpdateEvent, UpdaterConfig, UpdaterFeatures, VideoEncoder,
    VideoEncoding, VideoPacket,
};
