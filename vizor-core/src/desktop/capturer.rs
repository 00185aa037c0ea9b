//! GDI screen capture with a lazily managed resource lifecycle.
//!
//! [`GdiScreenCapturer`] owns a source device context, a compatible memory
//! context, two DIB-backed frame slots, and a sized differ. The set is
//! valid or invalid as a whole: a display-bounds change or an input-desktop
//! switch tears everything down, and the next capture cycle recreates it.
//! A cycle that cannot rebuild its resources reports no frame and is
//! retried; it never aborts the pipeline.
//!
//! # Platform
//!
//! Real capture is **Windows-only**. On other platforms the type exists
//! but every cycle reports no frame.

use crate::desktop::frame::DesktopFrame;

// ── ScreenCapturer ───────────────────────────────────────────────

/// Produces one frame per call, with its dirty region already computed.
///
/// The returned borrow is read-only and cannot outlive the next capture
/// call: the backing slot is reused.
pub trait ScreenCapturer: Send {
    fn capture_frame(&mut self) -> Option<&DesktopFrame>;
}

// ── GdiScreenCapturer ────────────────────────────────────────────

/// Screen capturer backed by GDI bit-block transfer.
///
/// Resources are created on first use, never in `new`, so construction is
/// infallible and a transient allocation failure only costs one cycle.
#[derive(Default)]
pub struct GdiScreenCapturer {
    #[cfg(target_os = "windows")]
    state: platform::GdiState,
}

impl GdiScreenCapturer {
    pub fn new() -> Self {
        Self::default()
    }
}

// ── Windows implementation ───────────────────────────────────────

#[cfg(target_os = "windows")]
mod platform {
    use super::*;
    use crate::desktop::differ::Differ;
    use crate::desktop::frame::{FrameRing, NUM_FRAMES, PixelFormat};
    use crate::desktop::gdi::{Desktop, DibSurface, ScopedDesktopDc, ScopedMemoryDc};
    use crate::desktop::region::Rect;
    use tracing::warn;
    use windows::Win32::Graphics::Gdi::{BitBlt, CAPTUREBLT, ROP_CODE, SRCCOPY, SelectObject};
    use windows::Win32::UI::WindowsAndMessaging::{
        GetSystemMetrics, SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN,
        SM_YVIRTUALSCREEN,
    };

    /// The collectively-valid capture resource set.
    #[derive(Default)]
    pub(super) struct GdiState {
        /// Desktop the capture thread is currently bound to.
        desktop: Option<Desktop>,
        desktop_dc: Option<ScopedDesktopDc>,
        memory_dc: Option<ScopedMemoryDc>,
        /// Capture bounds recorded at last resource creation.
        dc_bounds: Option<Rect>,
        surfaces: Option<[DibSurface; NUM_FRAMES]>,
        ring: Option<FrameRing>,
        differ: Option<Differ>,
    }

    // The worker task owns the capturer exclusively; GDI handles are only
    // ever touched from that one task.
    unsafe impl Send for GdiState {}

    /// Bounds of the full virtual screen.
    fn virtual_screen_bounds() -> Rect {
        unsafe {
            Rect::new(
                GetSystemMetrics(SM_XVIRTUALSCREEN),
                GetSystemMetrics(SM_YVIRTUALSCREEN),
                GetSystemMetrics(SM_CXVIRTUALSCREEN).max(0) as u32,
                GetSystemMetrics(SM_CYVIRTUALSCREEN).max(0) as u32,
            )
        }
    }

    impl GdiScreenCapturer {
        /// Ensure capture resources are valid for the current display
        /// configuration and input desktop.
        ///
        /// Returns `false` when any OS allocation fails; the caller must
        /// skip capture this cycle and retry on the next one.
        pub fn prepare_resources(&mut self) -> bool {
            let state = &mut self.state;

            // Switch to the desktop receiving user input if it differs
            // from the one we are bound to.
            if let Some(input) = Desktop::input_desktop() {
                let same = state.desktop.as_ref().is_some_and(|d| d.is_same(&input));
                if !same {
                    // Release the contexts first, otherwise the rebind fails.
                    state.desktop_dc = None;
                    state.memory_dc = None;

                    if input.set_thread_desktop() {
                        state.desktop = Some(input);
                    } else {
                        // The thread keeps its previous desktop assignment;
                        // capture continues from there rather than stopping.
                        warn!("desktop rebind failed; capturing previous desktop");
                    }
                }
            }

            // If the display bounds changed, recreate the whole set.
            let bounds = virtual_screen_bounds();
            if state.dc_bounds != Some(bounds) {
                state.desktop_dc = None;
                state.memory_dc = None;
                state.dc_bounds = None;
            }

            if state.desktop_dc.is_none() {
                debug_assert!(state.memory_dc.is_none());

                if bounds.is_empty() {
                    warn!("virtual screen reports zero area");
                    return false;
                }
                let Some(desktop_dc) = ScopedDesktopDc::get() else {
                    return false;
                };
                let Some(memory_dc) = ScopedMemoryDc::create_compatible(desktop_dc.0) else {
                    return false;
                };

                // Both frame slots, their surfaces, and the differ are
                // rebuilt together; a half-built set is never kept.
                let Some(first) = DibSurface::create(memory_dc.as_hdc(), bounds.width, bounds.height)
                else {
                    return false;
                };
                let Some(second) =
                    DibSurface::create(memory_dc.as_hdc(), bounds.width, bounds.height)
                else {
                    return false;
                };

                state.ring = Some(FrameRing::new(bounds.width, bounds.height, PixelFormat::Bgra8));
                state.differ = Some(Differ::new(bounds.width, bounds.height));
                state.surfaces = Some([first, second]);
                state.desktop_dc = Some(desktop_dc);
                state.memory_dc = Some(memory_dc);
                state.dc_bounds = Some(bounds);
            }

            true
        }

        fn capture_inner(&mut self) -> Option<&DesktopFrame> {
            if !self.prepare_resources() {
                return None;
            }

            let state = &mut self.state;
            let memory_dc = state.memory_dc.as_ref()?;
            let desktop_dc = state.desktop_dc.as_ref()?;
            let bounds = state.dc_bounds?;
            let surfaces = state.surfaces.as_ref()?;
            let ring = state.ring.as_mut()?;
            let differ = state.differ.as_mut()?;

            // Blit the screen into the current slot's surface.
            let surface = &surfaces[ring.current_index()];
            unsafe {
                let old_bitmap = SelectObject(memory_dc.as_hdc(), surface.bitmap.0.into());
                if !old_bitmap.is_invalid() {
                    if let Err(e) = BitBlt(
                        memory_dc.as_hdc(),
                        0,
                        0,
                        bounds.width as i32,
                        bounds.height as i32,
                        desktop_dc.0,
                        bounds.x,
                        bounds.y,
                        ROP_CODE(SRCCOPY.0 | CAPTUREBLT.0),
                    ) {
                        warn!("BitBlt failed: {e}");
                    }
                    SelectObject(memory_dc.as_hdc(), old_bitmap);
                }
            }

            // Copy the surface bytes into the slot's frame buffer.
            {
                let frame = ring.current_frame_mut();
                let data = frame.data_mut();
                let src = unsafe { surface.bytes() };
                let len = src.len().min(data.len());
                data[..len].copy_from_slice(&src[..len]);
            }

            // Diff against the previous slot and rotate.
            let (previous, current) = ring.previous_and_current_mut();
            let dirty = differ.calc_dirty_region(previous, current);
            *current.dirty_region_mut() = dirty;
            ring.advance();

            // After the rotation the just-written frame is "previous".
            Some(ring.previous_frame())
        }
    }

    impl ScreenCapturer for GdiScreenCapturer {
        fn capture_frame(&mut self) -> Option<&DesktopFrame> {
            self.capture_inner()
        }
    }
}

// ── Non-Windows stub ─────────────────────────────────────────────

#[cfg(not(target_os = "windows"))]
impl GdiScreenCapturer {
    /// GDI capture is only available on Windows.
    pub fn prepare_resources(&mut self) -> bool {
        false
    }
}

#[cfg(not(target_os = "windows"))]
impl ScreenCapturer for GdiScreenCapturer {
    fn capture_frame(&mut self) -> Option<&DesktopFrame> {
        None
    }
}
