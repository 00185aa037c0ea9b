//! Pointer shape capture and reconstruction.
//!
//! The OS reports cursors in two shapes: modern color cursors carry a
//! 32-bit bitmap that may already contain an alpha channel, while legacy
//! cursors ship a monochrome AND/XOR mask pair with no alpha at all.
//! Both are reduced here to a single premultiplied 32-bit image with a
//! hotspot, which is what downstream encoders consume.

// ── Pixel constants ──────────────────────────────────────────────

// 32-bit pixels with alpha in the high byte of the little-endian word.
const PIXEL_BLACK: u32 = 0xFF00_0000;
const PIXEL_WHITE: u32 = 0xFFFF_FFFF;
const PIXEL_TRANSPARENT: u32 = 0x0000_0000;

// A set mask bit after conversion to 32 bpp: all color bits on, alpha
// forced to zero by the bitmap readback.
const MASK_SET: u32 = 0x00FF_FFFF;

// ── MouseCursor ──────────────────────────────────────────────────

/// A reconstructed pointer shape.
///
/// Pixels are 32-bit, premultiplied, in the same byte order as captured
/// frames. Immutable once built; ownership moves to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MouseCursor {
    width: u32,
    height: u32,
    hotspot_x: u32,
    hotspot_y: u32,
    data: Vec<u8>,
}

impl MouseCursor {
    /// Build a cursor from premultiplied pixel bytes.
    ///
    /// # Panics
    ///
    /// Panics if `data` is not exactly `width * height * 4` bytes.
    pub fn new(width: u32, height: u32, hotspot_x: u32, hotspot_y: u32, data: Vec<u8>) -> Self {
        assert_eq!(data.len(), width as usize * height as usize * 4);
        Self {
            width,
            height,
            hotspot_x,
            hotspot_y,
            data,
        }
    }

    fn from_pixels(pixels: &[u32], width: u32, height: u32, hotspot: (u32, u32)) -> Self {
        let mut data = Vec::with_capacity(pixels.len() * 4);
        for px in pixels {
            data.extend_from_slice(&px.to_le_bytes());
        }
        Self::new(width, height, hotspot.0, hotspot.1, data)
    }

    /// Shape width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Shape height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Hotspot offset from the top-left corner.
    pub fn hotspot(&self) -> (u32, u32) {
        (self.hotspot_x, self.hotspot_y)
    }

    /// Premultiplied pixel bytes, `width * height * 4`.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

// ── Reconstruction ───────────────────────────────────────────────

/// Scans a 32 bpp plane for any pixel with a non-zero alpha component.
fn has_alpha_channel(pixels: &[u32]) -> bool {
    pixels.iter().any(|px| px >> 24 != 0)
}

/// Repaint every fully-transparent pixel that touches an opaque-black
/// pixel (4-neighborhood) as opaque white, so an all-black shape stays
/// visible against dark backgrounds.
fn add_cursor_outline(width: usize, height: usize, pixels: &mut [u32]) {
    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            if pixels[i] != PIXEL_TRANSPARENT {
                continue;
            }
            if (y > 0 && pixels[i - width] == PIXEL_BLACK)
                || (y < height - 1 && pixels[i + width] == PIXEL_BLACK)
                || (x > 0 && pixels[i - 1] == PIXEL_BLACK)
                || (x < width - 1 && pixels[i + 1] == PIXEL_BLACK)
            {
                pixels[i] = PIXEL_WHITE;
            }
        }
    }
}

/// Scale each color channel by the pixel's alpha (`c' = c * a / 255`).
pub(crate) fn premultiply_alpha(pixels: &mut [u32]) {
    for px in pixels.iter_mut() {
        let alpha = *px >> 24;
        let b = (*px & 0xFF) * alpha / 0xFF;
        let g = ((*px >> 8) & 0xFF) * alpha / 0xFF;
        let r = ((*px >> 16) & 0xFF) * alpha / 0xFF;
        *px = (alpha << 24) | (r << 16) | (g << 8) | b;
    }
}

/// Reconstruct a [`MouseCursor`] from raw 32 bpp bitmap planes.
///
/// `mask_plane` is the monochrome mask converted to 32 bpp (alpha zeroed
/// by the readback). `color_plane`, when present, is the cursor's color
/// bitmap of the same dimensions. For legacy cursors `color_plane` is
/// absent and the mask stacks the AND half above the XOR half, so the true
/// cursor height is `mask_height / 2` and the XOR half becomes the color
/// source.
pub fn cursor_from_planes(
    mask_plane: &[u32],
    color_plane: Option<&[u32]>,
    width: u32,
    mask_height: u32,
    hotspot: (u32, u32),
) -> MouseCursor {
    let w = width as usize;

    let (height, mut image, has_alpha, mask) = match color_plane {
        Some(color) => {
            let h = mask_height as usize;
            (h, color.to_vec(), has_alpha_channel(color), mask_plane)
        }
        None => {
            let h = mask_height as usize / 2;
            (h, mask_plane[w * h..w * h * 2].to_vec(), false, &mask_plane[..w * h])
        }
    };

    // Synthesize transparency from the mask when the color source carries
    // no alpha of its own.
    if !has_alpha {
        let mut add_outline = false;

        for (dst, &mask_px) in image.iter_mut().zip(mask) {
            // The mask and color bits combine four ways:
            //
            //   mask  color     output color  output alpha
            //    0     zero      black         ff
            //    0     white     white         ff
            //    1     zero      -             00
            //    1     nonzero   black         ff  (+ outline)
            //
            // The (1, nonzero) case is a reverse-screen cursor; it is not
            // rendered as an invert effect and degrades to solid black with
            // a white outline so it stays visible.
            if mask_px == MASK_SET {
                if *dst != 0 {
                    add_outline = true;
                    *dst = PIXEL_BLACK;
                } else {
                    *dst = PIXEL_TRANSPARENT;
                }
            } else {
                *dst = PIXEL_BLACK ^ *dst;
            }
        }

        if add_outline {
            add_cursor_outline(w, height, &mut image);
        }
    }

    // Downstream consumers assume premultiplied color.
    premultiply_alpha(&mut image);

    MouseCursor::from_pixels(&image, width, height as u32, hotspot)
}

// ── CursorCapturer ───────────────────────────────────────────────

/// Captures the OS pointer shape once per call.
///
/// `None` means the cursor is hidden or retrieval failed this cycle; both
/// are non-fatal and the pipeline simply skips the cursor update.
pub trait CursorCapturer: Send {
    fn capture_cursor(&mut self) -> Option<MouseCursor>;
}

/// GDI-based cursor capturer.
///
/// # Platform
///
/// Real capture is **Windows-only**; elsewhere every call returns `None`.
#[derive(Debug, Default)]
pub struct GdiCursorCapturer;

impl GdiCursorCapturer {
    pub fn new() -> Self {
        Self
    }
}

// ── Windows implementation ───────────────────────────────────────

#[cfg(target_os = "windows")]
mod platform {
    use super::*;
    use crate::desktop::gdi::{ScopedBitmap, ScopedDesktopDc};
    use tracing::warn;
    use windows::Win32::Graphics::Gdi::{
        BI_RGB, BITMAP, BITMAPINFO, BITMAPINFOHEADER, DIB_RGB_COLORS, GetDIBits, GetObjectW,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        CURSORINFO, CURSOR_SHOWING, GetCursorInfo, GetIconInfo, HICON, ICONINFO,
    };

    impl CursorCapturer for GdiCursorCapturer {
        fn capture_cursor(&mut self) -> Option<MouseCursor> {
            let mut info = CURSORINFO {
                cbSize: std::mem::size_of::<CURSORINFO>() as u32,
                ..Default::default()
            };
            if unsafe { GetCursorInfo(&mut info) }.is_err() {
                warn!("GetCursorInfo failed");
                return None;
            }
            if info.flags != CURSOR_SHOWING {
                return None;
            }
            unsafe { cursor_from_handle(HICON(info.hCursor.0)) }
        }
    }

    /// Read the cursor's bitmaps and hand them to the reconstruction pass.
    unsafe fn cursor_from_handle(icon: HICON) -> Option<MouseCursor> {
        let mut icon_info = ICONINFO::default();
        if unsafe { GetIconInfo(icon, &mut icon_info) }.is_err() {
            warn!("GetIconInfo failed");
            return None;
        }

        // Owned from here on; released on every path below.
        let mask_bitmap = ScopedBitmap(icon_info.hbmMask);
        let color_bitmap =
            (!icon_info.hbmColor.is_invalid()).then(|| ScopedBitmap(icon_info.hbmColor));

        let mut bitmap_info = BITMAP::default();
        let read = unsafe {
            GetObjectW(
                mask_bitmap.0.into(),
                std::mem::size_of::<BITMAP>() as i32,
                Some(&mut bitmap_info as *mut BITMAP as *mut _),
            )
        };
        if read == 0 {
            warn!("GetObjectW failed");
            return None;
        }

        let width = bitmap_info.bmWidth as u32;
        let mask_height = bitmap_info.bmHeight as u32;

        let dc = ScopedDesktopDc::get()?;

        let mask_plane = unsafe { read_plane(&dc, &mask_bitmap, width, mask_height)? };
        let color_plane = match &color_bitmap {
            Some(bitmap) => Some(unsafe { read_plane(&dc, bitmap, width, mask_height)? }),
            None => None,
        };

        Some(cursor_from_planes(
            &mask_plane,
            color_plane.as_deref(),
            width,
            mask_height,
            (icon_info.xHotspot, icon_info.yHotspot),
        ))
    }

    /// Read a bitmap as top-down 32 bpp words. The readback zeroes the
    /// alpha component of every pixel for bitmaps that carry none.
    unsafe fn read_plane(
        dc: &ScopedDesktopDc,
        bitmap: &ScopedBitmap,
        width: u32,
        height: u32,
    ) -> Option<Vec<u32>> {
        let mut pixels = vec![0u32; width as usize * height as usize];
        let mut bmi = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width as i32,
                biHeight: -(height as i32), // top-down
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };

        let lines = unsafe {
            GetDIBits(
                dc.0,
                bitmap.0,
                0,
                height,
                Some(pixels.as_mut_ptr() as *mut _),
                &mut bmi,
                DIB_RGB_COLORS,
            )
        };
        if lines == 0 {
            warn!("GetDIBits failed");
            return None;
        }
        Some(pixels)
    }
}

// ── Non-Windows stub ─────────────────────────────────────────────

#[cfg(not(target_os = "windows"))]
impl CursorCapturer for GdiCursorCapturer {
    fn capture_cursor(&mut self) -> Option<MouseCursor> {
        None
    }
}

// ── Tests ────────────────────────────────────────────────────────
