//! Scoped ownership wrappers for Win32 GDI and desktop handles.
//!
//! Every OS handle used by the capture path is held in a wrapper whose
//! `Drop` releases it, so handles are freed on every exit path including
//! early failure returns. This module only exists on Windows.

use tracing::warn;
use windows::Win32::Foundation::{GENERIC_ALL, HANDLE};
use windows::Win32::Graphics::Gdi::{
    BI_RGB, BITMAPINFO, BITMAPINFOHEADER, CreateCompatibleDC, CreateDIBSection, CreatedHDC,
    DIB_RGB_COLORS, DeleteDC, DeleteObject, GetDC, HBITMAP, HDC, ReleaseDC,
};
use windows::Win32::System::StationsAndDesktops::{
    CloseDesktop, DESKTOP_ACCESS_FLAGS, DESKTOP_CONTROL_FLAGS, GetUserObjectInformationW, HDESK,
    OpenInputDesktop, SetThreadDesktop, UOI_NAME,
};

// ── ScopedDesktopDc ──────────────────────────────────────────────

/// A screen device context from `GetDC(NULL)`, released on drop.
pub(crate) struct ScopedDesktopDc(pub HDC);

impl ScopedDesktopDc {
    pub fn get() -> Option<Self> {
        let dc = unsafe { GetDC(None) };
        if dc.is_invalid() {
            warn!("GetDC failed");
            return None;
        }
        Some(Self(dc))
    }
}

impl Drop for ScopedDesktopDc {
    fn drop(&mut self) {
        unsafe {
            ReleaseDC(None, self.0);
        }
    }
}

// ── ScopedMemoryDc ───────────────────────────────────────────────

/// A memory device context from `CreateCompatibleDC`, deleted on drop.
pub(crate) struct ScopedMemoryDc(pub CreatedHDC);

impl ScopedMemoryDc {
    pub fn create_compatible(dc: HDC) -> Option<Self> {
        let memory_dc = unsafe { CreateCompatibleDC(dc) };
        if memory_dc.is_invalid() {
            warn!("CreateCompatibleDC failed");
            return None;
        }
        Some(Self(memory_dc))
    }

    /// The context as a plain `HDC` for drawing calls.
    pub fn as_hdc(&self) -> HDC {
        HDC(self.0.0)
    }
}

impl Drop for ScopedMemoryDc {
    fn drop(&mut self) {
        unsafe {
            let _ = DeleteDC(self.0);
        }
    }
}

// ── ScopedBitmap ─────────────────────────────────────────────────

/// An owned `HBITMAP`, deleted on drop.
pub(crate) struct ScopedBitmap(pub HBITMAP);

impl Drop for ScopedBitmap {
    fn drop(&mut self) {
        unsafe {
            let _ = DeleteObject(self.0.into());
        }
    }
}

// ── DibSurface ───────────────────────────────────────────────────

/// A top-down 32 bpp DIB section: the drawing surface behind one frame
/// slot. The bits pointer stays valid for the bitmap's lifetime.
pub(crate) struct DibSurface {
    pub bitmap: ScopedBitmap,
    bits: *mut u8,
    len: usize,
}

impl DibSurface {
    pub fn create(dc: HDC, width: u32, height: u32) -> Option<Self> {
        let bmi = BITMAPINFO {
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

        let mut bits: *mut core::ffi::c_void = std::ptr::null_mut();
        let bitmap =
            match unsafe { CreateDIBSection(dc, &bmi, DIB_RGB_COLORS, &mut bits, None, 0) } {
                Ok(bitmap) => bitmap,
                Err(e) => {
                    warn!("CreateDIBSection failed: {e}");
                    return None;
                }
            };
        if bits.is_null() {
            return None;
        }

        Some(Self {
            bitmap: ScopedBitmap(bitmap),
            bits: bits as *mut u8,
            len: width as usize * height as usize * 4,
        })
    }

    /// The surface bytes after the OS has drawn into them.
    ///
    /// # Safety
    ///
    /// The caller must ensure no GDI operation is writing to the surface
    /// while the slice is alive.
    pub unsafe fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.bits, self.len) }
    }
}

// ── Desktop ──────────────────────────────────────────────────────

/// An owned desktop session handle, closed on drop.
pub(crate) struct Desktop {
    handle: HDESK,
}

impl Desktop {
    /// The desktop currently receiving user input, if it can be opened.
    pub fn input_desktop() -> Option<Self> {
        let handle = unsafe {
            OpenInputDesktop(
                DESKTOP_CONTROL_FLAGS(0),
                false,
                DESKTOP_ACCESS_FLAGS(GENERIC_ALL.0),
            )
        }
        .ok()?;
        Some(Self { handle })
    }

    /// The desktop's name, used for identity comparison.
    pub fn name(&self) -> Option<String> {
        let mut buffer = [0u16; 256];
        let mut needed = 0u32;
        unsafe {
            GetUserObjectInformationW(
                HANDLE(self.handle.0),
                UOI_NAME,
                Some(buffer.as_mut_ptr() as *mut _),
                (buffer.len() * 2) as u32,
                Some(&mut needed),
            )
        }
        .ok()?;
        let end = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
        Some(String::from_utf16_lossy(&buffer[..end]))
    }

    /// Whether both handles refer to the same desktop (by name).
    pub fn is_same(&self, other: &Desktop) -> bool {
        match (self.name(), other.name()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Assign the calling thread to this desktop.
    pub fn set_thread_desktop(&self) -> bool {
        unsafe { SetThreadDesktop(self.handle) }.is_ok()
    }
}

impl Drop for Desktop {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseDesktop(self.handle);
        }
    }
}
