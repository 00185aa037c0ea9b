//! Video and cursor-shape encoders.
//!
//! Encoders are capability interfaces: the pipeline hands in a frame or a
//! pointer shape and receives an opaque encoded artifact, or `None` when
//! there is nothing worth sending this cycle. The concrete algorithm is
//! chosen once at startup from a configured identifier; adding a new
//! algorithm means adding a variant and a factory arm, never touching the
//! pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::desktop::cursor::MouseCursor;
use crate::desktop::frame::DesktopFrame;
use crate::desktop::region::Rect;
use crate::error::VizorError;

// ── VideoEncoding ────────────────────────────────────────────────

/// Video encoding algorithm identifiers accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoEncoding {
    /// Dirty-rect payload compressed with zstd.
    Zstd,
    /// VP8 — recognized but not available in this build.
    Vp8,
    /// VP9 — recognized but not available in this build.
    Vp9,
}

impl fmt::Display for VideoEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoEncoding::Zstd => write!(f, "zstd"),
            VideoEncoding::Vp8 => write!(f, "vp8"),
            VideoEncoding::Vp9 => write!(f, "vp9"),
        }
    }
}

impl FromStr for VideoEncoding {
    type Err = VizorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zstd" => Ok(VideoEncoding::Zstd),
            "vp8" => Ok(VideoEncoding::Vp8),
            "vp9" => Ok(VideoEncoding::Vp9),
            other => Err(VizorError::UnsupportedEncoding(other.to_string())),
        }
    }
}

// ── VideoPacket ──────────────────────────────────────────────────

/// An encoded screen update, opaque to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoPacket {
    /// Sequential packet counter.
    pub frame_number: u64,
    /// Source frame width in pixels.
    pub width: u32,
    /// Source frame height in pixels.
    pub height: u32,
    /// Number of dirty rectangles carried in the payload.
    pub rect_count: u32,
    /// Compressed payload.
    pub data: Vec<u8>,
}

impl VideoPacket {
    /// Serialize to bytes for a transport layer.
    pub fn to_bytes(&self) -> Result<Vec<u8>, VizorError> {
        bincode::serialize(self).map_err(|e| VizorError::Encoding(e.to_string()))
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VizorError> {
        bincode::deserialize(bytes).map_err(|e| VizorError::Encoding(e.to_string()))
    }
}

// ── CursorShape ──────────────────────────────────────────────────

/// An encoded pointer shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CursorShape {
    /// Shape width in pixels.
    pub width: u32,
    /// Shape height in pixels.
    pub height: u32,
    /// Hotspot X offset.
    pub hotspot_x: u32,
    /// Hotspot Y offset.
    pub hotspot_y: u32,
    /// Compressed premultiplied pixel data.
    pub data: Vec<u8>,
}

impl CursorShape {
    /// Serialize to bytes for a transport layer.
    pub fn to_bytes(&self) -> Result<Vec<u8>, VizorError> {
        bincode::serialize(self).map_err(|e| VizorError::Encoding(e.to_string()))
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VizorError> {
        bincode::deserialize(bytes).map_err(|e| VizorError::Encoding(e.to_string()))
    }
}

// ── Capability traits ────────────────────────────────────────────

/// Encodes a captured frame's dirty content into a packet.
pub trait VideoEncoder: Send {
    fn encode(&mut self, frame: &DesktopFrame) -> Option<VideoPacket>;
}

/// Encodes a reconstructed pointer shape.
pub trait CursorEncoder: Send {
    fn encode(&mut self, cursor: &MouseCursor) -> Option<CursorShape>;
}

// ── Factory ──────────────────────────────────────────────────────

/// Construct the configured video encoder.
///
/// An unavailable algorithm is the pipeline's single fatal startup
/// condition: the error is reported once and the update loop never runs.
pub fn create_video_encoder(
    encoding: VideoEncoding,
    compression_level: i32,
) -> Result<Box<dyn VideoEncoder>, VizorError> {
    match encoding {
        VideoEncoding::Zstd => Ok(Box::new(ZstdVideoEncoder::new(compression_level))),
        other => Err(VizorError::UnsupportedEncoding(other.to_string())),
    }
}

/// Construct the cursor-shape encoder.
pub fn create_cursor_encoder(compression_level: i32) -> Box<dyn CursorEncoder> {
    Box::new(ZstdCursorEncoder::new(compression_level))
}

// ── ZstdVideoEncoder ─────────────────────────────────────────────

/// Dirty-rect video encoder with zstd compression.
///
/// Payload layout before compression (little-endian):
///
/// ```text
/// rect_count: u32
/// repeated:   x: i32, y: i32, width: u32, height: u32, pixel rows
/// ```
///
/// Rows are packed tightly, without the source frame's stride padding.
pub struct ZstdVideoEncoder {
    /// zstd level: 1 = fast / less compression, 19 = slow / max.
    level: i32,
    frame_count: u64,
}

impl ZstdVideoEncoder {
    pub fn new(level: i32) -> Self {
        Self {
            level: level.clamp(1, 19),
            frame_count: 0,
        }
    }

    /// Number of packets produced so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn pack_dirty_rects(frame: &DesktopFrame, rects: &[Rect]) -> Vec<u8> {
        let bpp = frame.format().bytes_per_pixel();
        let stride = frame.stride() as usize;
        let data = frame.data();

        let payload_len: usize = rects.iter().map(|r| 16 + r.area() as usize * bpp).sum();
        let mut out = Vec::with_capacity(4 + payload_len);

        out.extend_from_slice(&(rects.len() as u32).to_le_bytes());
        for rect in rects {
            out.extend_from_slice(&rect.x.to_le_bytes());
            out.extend_from_slice(&rect.y.to_le_bytes());
            out.extend_from_slice(&rect.width.to_le_bytes());
            out.extend_from_slice(&rect.height.to_le_bytes());

            let left = rect.x.max(0) as usize * bpp;
            let row_bytes = rect.width as usize * bpp;
            for row in 0..rect.height {
                let y = (rect.y + row as i32).max(0) as usize;
                let offset = y * stride + left;
                out.extend_from_slice(&data[offset..offset + row_bytes]);
            }
        }

        out
    }
}

impl VideoEncoder for ZstdVideoEncoder {
    fn encode(&mut self, frame: &DesktopFrame) -> Option<VideoPacket> {
        let rects = frame.dirty_region().rects();
        if rects.is_empty() {
            return None;
        }

        let raw = Self::pack_dirty_rects(frame, rects);
        let data = match zstd::encode_all(raw.as_slice(), self.level) {
            Ok(data) => data,
            Err(e) => {
                warn!("zstd frame encode failed: {e}");
                return None;
            }
        };

        let frame_number = self.frame_count;
        self.frame_count += 1;

        Some(VideoPacket {
            frame_number,
            width: frame.width(),
            height: frame.height(),
            rect_count: rects.len() as u32,
            data,
        })
    }
}

// ── ZstdCursorEncoder ────────────────────────────────────────────

/// Cursor-shape encoder with consecutive-duplicate suppression.
///
/// The pointer shape rarely changes between cycles, so the encoder hashes
/// each shape and reports `None` when it matches the one last sent —
/// the consumer already has it.
pub struct ZstdCursorEncoder {
    level: i32,
    last_shape: Option<blake3::Hash>,
}

impl ZstdCursorEncoder {
    pub fn new(level: i32) -> Self {
        Self {
            level: level.clamp(1, 19),
            last_shape: None,
        }
    }

    fn shape_hash(cursor: &MouseCursor) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&cursor.width().to_le_bytes());
        hasher.update(&cursor.height().to_le_bytes());
        let (hx, hy) = cursor.hotspot();
        hasher.update(&hx.to_le_bytes());
        hasher.update(&hy.to_le_bytes());
        hasher.update(cursor.data());
        hasher.finalize()
    }
}

impl CursorEncoder for ZstdCursorEncoder {
    fn encode(&mut self, cursor: &MouseCursor) -> Option<CursorShape> {
        let digest = Self::shape_hash(cursor);
        if self.last_shape == Some(digest) {
            return None;
        }

        let data = match zstd::encode_all(cursor.data(), self.level) {
            Ok(data) => data,
            Err(e) => {
                warn!("zstd cursor encode failed: {e}");
                return None;
            }
        };

        self.last_shape = Some(digest);
        let (hotspot_x, hotspot_y) = cursor.hotspot();
        Some(CursorShape {
            width: cursor.width(),
            height: cursor.height(),
            hotspot_x,
            hotspot_y,
            data,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::frame::PixelFormat;

    fn dirty_frame(w: u32, h: u32, rects: &[Rect]) -> DesktopFrame {
        let mut frame = DesktopFrame::new(w, h, PixelFormat::Bgra8);
        frame.data_mut().fill(0xAB);
        for rect in rects {
            frame.dirty_region_mut().push(*rect);
        }
        frame
    }

    fn test_cursor(fill: u8) -> MouseCursor {
        MouseCursor::new(4, 4, 1, 1, vec![fill; 64])
    }

    #[test]
    fn encoding_identifier_parsing() {
        assert_eq!("zstd".parse::<VideoEncoding>().unwrap(), VideoEncoding::Zstd);
        assert_eq!("VP8".parse::<VideoEncoding>().unwrap(), VideoEncoding::Vp8);
        assert!(matches!(
            "h264".parse::<VideoEncoding>(),
            Err(VizorError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn unavailable_encoding_is_fatal_at_construction() {
        assert!(create_video_encoder(VideoEncoding::Zstd, 1).is_ok());
        assert!(matches!(
            create_video_encoder(VideoEncoding::Vp8, 1),
            Err(VizorError::UnsupportedEncoding(_))
        ));
        assert!(matches!(
            create_video_encoder(VideoEncoding::Vp9, 1),
            Err(VizorError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn clean_frame_produces_no_packet() {
        let frame = dirty_frame(64, 64, &[]);
        let mut encoder = ZstdVideoEncoder::new(1);
        assert!(encoder.encode(&frame).is_none());
        assert_eq!(encoder.frame_count(), 0);
    }

    #[test]
    fn dirty_frame_compresses() {
        let frame = dirty_frame(64, 64, &[Rect::new(0, 0, 64, 64)]);
        let mut encoder = ZstdVideoEncoder::new(1);
        let packet = encoder.encode(&frame).unwrap();

        assert_eq!(packet.rect_count, 1);
        assert_eq!(packet.frame_number, 0);
        // Repetitive pixel data compresses well below the raw size.
        assert!(packet.data.len() < frame.data().len());
        assert_eq!(encoder.frame_count(), 1);
    }

    #[test]
    fn frame_numbers_are_sequential() {
        let frame = dirty_frame(32, 32, &[Rect::new(0, 0, 32, 32)]);
        let mut encoder = ZstdVideoEncoder::new(1);
        assert_eq!(encoder.encode(&frame).unwrap().frame_number, 0);
        assert_eq!(encoder.encode(&frame).unwrap().frame_number, 1);
    }

    #[test]
    fn video_packet_roundtrip() {
        let packet = VideoPacket {
            frame_number: 7,
            width: 1920,
            height: 1080,
            rect_count: 3,
            data: vec![1, 2, 3, 4],
        };
        let bytes = packet.to_bytes().unwrap();
        assert_eq!(VideoPacket::from_bytes(&bytes).unwrap(), packet);
    }

    #[test]
    fn cursor_shape_roundtrip() {
        let shape = CursorShape {
            width: 32,
            height: 32,
            hotspot_x: 4,
            hotspot_y: 2,
            data: vec![9; 16],
        };
        let bytes = shape.to_bytes().unwrap();
        assert_eq!(CursorShape::from_bytes(&bytes).unwrap(), shape);
    }

    #[test]
    fn identical_consecutive_cursor_is_suppressed() {
        let mut encoder = ZstdCursorEncoder::new(1);
        assert!(encoder.encode(&test_cursor(0x11)).is_some());
        assert!(encoder.encode(&test_cursor(0x11)).is_none());
        // A different shape goes through again.
        assert!(encoder.encode(&test_cursor(0x22)).is_some());
        assert!(encoder.encode(&test_cursor(0x11)).is_some());
    }

    #[test]
    fn cursor_shape_carries_hotspot() {
        let mut encoder = ZstdCursorEncoder::new(1);
        let shape = encoder.encode(&test_cursor(0x33)).unwrap();
        assert_eq!((shape.hotspot_x, shape.hotspot_y), (1, 1));
        assert_eq!((shape.width, shape.height), (4, 4));
    }
}
