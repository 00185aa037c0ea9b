//! Block-level differencing between consecutive frames.
//!
//! Divides the frame into `BLOCK_SIZE × BLOCK_SIZE` tiles, compares each
//! tile byte-for-byte against the previous frame, and merges adjacent
//! changed tiles into larger rectangles. The result is a conservative
//! cover: every changed pixel lies inside some rectangle, rectangles never
//! overlap, and unchanged pixels may be included at tile granularity.

use crate::desktop::frame::DesktopFrame;
use crate::desktop::region::{Rect, Region};

/// Tile edge length in pixels.
///
/// Small enough to skip unchanged desktop areas, large enough that the
/// per-tile bookkeeping stays negligible next to the row memcmp.
pub const BLOCK_SIZE: usize = 32;

// Block grid cell states.
const CLEAN: u8 = 0;
const DIRTY: u8 = 1;
const MERGED: u8 = 2;

// ── Differ ───────────────────────────────────────────────────────

/// Computes the dirty region between two same-sized frames.
///
/// Owns a scratch block grid sized to the frame at construction; the
/// capturer recreates the differ whenever the capture bounds change.
pub struct Differ {
    width: usize,
    height: usize,
    blocks_x: usize,
    blocks_y: usize,
    grid: Vec<u8>,
}

impl Differ {
    /// Create a differ for frames of the given dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        let width = width as usize;
        let height = height as usize;
        let blocks_x = width.div_ceil(BLOCK_SIZE);
        let blocks_y = height.div_ceil(BLOCK_SIZE);
        Self {
            width,
            height,
            blocks_x,
            blocks_y,
            grid: vec![CLEAN; blocks_x * blocks_y],
        }
    }

    /// Compare `previous` and `current` and return the changed region.
    ///
    /// Identical dimensions are a precondition: the frame ring guarantees
    /// both slots always match, so a mismatch here is a caller defect.
    pub fn calc_dirty_region(
        &mut self,
        previous: &DesktopFrame,
        current: &DesktopFrame,
    ) -> Region {
        debug_assert_eq!(previous.width(), current.width());
        debug_assert_eq!(previous.height(), current.height());
        debug_assert_eq!(current.width() as usize, self.width);
        debug_assert_eq!(current.height() as usize, self.height);

        self.mark_changed_blocks(previous, current);
        self.merge_blocks()
    }

    // ── Internal ─────────────────────────────────────────────────

    /// Pass 1: set a grid cell for every tile whose bytes differ.
    fn mark_changed_blocks(&mut self, previous: &DesktopFrame, current: &DesktopFrame) {
        let bpp = current.format().bytes_per_pixel();
        let stride = current.stride() as usize;
        let prev_data = previous.data();
        let curr_data = current.data();

        for by in 0..self.blocks_y {
            let start_y = by * BLOCK_SIZE;
            let end_y = (start_y + BLOCK_SIZE).min(self.height);

            for bx in 0..self.blocks_x {
                let start_x = bx * BLOCK_SIZE;
                let end_x = (start_x + BLOCK_SIZE).min(self.width);
                let left = start_x * bpp;
                let right = end_x * bpp;

                let mut differs = false;
                for y in start_y..end_y {
                    let row = y * stride;
                    if curr_data[row + left..row + right]
                        != prev_data[row + left..row + right]
                    {
                        differs = true;
                        break;
                    }
                }

                self.grid[by * self.blocks_x + bx] =
                    if differs { DIRTY } else { CLEAN };
            }
        }
    }

    /// Pass 2: greedily grow each dirty cell into a maximal rectangle.
    ///
    /// Extends right along the row first, then down while the entire span
    /// stays dirty. Consumed cells are marked so no rectangle is emitted
    /// twice, which keeps the output non-overlapping.
    fn merge_blocks(&mut self) -> Region {
        let mut region = Region::new();

        for by in 0..self.blocks_y {
            for bx in 0..self.blocks_x {
                if self.grid[by * self.blocks_x + bx] != DIRTY {
                    continue;
                }

                // Grow right.
                let mut span = 1;
                while bx + span < self.blocks_x
                    && self.grid[by * self.blocks_x + bx + span] == DIRTY
                {
                    span += 1;
                }

                // Grow down while the whole span is dirty.
                let mut rows = 1;
                'down: while by + rows < self.blocks_y {
                    let base = (by + rows) * self.blocks_x + bx;
                    for i in 0..span {
                        if self.grid[base + i] != DIRTY {
                            break 'down;
                        }
                    }
                    rows += 1;
                }

                // Consume the merged cells.
                for row in 0..rows {
                    let base = (by + row) * self.blocks_x + bx;
                    for i in 0..span {
                        self.grid[base + i] = MERGED;
                    }
                }

                let x = (bx * BLOCK_SIZE) as i32;
                let y = (by * BLOCK_SIZE) as i32;
                let width = ((bx + span) * BLOCK_SIZE).min(self.width) - bx * BLOCK_SIZE;
                let height = ((by + rows) * BLOCK_SIZE).min(self.height) - by * BLOCK_SIZE;
                region.push(Rect::new(x, y, width as u32, height as u32));
            }
        }

        region
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::frame::PixelFormat;

    fn make_frame(w: u32, h: u32, fill: u8) -> DesktopFrame {
        let mut frame = DesktopFrame::new(w, h, PixelFormat::Bgra8);
        frame.data_mut().fill(fill);
        frame
    }

    fn set_pixel(frame: &mut DesktopFrame, x: u32, y: u32, value: u8) {
        let stride = frame.stride() as usize;
        let offset = y as usize * stride + x as usize * 4;
        frame.data_mut()[offset..offset + 4].fill(value);
    }

    #[test]
    fn identical_frames_produce_empty_region() {
        let a = make_frame(128, 96, 0xAA);
        let b = make_frame(128, 96, 0xAA);
        let mut differ = Differ::new(128, 96);
        assert!(differ.calc_dirty_region(&a, &b).is_empty());
    }

    #[test]
    fn single_pixel_change_is_covered() {
        let prev = make_frame(128, 96, 0);
        let mut curr = make_frame(128, 96, 0);
        set_pixel(&mut curr, 70, 40, 0xFF);

        let mut differ = Differ::new(128, 96);
        let region = differ.calc_dirty_region(&prev, &curr);
        assert!(!region.is_empty());
        assert!(region.contains_point(70, 40));
    }

    #[test]
    fn rectangles_never_overlap() {
        let prev = make_frame(160, 160, 0);
        let mut curr = make_frame(160, 160, 0);
        // Scatter changes into an L-shaped pattern of tiles.
        set_pixel(&mut curr, 5, 5, 1);
        set_pixel(&mut curr, 40, 5, 2);
        set_pixel(&mut curr, 5, 40, 3);
        set_pixel(&mut curr, 130, 130, 4);

        let mut differ = Differ::new(160, 160);
        let region = differ.calc_dirty_region(&prev, &curr);
        let rects = region.rects();
        for (i, a) in rects.iter().enumerate() {
            for b in &rects[i + 1..] {
                assert!(!a.intersects(b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn adjacent_blocks_merge_into_one_rect() {
        let prev = make_frame(128, 64, 0);
        let mut curr = make_frame(128, 64, 0);
        // Dirty the full top tile row: 4 horizontally adjacent tiles.
        for x in 0..128 {
            set_pixel(&mut curr, x, 10, 0xFF);
        }

        let mut differ = Differ::new(128, 64);
        let region = differ.calc_dirty_region(&prev, &curr);
        assert_eq!(region.len(), 1);
        assert_eq!(region.rects()[0], Rect::new(0, 0, 128, 32));
    }

    #[test]
    fn edge_blocks_clip_to_frame_bounds() {
        // 100x50 is not a multiple of the tile size.
        let prev = make_frame(100, 50, 0);
        let mut curr = make_frame(100, 50, 0);
        set_pixel(&mut curr, 99, 49, 0xFF);

        let mut differ = Differ::new(100, 50);
        let region = differ.calc_dirty_region(&prev, &curr);
        assert!(region.contains_point(99, 49));
        for rect in region.rects() {
            assert!(rect.right() <= 100);
            assert!(rect.bottom() <= 50);
        }
    }

    #[test]
    fn full_frame_change_becomes_one_rect() {
        let prev = make_frame(128, 128, 0);
        let curr = make_frame(128, 128, 0xFF);
        let mut differ = Differ::new(128, 128);
        let region = differ.calc_dirty_region(&prev, &curr);
        assert_eq!(region.len(), 1);
        assert_eq!(region.rects()[0], Rect::new(0, 0, 128, 128));
    }
}
