//! Grid layout and composition

use crate::error::FrameError;
use crate::overlay::{mark_recording_grid, mark_recording_tile};
use crate::video::frame::{Frame, PixelFormat};

/// Rows and columns of the monitoring grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub rows: u32,
    pub cols: u32,
}

impl GridLayout {
    /// Tiles the grid can hold
    pub fn capacity(&self) -> usize {
        (self.rows * self.cols) as usize
    }
}

/// Layout for `n` visible sources
///
/// 0 or 1 → 1×1, 2 → 1×2, 3–4 → 2×2, 5 or more → 2×3. Anything past the
/// sixth source does not fit and is not shown.
pub fn layout_for(n: usize) -> GridLayout {
    let (rows, cols) = match n {
        0 | 1 => (1, 1),
        2 => (1, 2),
        3 | 4 => (2, 2),
        _ => (2, 3),
    };
    GridLayout { rows, cols }
}

/// Tile size for a grid whose first frame is `first`
///
/// A configured size wins; otherwise the first frame divided by
/// `downscale` (never below 1×1).
pub fn tile_size(first: &Frame, downscale: u32, fixed: Option<(u32, u32)>) -> (u32, u32) {
    if let Some((width, height)) = fixed {
        return (width.max(1), height.max(1));
    }
    let downscale = downscale.max(1);
    ((first.width() / downscale).max(1), (first.height() / downscale).max(1))
}

/// Compose frames row-major into an RGB grid
///
/// Each frame is scaled to `tile`; frames past the layout's capacity are
/// dropped. With `recording` set, tiles get a red border and tinted band
/// and the grid gets the `REC` badge.
pub fn compose_grid(frames: &[(&str, &Frame)], layout: GridLayout, tile: (u32, u32), recording: bool) -> Result<Frame, FrameError> {
    let (tile_w, tile_h) = tile;
    let mut grid = Frame::black(tile_w * layout.cols, tile_h * layout.rows);

    for (idx, (_, frame)) in frames.iter().take(layout.capacity()).enumerate() {
        let row = idx as u32 / layout.cols;
        let col = idx as u32 % layout.cols;

        let mut tile_frame = frame.resize(tile_w, tile_h)?.to_format(PixelFormat::Rgb8);
        if recording {
            mark_recording_tile(&mut tile_frame);
        }
        grid.blit(&tile_frame, col * tile_w, row * tile_h);
    }

    if recording {
        mark_recording_grid(&mut grid);
    }

    Ok(grid)
}
