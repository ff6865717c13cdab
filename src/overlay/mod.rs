//! Text overlays stamped onto frames
//!
//! [`render_overlay`] is the camera-side banner (name, optional fps and
//! timecode over a darkened band). The recording indicators used by the
//! grid live here too so both share the same primitives.

pub mod draw;
pub mod text;

pub use draw::{draw_rect_outline, fill_circle, fill_rect, fill_rect_blend};
pub use text::{draw_text, text_width};

use crate::error::FrameError;
use crate::video::frame::{Color, Frame, PixelFormat};

/// Height of the darkened banner
pub const BAND_HEIGHT: u32 = 80;

/// Opacity of the banner
pub const BAND_ALPHA: f32 = 0.6;

const NAME_POS: (i64, i64) = (10, 10);
const NAME_SCALE: u32 = 3;
const FPS_POS: (i64, i64) = (600, 10);
const TIMECODE_POS: (i64, i64) = (10, 50);
const TIMECODE_SCALE: u32 = 2;

/// Stamp name, timecode and optional fps onto a copy of `frame`
///
/// The input is never modified. Output keeps the input's size and layout.
pub fn render_overlay(frame: &Frame, name: &str, timecode: &str, fps: Option<f64>) -> Result<Frame, FrameError> {
    if frame.format() == PixelFormat::Gray8 {
        return Err(FrameError::UnsupportedFormat(PixelFormat::Gray8));
    }
    
    let mut out = frame.clone();
    let band_width = out.width();
    fill_rect_blend(&mut out, 0, 0, band_width, BAND_HEIGHT, Color::BLACK, BAND_ALPHA);
    
    draw_text(&mut out, name, NAME_POS.0, NAME_POS.1, NAME_SCALE, Color::YELLOW);
    if let Some(fps) = fps {
        let label = format!("FPS: {}", fps.round() as i64);
        draw_text(&mut out, &label, FPS_POS.0, FPS_POS.1, NAME_SCALE, Color::YELLOW);
    }
    draw_text(
        &mut out,
        &format!("TC: {}", timecode),
        TIMECODE_POS.0,
        TIMECODE_POS.1,
        TIMECODE_SCALE,
        Color::WHITE,
    );
    
    Ok(out)
}

/// Red border plus a tinted top band on a tile that is being recorded
pub fn mark_recording_tile(tile: &mut Frame) {
    let (width, height) = (tile.width(), tile.height());
    let thickness = (width.min(height) / 40).max(2);
    draw_rect_outline(tile, 0, 0, width, height, Color::RED, thickness);
    let band = (height / 7).max(1);
    fill_rect_blend(tile, 0, 0, width, band, Color::DARK_RED, 0.7);
}

/// Red dot and `REC` label in the grid's top-left corner
pub fn mark_recording_grid(grid: &mut Frame) {
    fill_circle(grid, 40, 40, 20, Color::RED);
    draw_text(grid, "REC", 70, 28, 3, Color::RED);
}
