//! Raster primitives shared by the overlay and the grid indicator

use crate::video::frame::{Color, Frame};

/// Blend a filled rectangle over the frame
///
/// `alpha` is the weight of `color`; the rectangle is clipped to the frame.
pub fn fill_rect_blend(frame: &mut Frame, x: i64, y: i64, width: u32, height: u32, color: Color, alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    let (x0, y0, x1, y1) = clip(frame, x, y, width, height);
    for py in y0..y1 {
        for px in x0..x1 {
            frame.blend_pixel(px, py, color, alpha);
        }
    }
}

/// Opaque filled rectangle
pub fn fill_rect(frame: &mut Frame, x: i64, y: i64, width: u32, height: u32, color: Color) {
    let (x0, y0, x1, y1) = clip(frame, x, y, width, height);
    for py in y0..y1 {
        for px in x0..x1 {
            frame.put_pixel(px, py, color);
        }
    }
}

/// Rectangle outline drawn inward from the given bounds
pub fn draw_rect_outline(frame: &mut Frame, x: i64, y: i64, width: u32, height: u32, color: Color, thickness: u32) {
    if width == 0 || height == 0 || thickness == 0 {
        return;
    }
    let t = thickness.min(width).min(height);
    let right = x + width as i64 - t as i64;
    let bottom = y + height as i64 - t as i64;
    
    fill_rect(frame, x, y, width, t, color);
    fill_rect(frame, x, bottom, width, t, color);
    fill_rect(frame, x, y, t, height, color);
    fill_rect(frame, right, y, t, height, color);
}

/// Filled circle centred on (cx, cy)
pub fn fill_circle(frame: &mut Frame, cx: i64, cy: i64, radius: u32, color: Color) {
    let r = radius as i64;
    let r2 = r * r;
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy <= r2 {
                frame.put_pixel(cx + dx, cy + dy, color);
            }
        }
    }
}

/// Clip a rectangle to the frame, returning half-open bounds
fn clip(frame: &Frame, x: i64, y: i64, width: u32, height: u32) -> (i64, i64, i64, i64) {
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + width as i64).min(frame.width() as i64);
    let y1 = (y + height as i64).min(frame.height() as i64);
    (x0, y0, x1.max(x0), y1.max(y0))
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_blend_half() {
        let mut frame = Frame::filled(4, 4, crate::video::PixelFormat::Rgb8, Color::WHITE);
        fill_rect_blend(&mut frame, 0, 0, 2, 2, Color::BLACK, 0.5);
        assert_eq!(frame.pixel(0, 0), Color::new(128, 128, 128));
        assert_eq!(frame.pixel(3, 3), Color::WHITE);
    }
    
    #[test]
    fn test_outline_leaves_interior() {
        let mut frame = Frame::black(20, 20);
        draw_rect_outline(&mut frame, 0, 0, 20, 20, Color::RED, 3);
        assert_eq!(frame.pixel(0, 0), Color::RED);
        assert_eq!(frame.pixel(19, 10), Color::RED);
        assert_eq!(frame.pixel(10, 17), Color::RED);
        assert_eq!(frame.pixel(10, 10), Color::BLACK);
        assert_eq!(frame.pixel(3, 3), Color::BLACK);
    }
    
    #[test]
    fn test_shapes_clip_at_edges() {
        let mut frame = Frame::black(10, 10);
        fill_circle(&mut frame, 0, 0, 4, Color::RED);
        fill_rect(&mut frame, -5, 8, 100, 100, Color::WHITE);
        assert_eq!(frame.pixel(0, 0), Color::RED);
        assert_eq!(frame.pixel(9, 9), Color::WHITE);
        assert_eq!(frame.pixel(9, 0), Color::BLACK);
    }
}
