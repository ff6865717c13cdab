//! 8x8 bitmap text

use font8x8::{UnicodeFonts, BASIC_FONTS};

use crate::video::frame::{Color, Frame};

/// Glyph cell size before scaling
pub const GLYPH_SIZE: u32 = 8;

/// Draw `text` with its top-left corner at (x, y)
///
/// Each font pixel becomes a `scale` x `scale` block. Characters outside the
/// basic Latin set render as `?`. Returns the drawn width in pixels.
pub fn draw_text(frame: &mut Frame, text: &str, x: i64, y: i64, scale: u32, color: Color) -> u32 {
    let scale = scale.max(1);
    let mut cursor = x;
    
    for ch in text.chars() {
        let glyph = BASIC_FONTS
            .get(ch)
            .or_else(|| BASIC_FONTS.get('?'))
            .unwrap_or([0; 8]);
        
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_SIZE {
                if bits & (1 << col) == 0 {
                    continue;
                }
                let px = cursor + (col * scale) as i64;
                let py = y + (row as u32 * scale) as i64;
                for sy in 0..scale as i64 {
                    for sx in 0..scale as i64 {
                        frame.put_pixel(px + sx, py + sy, color);
                    }
                }
            }
        }
        cursor += (GLYPH_SIZE * scale) as i64;
    }
    
    text_width(text, scale)
}

/// Width `text` would take at `scale`
pub fn text_width(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * GLYPH_SIZE * scale.max(1)
}
