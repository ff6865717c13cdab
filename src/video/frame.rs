//! Pixel buffers passed between sources, overlay, compositor and sinks

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, Pixel, Rgb, Rgba};
use serde::{Deserialize, Serialize};

use crate::error::FrameError;

/// Channel layout of a frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 8-bit luma
    Gray8,
    /// Packed R, G, B
    Rgb8,
    /// Packed R, G, B, A
    Rgba8,
    /// Packed B, G, R, A (network video layout)
    Bgra8,
}

impl PixelFormat {
    /// Bytes per pixel
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
        }
    }
    
    /// Name understood by ffmpeg's `-pix_fmt`
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            PixelFormat::Gray8 => "gray",
            PixelFormat::Rgb8 => "rgb24",
            PixelFormat::Rgba8 => "rgba",
            PixelFormat::Bgra8 => "bgra",
        }
    }
}

/// 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);
    pub const RED: Color = Color::new(255, 0, 0);
    pub const DARK_RED: Color = Color::new(180, 0, 0);
    pub const YELLOW: Color = Color::new(255, 255, 0);
    
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
    
    /// Largest per-channel difference to `other`
    pub fn distance(&self, other: &Color) -> u8 {
        self.r
            .abs_diff(other.r)
            .max(self.g.abs_diff(other.g))
            .max(self.b.abs_diff(other.b))
    }
    
    /// Pack as 0RGB for window buffers
    pub fn to_u32(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }
}

/// Read one pixel from a packed slice
#[inline]
fn read_color(format: PixelFormat, px: &[u8]) -> Color {
    match format {
        PixelFormat::Gray8 => Color::new(px[0], px[0], px[0]),
        PixelFormat::Rgb8 | PixelFormat::Rgba8 => Color::new(px[0], px[1], px[2]),
        PixelFormat::Bgra8 => Color::new(px[2], px[1], px[0]),
    }
}

/// Write one pixel into a packed slice; alpha is forced opaque
#[inline]
fn write_color(format: PixelFormat, px: &mut [u8], color: Color) {
    match format {
        PixelFormat::Gray8 => {
            let luma = (color.r as u32 * 299 + color.g as u32 * 587 + color.b as u32 * 114) / 1000;
            px[0] = luma as u8;
        }
        PixelFormat::Rgb8 => {
            px[0] = color.r;
            px[1] = color.g;
            px[2] = color.b;
        }
        PixelFormat::Rgba8 => {
            px[0] = color.r;
            px[1] = color.g;
            px[2] = color.b;
            px[3] = 255;
        }
        PixelFormat::Bgra8 => {
            px[0] = color.b;
            px[1] = color.g;
            px[2] = color.r;
            px[3] = 255;
        }
    }
}

#[inline]
fn mix(dst: u8, src: u8, alpha: f32) -> u8 {
    (src as f32 * alpha + dst as f32 * (1.0 - alpha)).round() as u8
}

/// A fixed-resolution video frame
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
    /// Capture timestamp in microseconds (source clock)
    timestamp_us: u64,
}

impl Frame {
    /// Wrap a packed buffer, validating its length
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::InvalidDimensions(width, height));
        }
        
        let expected = width as usize * height as usize * format.channels();
        if data.len() != expected {
            return Err(FrameError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        
        Ok(Self {
            width,
            height,
            format,
            data,
            timestamp_us: 0,
        })
    }
    
    /// Frame filled with a single color
    pub fn filled(width: u32, height: u32, format: PixelFormat, color: Color) -> Self {
        let channels = format.channels();
        let mut data = vec![0u8; width as usize * height as usize * channels];
        for px in data.chunks_exact_mut(channels) {
            write_color(format, px, color);
        }
        Self {
            width,
            height,
            format,
            data,
            timestamp_us: 0,
        }
    }
    
    /// Black RGB canvas
    pub fn black(width: u32, height: u32) -> Self {
        Self::filled(width, height, PixelFormat::Rgb8, Color::BLACK)
    }
    
    pub fn with_timestamp(mut self, timestamp_us: u64) -> Self {
        self.timestamp_us = timestamp_us;
        self
    }
    
    pub fn width(&self) -> u32 {
        self.width
    }
    
    pub fn height(&self) -> u32 {
        self.height
    }
    
    pub fn format(&self) -> PixelFormat {
        self.format
    }
    
    pub fn timestamp_us(&self) -> u64 {
        self.timestamp_us
    }
    
    pub fn data(&self) -> &[u8] {
        &self.data
    }
    
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
    
    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.channels()
    }
    
    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.format.channels()
    }
    
    /// Color at (x, y); panics when out of bounds
    pub fn pixel(&self, x: u32, y: u32) -> Color {
        assert!(x < self.width && y < self.height, "pixel ({}, {}) out of bounds", x, y);
        let offset = self.offset(x, y);
        read_color(self.format, &self.data[offset..offset + self.format.channels()])
    }
    
    /// Set (x, y) to `color`; out-of-bounds writes are ignored
    pub fn put_pixel(&mut self, x: i64, y: i64, color: Color) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let offset = self.offset(x as u32, y as u32);
        let channels = self.format.channels();
        write_color(self.format, &mut self.data[offset..offset + channels], color);
    }
    
    /// Blend `color` over (x, y) with opacity `alpha` in [0, 1]
    pub fn blend_pixel(&mut self, x: i64, y: i64, color: Color, alpha: f32) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let offset = self.offset(x as u32, y as u32);
        let channels = self.format.channels();
        let px = &mut self.data[offset..offset + channels];
        let current = read_color(self.format, px);
        let blended = Color::new(
            mix(current.r, color.r, alpha),
            mix(current.g, color.g, alpha),
            mix(current.b, color.b, alpha),
        );
        write_color(self.format, px, blended);
    }
    
    /// Convert to another channel layout
    pub fn to_format(&self, target: PixelFormat) -> Frame {
        if target == self.format {
            return self.clone();
        }
        
        let src_channels = self.format.channels();
        let dst_channels = target.channels();
        let mut data = vec![0u8; self.width as usize * self.height as usize * dst_channels];
        
        for (src, dst) in self
            .data
            .chunks_exact(src_channels)
            .zip(data.chunks_exact_mut(dst_channels))
        {
            write_color(target, dst, read_color(self.format, src));
        }
        
        Frame {
            width: self.width,
            height: self.height,
            format: target,
            data,
            timestamp_us: self.timestamp_us,
        }
    }
    
    /// Scale to `width` x `height` with bilinear filtering
    pub fn resize(&self, width: u32, height: u32) -> Result<Frame, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::InvalidDimensions(width, height));
        }
        if width == self.width && height == self.height {
            return Ok(self.clone());
        }
        
        let data = match self.format {
            PixelFormat::Gray8 => resize_raw::<Luma<u8>>(self, width, height)?,
            PixelFormat::Rgb8 => resize_raw::<Rgb<u8>>(self, width, height)?,
            // Filtering is per channel, so BGRA can ride through as RGBA
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => resize_raw::<Rgba<u8>>(self, width, height)?,
        };
        
        Ok(Frame {
            width,
            height,
            format: self.format,
            data,
            timestamp_us: self.timestamp_us,
        })
    }
    
    /// Copy `src` into this frame with its top-left corner at (x, y)
    ///
    /// `src` is converted to this frame's layout; parts falling outside
    /// are clipped.
    pub fn blit(&mut self, src: &Frame, x: u32, y: u32) {
        if x >= self.width || y >= self.height {
            return;
        }
        
        let converted;
        let src = if src.format == self.format {
            src
        } else {
            converted = src.to_format(self.format);
            &converted
        };
        
        let copy_w = src.width.min(self.width - x) as usize;
        let copy_h = src.height.min(self.height - y);
        let row_bytes = copy_w * self.format.channels();
        
        for row in 0..copy_h {
            let src_start = src.offset(0, row);
            let dst_start = self.offset(x, y + row);
            self.data[dst_start..dst_start + row_bytes]
                .copy_from_slice(&src.data[src_start..src_start + row_bytes]);
        }
    }
}

fn resize_raw<P>(frame: &Frame, width: u32, height: u32) -> Result<Vec<u8>, FrameError>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let expected = frame.data.len();
    let buffer: ImageBuffer<P, Vec<u8>> = ImageBuffer::from_raw(frame.width, frame.height, frame.data.clone())
        .ok_or(FrameError::SizeMismatch {
            expected,
            actual: frame.data.len(),
        })?;
    Ok(imageops::resize(&buffer, width, height, FilterType::Triangle).into_raw())
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("timestamp_us", &self.timestamp_us)
            .finish()
    }
}
