//! JPEG encoder wrapper

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
use image::ExtendedColorType;

use crate::error::CodecError;
use crate::video::frame::{Frame, PixelFormat};

/// JPEG encoder with reusable output buffer and statistics
pub struct JpegEncoder {
    quality: u8,
    /// Encoding buffer (reused to avoid allocations)
    encode_buffer: Vec<u8>,
    /// Frame counter for statistics
    frames_encoded: u64,
    /// Total bytes produced
    bytes_produced: u64,
}

impl JpegEncoder {
    /// Create an encoder; quality is clamped to 1..=100
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            encode_buffer: Vec::with_capacity(256 * 1024),
            frames_encoded: 0,
            bytes_produced: 0,
        }
    }
    
    /// Encode a frame
    ///
    /// Any colour layout is accepted and converted to RGB first; Gray8 is
    /// encoded as luma.
    pub fn encode(&mut self, frame: &Frame) -> Result<Bytes, CodecError> {
        let converted;
        let (data, color) = match frame.format() {
            PixelFormat::Gray8 => (frame.data(), ExtendedColorType::L8),
            PixelFormat::Rgb8 => (frame.data(), ExtendedColorType::Rgb8),
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => {
                converted = frame.to_format(PixelFormat::Rgb8);
                (converted.data(), ExtendedColorType::Rgb8)
            }
        };
        
        self.encode_buffer.clear();
        ImageJpegEncoder::new_with_quality(&mut self.encode_buffer, self.quality)
            .encode(data, frame.width(), frame.height(), color)
            .map_err(|e| CodecError::EncodingFailed(e.to_string()))?;
        
        self.frames_encoded += 1;
        self.bytes_produced += self.encode_buffer.len() as u64;
        
        Ok(Bytes::copy_from_slice(&self.encode_buffer))
    }
    
    pub fn quality(&self) -> u8 {
        self.quality
    }
    
    /// Get statistics
    pub fn stats(&self) -> EncoderStats {
        EncoderStats {
            frames_encoded: self.frames_encoded,
            bytes_produced: self.bytes_produced,
            average_frame_size: if self.frames_encoded > 0 {
                self.bytes_produced as f32 / self.frames_encoded as f32
            } else {
                0.0
            },
        }
    }
    
    /// Reset statistics
    pub fn reset_stats(&mut self) {
        self.frames_encoded = 0;
        self.bytes_produced = 0;
    }
}

/// Encoder statistics
#[derive(Debug, Clone)]
pub struct EncoderStats {
    pub frames_encoded: u64,
    pub bytes_produced: u64,
    pub average_frame_size: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::frame::Color;
    
    #[test]
    fn test_encoding() {
        let mut encoder = JpegEncoder::new(80);
        let frame = Frame::filled(320, 240, PixelFormat::Rgb8, Color::new(30, 120, 200));
        
        let encoded = encoder.encode(&frame).unwrap();
        assert_eq!(&encoded[..2], &[0xFF, 0xD8]);
        assert!(encoded.len() < frame.data().len());
        assert_eq!(encoder.stats().frames_encoded, 1);
    }
    
    #[test]
    fn test_bgra_input() {
        let mut encoder = JpegEncoder::new(80);
        let frame = Frame::filled(64, 64, PixelFormat::Bgra8, Color::RED);
        assert!(encoder.encode(&frame).is_ok());
    }
    
    #[test]
    fn test_quality_clamped() {
        assert_eq!(JpegEncoder::new(0).quality(), 1);
        assert_eq!(JpegEncoder::new(250).quality(), 100);
    }
}
