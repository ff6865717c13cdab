//! JPEG decoder wrapper

use image::ImageFormat;

use crate::error::CodecError;
use crate::video::frame::{Frame, PixelFormat};

/// JPEG decoder producing RGB frames
#[derive(Default)]
pub struct JpegDecoder {
    /// Frames decoded
    frames_decoded: u64,
    /// Payloads that failed to decode
    frames_corrupt: u64,
}

impl JpegDecoder {
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Decode a JPEG payload into an RGB frame
    pub fn decode(&mut self, data: &[u8]) -> Result<Frame, CodecError> {
        let image = match image::load_from_memory_with_format(data, ImageFormat::Jpeg) {
            Ok(image) => image.to_rgb8(),
            Err(e) => {
                self.frames_corrupt += 1;
                return Err(CodecError::DecodingFailed(e.to_string()));
            }
        };
        
        let (width, height) = image.dimensions();
        let frame = Frame::new(width, height, PixelFormat::Rgb8, image.into_raw())?;
        self.frames_decoded += 1;
        Ok(frame)
    }
    
    /// Get statistics
    pub fn stats(&self) -> DecoderStats {
        DecoderStats {
            frames_decoded: self.frames_decoded,
            frames_corrupt: self.frames_corrupt,
        }
    }
}

/// Decoder statistics
#[derive(Debug, Clone)]
pub struct DecoderStats {
    pub frames_decoded: u64,
    pub frames_corrupt: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JpegEncoder;
    use crate::video::frame::Color;
    
    #[test]
    fn test_decode_encoded_frame() {
        let mut encoder = JpegEncoder::new(90);
        let mut decoder = JpegDecoder::new();
        let color = Color::new(40, 160, 90);
        let frame = Frame::filled(96, 64, PixelFormat::Rgb8, color);
        
        let decoded = decoder.decode(&encoder.encode(&frame).unwrap()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (96, 64));
        assert_eq!(decoded.format(), PixelFormat::Rgb8);
        // Lossy, but a flat field stays close
        assert!(decoded.pixel(48, 32).distance(&color) < 8);
    }
    
    #[test]
    fn test_corrupt_payload() {
        let mut decoder = JpegDecoder::new();
        assert!(decoder.decode(&[0xFF, 0xD8, 0x00, 0x01]).is_err());
        assert_eq!(decoder.stats().frames_corrupt, 1);
        assert_eq!(decoder.stats().frames_decoded, 0);
    }
}
