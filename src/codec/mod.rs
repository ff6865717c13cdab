//! JPEG still-image codec for the LAN video transport
//!
//! Each video frame is compressed independently so a lost packet costs at
//! most one frame.

pub mod decoder;
pub mod encoder;

pub use decoder::{DecoderStats, JpegDecoder};
pub use encoder::{EncoderStats, JpegEncoder};
