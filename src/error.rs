//! Error types for the camera relay

use thiserror::Error;

use crate::video::frame::PixelFormat;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Display error: {0}")]
    Display(#[from] DisplayError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Video source errors
#[derive(Error, Debug)]
pub enum SourceError {
    /// Network source did not appear within the connect window
    #[error("Source not found: {0}")]
    NotFound(String),

    #[error("Failed to open device: {0}")]
    DeviceOpen(String),

    /// Another active source already uses this name
    #[error("Duplicate source name: {0}")]
    Duplicate(String),

    /// A single bad read; the acquisition loop retries
    #[error("Failed to read frame: {0}")]
    DeviceRead(String),

    #[error("Failed to spawn acquisition thread: {0}")]
    Spawn(String),
}

/// Pixel buffer errors
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Buffer size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Unsupported pixel format: {0:?}")]
    UnsupportedFormat(PixelFormat),

    #[error("Invalid dimensions: {0}x{1}")]
    InvalidDimensions(u32, u32),
}

/// Still-image codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
}

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Transport could not be brought up; fatal at startup
    #[error("Transport initialization failed: {0}")]
    Init(String),

    #[error("Socket bind failed: {0}")]
    BindFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Packet too large: {0} bytes")]
    PacketTooLarge(usize),

    #[error("Invalid packet format")]
    InvalidPacket,

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Recording errors
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Failed to create output directory {0}: {1}")]
    CreateDir(String, String),

    #[error("Failed to start writer: {0}")]
    WriterSpawn(String),

    #[error("Failed to write frame: {0}")]
    WriteFailed(String),

    #[error("Failed to finalize recording: {0}")]
    FinalizeFailed(String),

    #[error("Frame does not match writer: expected {expected_width}x{expected_height}, got {width}x{height}")]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },
}

/// Display errors
#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("Failed to create window: {0}")]
    WindowCreate(String),

    #[error("Failed to update window: {0}")]
    Update(String),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
