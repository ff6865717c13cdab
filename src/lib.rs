//! # LAN Camera Relay
//!
//! Webcam capture with OSC timecode overlay, streamed over the LAN and
//! monitored/recorded on a multi-camera receiver.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────── TRANSMITTER PC ─────────────────────────────┐
//! │  ┌─────────────┐      ┌──────────────────┐      ┌─────────────────────┐     │
//! │  │   Camera    │─────▶│ Overlay          │─────▶│ VideoSender         │     │
//! │  │ (grab loop) │      │ name + TC band   │      │ JPEG → UDP chunks   │     │
//! │  └─────────────┘      └────────▲─────────┘      └──────────┬──────────┘     │
//! │                                │                           │ announce       │
//! │                       ┌────────┴─────────┐                 │                │
//! │                       │ TimecodeListener │◀── OSC/UDP ─────┼── timecode     │
//! │                       │ (latest string)  │   (multicast)   │   master       │
//! │                       └──────────────────┘                 │                │
//! └────────────────────────────────────────────────────────────┼────────────────┘
//!                                                              │ UDP over LAN
//! ┌──────────────────────────────── RECEIVER PC ───────────────┼────────────────┐
//! │  ┌──────────────┐   subscribe    ┌─────────────────────────▼──────────┐     │
//! │  │ SourceFinder │───────────────▶│ FrameSource per name                │     │
//! │  └──────────────┘                │ acquisition thread → latest frame   │     │
//! │                                  └─────────────────┬───────────────────┘     │
//! │                                                    │ get_latest()            │
//! │  ┌─────────────────────────────────────────────────▼──────────────────┐      │
//! │  │ CompositorLoop: poll → record raw → grid (1x1/1x2/2x2/2x3) → show  │      │
//! │  │ keys: r = toggle recording, s = stats, q = quit                    │      │
//! │  └─────────────────────────────────┬──────────────────────────────────┘      │
//! │                                    ▼                                         │
//! │                  recordings/<timestamp>/<name>.mp4 (ffmpeg)                  │
//! └──────────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod capture_loop;
pub mod codec;
pub mod compositor;
pub mod config;
pub mod console;
pub mod display;
pub mod error;
pub mod network;
pub mod overlay;
pub mod protocol;
pub mod recording;
pub mod sync;
pub mod timecode;
pub mod video;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    use std::net::Ipv4Addr;

    /// Name used for the platform config directory
    pub const APP_NAME: &str = "lan-camera-relay";

    /// Requested capture width
    pub const DEFAULT_WIDTH: u32 = 1280;

    /// Requested capture height
    pub const DEFAULT_HEIGHT: u32 = 720;

    /// Requested capture rate for the transmitter
    pub const DEFAULT_FPS: u32 = 60;

    /// Requested capture rate for the local saver
    pub const SAVER_FPS: u32 = 30;

    /// Fixed frame rate of receiver recordings
    pub const RECORDING_FPS: u32 = 60;

    /// Timecode shown before any OSC packet arrives
    pub const TIMECODE_SENTINEL: &str = "00:00:00:00:0";

    /// OSC timecode port for the transmitter
    pub const TRANSMITTER_TIMECODE_PORT: u16 = 6667;

    /// OSC timecode port for the local saver
    pub const SAVER_TIMECODE_PORT: u16 = 6575;

    /// Multicast group carrying OSC timecode
    pub const TIMECODE_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 0, 1);

    /// Multicast group for source announcements
    pub const DISCOVERY_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 0, 2);

    /// Port for source announcements
    pub const DISCOVERY_PORT: u16 = 5960;

    /// Maximum packet size for UDP
    pub const MAX_PACKET_SIZE: usize = 1472; // MTU - IP/UDP headers

    /// JPEG quality for the LAN transport
    pub const DEFAULT_JPEG_QUALITY: u8 = 80;

    /// Grid tiles are source frames divided by this
    pub const GRID_DOWNSCALE: u32 = 2;

    /// Single-camera preview size
    pub const PREVIEW_WIDTH: u32 = 640;
    pub const PREVIEW_HEIGHT: u32 = 360;
}
