//! Application configuration
//!
//! The `network`, `recording` and `display` sections are defaulted field
//! by field. A tool section (`transmitter`, `saver`) falls back to its
//! preset when absent; when present, its `camera` and `timecode` tables
//! must be given in full. Lookup order: explicit path, then `config.toml`
//! in the platform config directory, then built-in defaults.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Camera transmitter tool
    #[serde(default = "ToolConfig::transmitter")]
    pub transmitter: ToolConfig,

    /// Local saver tool
    #[serde(default = "ToolConfig::saver")]
    pub saver: ToolConfig,

    /// LAN video transport
    #[serde(default)]
    pub network: NetworkConfig,

    /// Multi-camera recording
    #[serde(default)]
    pub recording: RecordingConfig,

    /// Preview and grid display
    #[serde(default)]
    pub display: DisplayConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            transmitter: ToolConfig::transmitter(),
            saver: ToolConfig::saver(),
            network: NetworkConfig::default(),
            recording: RecordingConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or from the default location when `None`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    tracing::debug!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let text = std::fs::read_to_string(&path)?;
        let config = Self::from_toml(&text)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse a TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no device can honour
    pub fn validate(&self) -> Result<()> {
        self.transmitter.camera.validate().map_err(|e| Error::Config(format!("transmitter.camera: {}", e)))?;
        self.saver.camera.validate().map_err(|e| Error::Config(format!("saver.camera: {}", e)))?;
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Write to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// `config.toml` inside the platform config directory
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Settings for a single-camera tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolConfig {
    pub camera: CameraConfig,
    pub timecode: TimecodeConfig,
}

impl ToolConfig {
    /// Transmitter preset: 60 fps, first OSC argument on `/timecode` via multicast
    pub fn transmitter() -> Self {
        Self {
            camera: CameraConfig::default(),
            timecode: TimecodeConfig::transmitter(),
        }
    }

    /// Saver preset: 30 fps, five-field clock on `/asil/clock`
    pub fn saver() -> Self {
        Self {
            camera: CameraConfig {
                fps: SAVER_FPS,
                ..CameraConfig::default()
            },
            timecode: TimecodeConfig::saver(),
        }
    }
}

/// Where frames come from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CameraBackend {
    /// Platform camera API (needs the `webcam` feature)
    Native,
    /// Built-in color bar generator
    TestPattern,
}

impl Default for CameraBackend {
    fn default() -> Self {
        if cfg!(feature = "webcam") {
            CameraBackend::Native
        } else {
            CameraBackend::TestPattern
        }
    }
}

/// Capture request sent to the camera
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CameraConfig {
    #[serde(default)]
    pub backend: CameraBackend,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Number of device indices probed during enumeration
    #[serde(default = "default_max_devices")]
    pub max_devices: u32,
}

fn default_max_devices() -> u32 {
    10
}

impl CameraConfig {
    /// Width, height and fps must all be non-zero
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("invalid capture size {}x{}", self.width, self.height));
        }
        if self.fps == 0 {
            return Err("fps must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            backend: CameraBackend::default(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fps: DEFAULT_FPS,
            max_devices: default_max_devices(),
        }
    }
}

/// How many OSC arguments make up the displayed timecode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "count")]
pub enum TimecodeFields {
    /// Only the first argument, as-is
    First,
    /// Up to `n` arguments rendered as `(a, b, ...)`
    Tuple(usize),
}

/// OSC timecode listener settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimecodeConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: Ipv4Addr,
    pub port: u16,
    /// Multicast group to join, if any
    pub multicast_group: Option<Ipv4Addr>,
    /// OSC address carrying the clock
    pub osc_address: String,
    /// Receive timeout; bounds how long `stop` waits
    #[serde(default = "default_timecode_read_timeout_ms")]
    pub read_timeout_ms: u64,
    pub fields: TimecodeFields,
}

fn default_bind_address() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

fn default_timecode_read_timeout_ms() -> u64 {
    200
}

impl TimecodeConfig {
    pub fn transmitter() -> Self {
        Self {
            bind_address: Ipv4Addr::UNSPECIFIED,
            port: TRANSMITTER_TIMECODE_PORT,
            multicast_group: Some(TIMECODE_MULTICAST_GROUP),
            osc_address: "/timecode".to_string(),
            read_timeout_ms: default_timecode_read_timeout_ms(),
            fields: TimecodeFields::First,
        }
    }

    pub fn saver() -> Self {
        Self {
            bind_address: Ipv4Addr::UNSPECIFIED,
            port: SAVER_TIMECODE_PORT,
            multicast_group: None,
            osc_address: "/asil/clock".to_string(),
            read_timeout_ms: default_timecode_read_timeout_ms(),
            fields: TimecodeFields::Tuple(5),
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// LAN video transport settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Interface address for all transport sockets
    pub bind_address: Ipv4Addr,
    /// Where publishers announce themselves (multicast or unicast)
    pub discovery_addr: SocketAddrV4,
    /// Publisher port; 0 picks an ephemeral port
    pub video_port: u16,
    pub jpeg_quality: u8,
    pub max_packet_size: usize,
    pub recv_buffer_size: usize,
    pub send_buffer_size: usize,
    pub announce_interval_ms: u64,
    /// Discovered sources not heard from for this long are hidden
    pub source_expiry_ms: u64,
    pub subscribe_interval_ms: u64,
    pub subscriber_timeout_ms: u64,
    /// Finder polls before a source is declared missing
    pub connect_attempts: u32,
    pub connect_interval_ms: u64,
    /// Bounded wait per frame read
    pub read_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: Ipv4Addr::UNSPECIFIED,
            discovery_addr: SocketAddrV4::new(DISCOVERY_MULTICAST_GROUP, DISCOVERY_PORT),
            video_port: 0,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            max_packet_size: MAX_PACKET_SIZE,
            recv_buffer_size: 4 * 1024 * 1024,
            send_buffer_size: 4 * 1024 * 1024,
            announce_interval_ms: 1000,
            source_expiry_ms: 5000,
            subscribe_interval_ms: 1000,
            subscriber_timeout_ms: 5000,
            connect_attempts: 20,
            connect_interval_ms: 500,
            read_timeout_ms: 100,
        }
    }
}

impl NetworkConfig {
    pub fn announce_interval(&self) -> Duration {
        Duration::from_millis(self.announce_interval_ms)
    }

    pub fn source_expiry(&self) -> Duration {
        Duration::from_millis(self.source_expiry_ms)
    }

    pub fn subscribe_interval(&self) -> Duration {
        Duration::from_millis(self.subscribe_interval_ms)
    }

    pub fn subscriber_timeout(&self) -> Duration {
        Duration::from_millis(self.subscriber_timeout_ms)
    }

    pub fn connect_interval(&self) -> Duration {
        Duration::from_millis(self.connect_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// File recording settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecordingConfig {
    /// Parent of the per-session directories
    pub root_dir: PathBuf,
    /// Fixed output frame rate, independent of arrival rate
    pub fps: u32,
    pub ffmpeg_path: String,
    pub codec: String,
    pub crf: u8,
    pub container: String,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("recordings"),
            fps: RECORDING_FPS,
            ffmpeg_path: "ffmpeg".to_string(),
            codec: "libx264".to_string(),
            crf: 18,
            container: "mp4".to_string(),
        }
    }
}

/// Display settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    /// Open a native window; headless when off or not compiled in
    pub window: bool,
    pub grid_title: String,
    /// Grid tiles are the first frame's size divided by this
    pub downscale: u32,
    /// Fixed tile size; overrides the first-frame rule when set
    pub tile_size: Option<(u32, u32)>,
    pub preview_width: u32,
    pub preview_height: u32,
    /// Wait per loop iteration; doubles as the command poll
    pub refresh_ms: u64,
    /// Bounded join for acquisition threads at shutdown
    pub stop_timeout_ms: u64,
    /// Pause between connecting sources and entering the loop
    pub stabilize_ms: u64,
    /// Log stats every this many frames in single-camera tools
    pub stats_interval_frames: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            window: cfg!(feature = "window"),
            grid_title: "Multi-Camera Receiver".to_string(),
            downscale: GRID_DOWNSCALE,
            tile_size: None,
            preview_width: PREVIEW_WIDTH,
            preview_height: PREVIEW_HEIGHT,
            refresh_ms: 1,
            stop_timeout_ms: 2000,
            stabilize_ms: 1000,
            stats_interval_frames: 60,
        }
    }
}

impl DisplayConfig {
    pub fn refresh(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn stabilize(&self) -> Duration {
        Duration::from_millis(self.stabilize_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_presets() {
        let config = AppConfig::default();
        assert_eq!(config.transmitter.timecode.port, 6667);
        assert_eq!(config.transmitter.timecode.osc_address, "/timecode");
        assert_eq!(config.transmitter.timecode.multicast_group, Some(Ipv4Addr::new(239, 255, 0, 1)));
        assert_eq!(config.transmitter.camera.fps, 60);

        assert_eq!(config.saver.timecode.port, 6575);
        assert_eq!(config.saver.timecode.fields, TimecodeFields::Tuple(5));
        assert_eq!(config.saver.camera.fps, 30);

        assert_eq!(config.network.connect_attempts, 20);
        assert_eq!(config.display.downscale, 2);
        assert!(config.display.tile_size.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let text = r#"
            [network]
            jpeg_quality = 60

            [display]
            tile_size = [320, 180]

            [saver.camera]
            width = 640
            height = 480
            fps = 25

            [saver.timecode]
            port = 7000
            osc_address = "/clock"
            fields = { kind = "tuple", count = 3 }
        "#;
        let config = AppConfig::from_toml(text).unwrap();
        assert_eq!(config.network.jpeg_quality, 60);
        assert_eq!(config.network.connect_attempts, 20);
        assert_eq!(config.display.tile_size, Some((320, 180)));
        assert_eq!(config.saver.camera.fps, 25);
        assert_eq!(config.saver.camera.max_devices, 10);
        assert_eq!(config.saver.timecode.port, 7000);
        assert_eq!(config.saver.timecode.multicast_group, None);
        assert_eq!(config.saver.timecode.fields, TimecodeFields::Tuple(3));
        assert_eq!(config.saver.timecode.read_timeout_ms, 200);
        // Untouched tool keeps its preset
        assert_eq!(config.transmitter, ToolConfig::transmitter());
        assert_eq!(config.recording.fps, 60);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.recording.root_dir = PathBuf::from("/tmp/takes");
        config.transmitter.timecode.fields = TimecodeFields::Tuple(3);
        config.save(&path).unwrap();

        let loaded = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_incomplete_tool_table_is_rejected() {
        let text = r#"
            [saver.timecode]
            port = 7000
        "#;
        assert!(AppConfig::from_toml(text).is_err());
    }

    #[test]
    fn test_native_devices_by_default() {
        let config = AppConfig::default();
        assert_eq!(
            config.transmitter.camera.backend == CameraBackend::Native,
            cfg!(feature = "webcam")
        );
        assert_eq!(config.display.window, cfg!(feature = "window"));
    }

    #[test]
    fn test_test_pattern_and_headless_opt_out() {
        let text = r#"
            [display]
            window = false

            [transmitter.camera]
            backend = "test-pattern"
            width = 640
            height = 360
            fps = 30

            [transmitter.timecode]
            port = 6667
            osc_address = "/timecode"
            fields = { kind = "first" }
        "#;
        let config = AppConfig::from_toml(text).unwrap();
        assert_eq!(config.transmitter.camera.backend, CameraBackend::TestPattern);
        assert!(!config.display.window);
    }

    #[test]
    fn test_zero_capture_size_rejected() {
        let text = r#"
            [saver.camera]
            width = 0
            height = 480
            fps = 25

            [saver.timecode]
            port = 7000
            osc_address = "/clock"
            fields = { kind = "first" }
        "#;
        let err = AppConfig::from_toml(text).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("saver.camera")));

        let camera = CameraConfig {
            fps: 0,
            ..CameraConfig::default()
        };
        assert!(camera.validate().is_err());
        assert!(CameraConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = AppConfig::from_toml("[network\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
