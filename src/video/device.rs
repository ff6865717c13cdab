//! Local camera enumeration and capture
//!
//! Native cameras go through `nokhwa` when the `webcam` feature is on.
//! The test-pattern device is always available and stands in for a camera
//! on machines without one.

use std::time::{Duration, Instant};

use crate::config::{CameraBackend, CameraConfig};
use crate::error::SourceError;
use crate::video::frame::{Color, Frame, PixelFormat};
use crate::video::source::FrameGrabber;

/// A camera found during enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    pub id: u32,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// List cameras for the configured backend
pub fn list_cameras(config: &CameraConfig) -> Vec<CameraInfo> {
    match config.backend {
        CameraBackend::TestPattern => vec![CameraInfo {
            id: 0,
            name: "Test Pattern".to_string(),
            width: config.width,
            height: config.height,
            fps: config.fps,
        }],
        CameraBackend::Native => native_cameras(config),
    }
}

/// Open camera `id` with the configured capture request
///
/// The negotiated format is logged; it is not required to match the request.
pub fn open_camera(id: u32, config: &CameraConfig) -> Result<Box<dyn FrameGrabber>, SourceError> {
    config
        .validate()
        .map_err(|e| SourceError::DeviceOpen(format!("camera {}: {}", id, e)))?;
    match config.backend {
        CameraBackend::TestPattern => {
            if id != 0 {
                return Err(SourceError::DeviceOpen(format!("no test pattern device {}", id)));
            }
            Ok(Box::new(TestPatternGrabber::bars(config.width, config.height, config.fps)))
        }
        CameraBackend::Native => open_native(id, config),
    }
}

#[cfg(feature = "webcam")]
fn native_cameras(config: &CameraConfig) -> Vec<CameraInfo> {
    native::list(config)
}

#[cfg(not(feature = "webcam"))]
fn native_cameras(_config: &CameraConfig) -> Vec<CameraInfo> {
    tracing::warn!("Native camera support not compiled in (enable the `webcam` feature)");
    Vec::new()
}

#[cfg(feature = "webcam")]
fn open_native(id: u32, config: &CameraConfig) -> Result<Box<dyn FrameGrabber>, SourceError> {
    Ok(Box::new(native::NativeCamera::open(id, config)?))
}

#[cfg(not(feature = "webcam"))]
fn open_native(id: u32, _config: &CameraConfig) -> Result<Box<dyn FrameGrabber>, SourceError> {
    Err(SourceError::DeviceOpen(format!(
        "camera {}: native camera support not compiled in",
        id
    )))
}

#[cfg(feature = "webcam")]
mod native {
    use nokhwa::pixel_format::RgbFormat;
    use nokhwa::utils::{
        ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    };
    use nokhwa::Camera;
    use std::time::Duration;

    use super::CameraInfo;
    use crate::config::CameraConfig;
    use crate::error::SourceError;
    use crate::video::frame::{Frame, PixelFormat};
    use crate::video::source::FrameGrabber;

    /// Enumerate cameras, opening each briefly to read its current format
    pub fn list(config: &CameraConfig) -> Vec<CameraInfo> {
        let devices = match nokhwa::query(ApiBackend::Auto) {
            Ok(devices) => devices,
            Err(e) => {
                tracing::warn!("Failed to enumerate cameras: {}", e);
                return Vec::new();
            }
        };
        
        devices
            .into_iter()
            .take(config.max_devices as usize)
            .enumerate()
            .filter_map(|(position, info)| {
                let id = match info.index() {
                    CameraIndex::Index(i) => *i,
                    CameraIndex::String(_) => position as u32,
                };
                
                let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
                match Camera::new(CameraIndex::Index(id), requested) {
                    Ok(camera) => {
                        let format = camera.camera_format();
                        Some(CameraInfo {
                            id,
                            name: info.human_name(),
                            width: format.width(),
                            height: format.height(),
                            fps: format.frame_rate(),
                        })
                    }
                    Err(e) => {
                        tracing::debug!("Skipping camera {}: {}", id, e);
                        None
                    }
                }
            })
            .collect()
    }
    
    /// Open platform camera
    pub struct NativeCamera {
        id: u32,
        camera: Camera,
    }
    
    impl NativeCamera {
        pub fn open(id: u32, config: &CameraConfig) -> Result<Self, SourceError> {
            let format = CameraFormat::new(
                Resolution::new(config.width, config.height),
                FrameFormat::MJPEG,
                config.fps,
            );
            let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));
            
            let mut camera = Camera::new(CameraIndex::Index(id), requested)
                .map_err(|e| SourceError::DeviceOpen(format!("camera {}: {}", id, e)))?;
            camera
                .open_stream()
                .map_err(|e| SourceError::DeviceOpen(format!("camera {}: {}", id, e)))?;
            
            let actual = camera.camera_format();
            tracing::info!(
                "Camera configured: {}x{} @ {}fps ({:?})",
                actual.width(),
                actual.height(),
                actual.frame_rate(),
                actual.format()
            );
            
            Ok(Self { id, camera })
        }
    }
    
    impl FrameGrabber for NativeCamera {
        // The platform read blocks until the next frame; at capture rates
        // this is well inside the caller's wait.
        fn grab(&mut self, _timeout: Duration) -> Result<Option<Frame>, SourceError> {
            let buffer = self
                .camera
                .frame()
                .map_err(|e| SourceError::DeviceRead(e.to_string()))?;
            let image = buffer
                .decode_image::<RgbFormat>()
                .map_err(|e| SourceError::DeviceRead(e.to_string()))?;
            
            let (width, height) = (image.width(), image.height());
            let frame = Frame::new(width, height, PixelFormat::Rgb8, image.into_raw())
                .map_err(|e| SourceError::DeviceRead(e.to_string()))?;
            Ok(Some(frame))
        }
        
        fn release(&mut self) {
            if let Err(e) = self.camera.stop_stream() {
                tracing::warn!("Failed to stop camera {}: {}", self.id, e);
            }
        }
        
        fn describe(&self) -> String {
            format!("camera {}", self.id)
        }
    }
}

/// What the test-pattern device draws
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// Seven vertical color bars with a sweeping white line
    Bars,
    /// A single flat color
    Solid(Color),
}

const BAR_COLORS: [Color; 7] = [
    Color::new(192, 192, 192),
    Color::new(192, 192, 0),
    Color::new(0, 192, 192),
    Color::new(0, 192, 0),
    Color::new(192, 0, 192),
    Color::new(192, 0, 0),
    Color::new(0, 0, 192),
];

/// Synthetic camera paced at a fixed frame rate
pub struct TestPatternGrabber {
    width: u32,
    height: u32,
    interval: Duration,
    pattern: Pattern,
    frame_index: u64,
    next_due: Instant,
    started: Instant,
}

impl TestPatternGrabber {
    /// Zero sizes are raised to one pixel
    pub fn new(width: u32, height: u32, fps: u32, pattern: Pattern) -> Self {
        let now = Instant::now();
        Self {
            width: width.max(1),
            height: height.max(1),
            interval: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            pattern,
            frame_index: 0,
            next_due: now,
            started: now,
        }
    }
    
    pub fn bars(width: u32, height: u32, fps: u32) -> Self {
        Self::new(width, height, fps, Pattern::Bars)
    }
    
    pub fn solid(width: u32, height: u32, fps: u32, color: Color) -> Self {
        Self::new(width, height, fps, Pattern::Solid(color))
    }
    
    fn render(&self) -> Frame {
        match self.pattern {
            Pattern::Solid(color) => Frame::filled(self.width, self.height, PixelFormat::Rgb8, color),
            Pattern::Bars => {
                let mut frame = Frame::black(self.width, self.height);
                let bar_width = (self.width as usize / BAR_COLORS.len()).max(1);
                let sweep = (self.frame_index * 4 % self.width as u64) as i64;
                
                for y in 0..self.height as i64 {
                    for x in 0..self.width as i64 {
                        let color = if x == sweep {
                            Color::WHITE
                        } else {
                            BAR_COLORS[(x as usize / bar_width).min(BAR_COLORS.len() - 1)]
                        };
                        frame.put_pixel(x, y, color);
                    }
                }
                frame
            }
        }
    }
}

impl FrameGrabber for TestPatternGrabber {
    fn grab(&mut self, timeout: Duration) -> Result<Option<Frame>, SourceError> {
        let now = Instant::now();
        if self.next_due > now + timeout {
            std::thread::sleep(timeout);
            return Ok(None);
        }
        if self.next_due > now {
            std::thread::sleep(self.next_due - now);
        }
        
        // Don't try to catch up after a stall
        self.next_due = (self.next_due + self.interval).max(Instant::now());
        self.frame_index += 1;
        
        let timestamp_us = self.started.elapsed().as_micros() as u64;
        Ok(Some(self.render().with_timestamp(timestamp_us)))
    }
    
    fn describe(&self) -> String {
        format!("test pattern {}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    fn test_pattern_config() -> CameraConfig {
        CameraConfig {
            backend: CameraBackend::TestPattern,
            width: 64,
            height: 36,
            fps: 30,
            max_devices: 10,
        }
    }
    
    #[test]
    fn test_list_test_pattern() {
        let cameras = list_cameras(&test_pattern_config());
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].id, 0);
        assert_eq!((cameras[0].width, cameras[0].height), (64, 36));
    }
    
    #[test]
    fn test_open_unknown_device_fails() {
        let result = open_camera(3, &test_pattern_config());
        assert!(matches!(result, Err(SourceError::DeviceOpen(_))));
    }
    
    #[test]
    fn test_bars_frame() {
        let mut camera = open_camera(0, &test_pattern_config()).unwrap();
        let frame = camera.grab(Duration::from_millis(100)).unwrap().unwrap();
        
        assert_eq!(frame.width(), 64);
        assert_eq!(frame.height(), 36);
        assert_eq!(frame.pixel(63, 10), Color::new(0, 0, 192));
    }
    
    #[test]
    fn test_zero_size_rejected_or_clamped() {
        let config = CameraConfig {
            width: 0,
            ..test_pattern_config()
        };
        assert!(matches!(open_camera(0, &config), Err(SourceError::DeviceOpen(_))));

        let mut camera = TestPatternGrabber::bars(0, 0, 30);
        let frame = camera.grab(Duration::from_millis(100)).unwrap().unwrap();
        assert_eq!((frame.width(), frame.height()), (1, 1));
        camera.grab(Duration::from_millis(100)).unwrap();
    }

    #[test]
    fn test_pacing_respects_timeout() {
        let mut camera = TestPatternGrabber::solid(8, 8, 2, Color::RED);
        assert!(camera.grab(Duration::from_millis(10)).unwrap().is_some());
        
        // Next frame is due in 500ms, so a short wait comes back empty
        let start = Instant::now();
        assert!(camera.grab(Duration::from_millis(20)).unwrap().is_none());
        assert!(start.elapsed() < Duration::from_millis(400));
    }
}
