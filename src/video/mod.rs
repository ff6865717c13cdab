//! Video frames and the sources that produce them

pub mod device;
pub mod frame;
pub mod registry;
pub mod source;

pub use device::{list_cameras, open_camera, CameraInfo, TestPatternGrabber};
pub use frame::{Color, Frame, PixelFormat};
pub use registry::SourceRegistry;
pub use source::{FrameGrabber, FrameSource, SourceStats};
