//! Per-source recording
//!
//! A [`RecordingSession`] owns one [`FrameWriter`] per source under a
//! timestamped directory. Writers come from a [`WriterFactory`] so the
//! session logic does not depend on ffmpeg being installed.

pub mod ffmpeg;
pub mod session;

use std::path::{Path, PathBuf};

use crate::error::RecordingError;
use crate::video::frame::Frame;

pub use ffmpeg::{FfmpegFactory, FfmpegWriter};
pub use session::{RecordingSession, SessionManifest, SessionSummary, SourceEntry};

/// Sink for one source's frames at a fixed size and rate
pub trait FrameWriter: Send {
    /// Append a frame; its size must match the writer's
    fn write(&mut self, frame: &Frame) -> Result<(), RecordingError>;

    fn frames_written(&self) -> u64;

    /// Flush and close the output
    fn finish(self: Box<Self>) -> Result<WriterSummary, RecordingError>;
}

/// Opens writers for a session
pub trait WriterFactory {
    fn create(&self, path: &Path, width: u32, height: u32, fps: u32) -> Result<Box<dyn FrameWriter>, RecordingError>;
}

/// Result of closing a writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterSummary {
    pub path: PathBuf,
    pub frames: u64,
    /// Whether an output file was produced
    pub created: bool,
}

#[cfg(test)]
pub(crate) mod testing {
    use parking_lot::Mutex;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use super::{FrameWriter, WriterFactory, WriterSummary};
    use crate::error::RecordingError;
    use crate::video::frame::Frame;

    /// Factory whose writers keep frames in memory
    ///
    /// A writer that saw at least one frame leaves a small placeholder file
    /// behind on `finish`, like a real encoder would.
    #[derive(Clone, Default)]
    pub struct MemoryFactory {
        pub created: Arc<Mutex<Vec<(PathBuf, u32, u32, u32)>>>,
        pub frames: Arc<Mutex<Vec<(PathBuf, Frame)>>>,
        /// Refuse to create writers whose path contains this
        pub fail_for: Option<String>,
    }

    struct MemoryWriter {
        path: PathBuf,
        frames: Arc<Mutex<Vec<(PathBuf, Frame)>>>,
        count: u64,
    }

    impl WriterFactory for MemoryFactory {
        fn create(&self, path: &Path, width: u32, height: u32, fps: u32) -> Result<Box<dyn FrameWriter>, RecordingError> {
            if let Some(fail) = &self.fail_for {
                if path.to_string_lossy().contains(fail.as_str()) {
                    return Err(RecordingError::WriterSpawn("refused".to_string()));
                }
            }
            self.created.lock().push((path.to_path_buf(), width, height, fps));
            Ok(Box::new(MemoryWriter {
                path: path.to_path_buf(),
                frames: self.frames.clone(),
                count: 0,
            }))
        }
    }

    impl FrameWriter for MemoryWriter {
        fn write(&mut self, frame: &Frame) -> Result<(), RecordingError> {
            self.frames.lock().push((self.path.clone(), frame.clone()));
            self.count += 1;
            Ok(())
        }

        fn frames_written(&self) -> u64 {
            self.count
        }

        fn finish(self: Box<Self>) -> Result<WriterSummary, RecordingError> {
            if self.count > 0 {
                std::fs::write(&self.path, b"video").map_err(|e| RecordingError::FinalizeFailed(e.to_string()))?;
            }
            Ok(WriterSummary {
                path: self.path.clone(),
                frames: self.count,
                created: self.count > 0,
            })
        }
    }
}
