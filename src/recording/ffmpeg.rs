//! Recording through an `ffmpeg` child process
//!
//! Raw frames are piped to ffmpeg's stdin and encoded to H.264. The child
//! is only spawned when the first frame arrives.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use crate::config::RecordingConfig;
use crate::error::RecordingError;
use crate::recording::{FrameWriter, WriterFactory, WriterSummary};
use crate::video::frame::{Frame, PixelFormat};

/// Encoder settings shared by every writer of a factory
#[derive(Debug, Clone)]
struct EncoderSettings {
    ffmpeg_path: String,
    codec: String,
    crf: u8,
}

/// Creates [`FfmpegWriter`]s
#[derive(Debug, Clone)]
pub struct FfmpegFactory {
    settings: EncoderSettings,
}

impl FfmpegFactory {
    pub fn new(config: &RecordingConfig) -> Self {
        Self {
            settings: EncoderSettings {
                ffmpeg_path: config.ffmpeg_path.clone(),
                codec: config.codec.clone(),
                crf: config.crf,
            },
        }
    }

    /// Whether the configured ffmpeg binary runs
    pub fn is_available(&self) -> bool {
        Command::new(&self.settings.ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

impl WriterFactory for FfmpegFactory {
    fn create(&self, path: &Path, width: u32, height: u32, fps: u32) -> Result<Box<dyn FrameWriter>, RecordingError> {
        Ok(Box::new(FfmpegWriter {
            path: path.to_path_buf(),
            width,
            height,
            fps,
            settings: self.settings.clone(),
            child: None,
            format: None,
            frames: 0,
        }))
    }
}

/// One output file fed by an ffmpeg child
pub struct FfmpegWriter {
    path: PathBuf,
    width: u32,
    height: u32,
    fps: u32,
    settings: EncoderSettings,
    child: Option<Child>,
    /// Input layout, fixed by the first frame
    format: Option<PixelFormat>,
    frames: u64,
}

impl FfmpegWriter {
    fn spawn(&self, format: PixelFormat) -> Result<Child, RecordingError> {
        let size = format!("{}x{}", self.width, self.height);
        let fps = self.fps.to_string();
        let crf = self.settings.crf.to_string();
        let gop = (self.fps * 2).to_string();

        let child = Command::new(&self.settings.ffmpeg_path)
            .args([
                "-y",
                "-loglevel",
                "error",
                "-nostats",
                "-f",
                "rawvideo",
                "-pixel_format",
                format.ffmpeg_name(),
                "-video_size",
                &size,
                "-framerate",
                &fps,
                "-i",
                "-",
                "-vf",
                "scale=trunc(iw/2)*2:trunc(ih/2)*2",
                "-c:v",
                &self.settings.codec,
                "-preset",
                "veryfast",
                "-pix_fmt",
                "yuv420p",
                "-crf",
                &crf,
                "-g",
                &gop,
            ])
            .arg(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RecordingError::WriterSpawn(format!("{}: {}", self.settings.ffmpeg_path, e)))?;

        tracing::info!(
            "Started FFmpeg encoder: {}x{} @ {}fps, pixel_format={}, output: {}",
            self.width,
            self.height,
            self.fps,
            format.ffmpeg_name(),
            self.path.display()
        );

        Ok(child)
    }
}

impl FrameWriter for FfmpegWriter {
    fn write(&mut self, frame: &Frame) -> Result<(), RecordingError> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(RecordingError::DimensionMismatch {
                expected_width: self.width,
                expected_height: self.height,
                width: frame.width(),
                height: frame.height(),
            });
        }

        if self.child.is_none() {
            let format = frame.format();
            self.child = Some(self.spawn(format)?);
            self.format = Some(format);
        }

        let converted;
        let frame = match self.format {
            Some(format) if format != frame.format() => {
                converted = frame.to_format(format);
                &converted
            }
            _ => frame,
        };

        let stdin = self
            .child
            .as_mut()
            .and_then(|child| child.stdin.as_mut())
            .ok_or_else(|| RecordingError::WriteFailed("encoder input closed".to_string()))?;
        stdin
            .write_all(frame.data())
            .map_err(|e| RecordingError::WriteFailed(format!("{}: {}", self.path.display(), e)))?;

        self.frames += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }

    fn finish(mut self: Box<Self>) -> Result<WriterSummary, RecordingError> {
        let Some(mut child) = self.child.take() else {
            return Ok(WriterSummary {
                path: self.path.clone(),
                frames: 0,
                created: false,
            });
        };

        // EOF on stdin lets ffmpeg write the trailer
        drop(child.stdin.take());
        let output = child
            .wait_with_output()
            .map_err(|e| RecordingError::FinalizeFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecordingError::FinalizeFailed(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        tracing::info!("FFmpeg finished: {} frames, output: {}", self.frames, self.path.display());

        Ok(WriterSummary {
            path: self.path.clone(),
            frames: self.frames,
            created: true,
        })
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            drop(child.stdin.take());
            let _ = child.wait();
        }
    }
}
