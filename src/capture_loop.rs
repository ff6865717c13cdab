//! Single-camera loop shared by the transmitter and the local saver
//!
//! Runs on the calling thread: grab with a bounded wait, stamp the overlay,
//! hand the frame to the sink, show a small preview and check for quit.
//! Device handles that must stay on one thread are fine here since nothing
//! is moved to a worker.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::config::{DisplayConfig, RecordingConfig};
use crate::display::{Command, Display};
use crate::error::Result;
use crate::network::sender::VideoSender;
use crate::overlay::render_overlay;
use crate::recording::{RecordingSession, WriterFactory};
use crate::timecode::TimecodeListener;
use crate::video::frame::Frame;
use crate::video::source::FrameGrabber;

/// Destination for overlaid frames
pub trait FrameSink {
    fn push(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and release the destination
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    fn describe(&self) -> String;
}

impl FrameSink for VideoSender {
    fn push(&mut self, frame: &Frame) -> Result<()> {
        self.send_frame(frame)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.stop();
        Ok(())
    }

    fn describe(&self) -> String {
        format!("network '{}' on {}", self.name(), self.local_addr())
    }
}

/// Records one source into a session opened on its first frame
pub struct SessionSink {
    name: String,
    root: PathBuf,
    extension: String,
    fps: u32,
    factory: Box<dyn WriterFactory>,
    session: Option<RecordingSession>,
}

impl SessionSink {
    pub fn new(name: &str, config: &RecordingConfig, fps: u32, factory: Box<dyn WriterFactory>) -> Self {
        Self {
            name: name.to_string(),
            root: config.root_dir.clone(),
            extension: config.container.clone(),
            fps,
            factory,
            session: None,
        }
    }

    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }
}

impl FrameSink for SessionSink {
    fn push(&mut self, frame: &Frame) -> Result<()> {
        if self.session.is_none() {
            let size = Some((frame.width(), frame.height()));
            self.session = Some(RecordingSession::start(
                &self.root,
                &self.extension,
                self.fps,
                self.factory.as_ref(),
                [(self.name.as_str(), size)],
            )?);
        }
        if let Some(session) = self.session.as_mut() {
            session.write(&self.name, frame);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            let summary = session.stop()?;
            tracing::info!("Saved {} frames to {}", summary.total_frames, summary.dir.display());
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file in {}", self.root.display())
    }
}

/// Loop settings
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Stamp the measured rate into the overlay
    pub show_fps: bool,
    pub preview_size: (u32, u32),
    pub read_timeout: Duration,
    pub stats_interval_frames: u64,
    /// Command poll wait per iteration
    pub refresh: Duration,
}

impl CaptureOptions {
    pub fn from_config(display: &DisplayConfig, read_timeout: Duration, show_fps: bool) -> Self {
        Self {
            show_fps,
            preview_size: (display.preview_width, display.preview_height),
            read_timeout,
            stats_interval_frames: display.stats_interval_frames.max(1),
            refresh: display.refresh(),
        }
    }
}

/// Counters reported when the loop ends
#[derive(Debug, Clone, Default)]
pub struct CaptureStats {
    pub frames: u64,
    pub read_failures: u64,
    pub sink_errors: u64,
    pub fps: f64,
}

/// Camera → overlay → sink loop
pub struct CaptureLoop {
    name: String,
    grabber: Box<dyn FrameGrabber>,
    timecode: TimecodeListener,
    sink: Box<dyn FrameSink>,
    display: Box<dyn Display>,
    options: CaptureOptions,
    stats: CaptureStats,
    started: Instant,
}

impl CaptureLoop {
    pub fn new(
        name: &str,
        grabber: Box<dyn FrameGrabber>,
        timecode: TimecodeListener,
        sink: Box<dyn FrameSink>,
        display: Box<dyn Display>,
        options: CaptureOptions,
    ) -> Self {
        Self {
            name: name.to_string(),
            grabber,
            timecode,
            sink,
            display,
            options,
            stats: CaptureStats::default(),
            started: Instant::now(),
        }
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    /// One iteration without the command poll
    ///
    /// Returns the overlaid frame, or `None` when the camera had nothing
    /// (a failed read is logged and counted).
    pub fn step(&mut self) -> Result<Option<Frame>> {
        let frame = match self.grabber.grab(self.options.read_timeout) {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(None),
            Err(e) => {
                self.stats.read_failures += 1;
                tracing::warn!("Failed to read frame from camera: {}", e);
                return Ok(None);
            }
        };

        let timecode = self.timecode.get();
        let fps = self.options.show_fps.then_some(self.stats.fps);
        let frame = render_overlay(&frame, &self.name, &timecode, fps)?;

        if let Err(e) = self.sink.push(&frame) {
            self.stats.sink_errors += 1;
            tracing::warn!("Failed to deliver frame: {}", e);
        }
        self.stats.frames += 1;

        let (preview_w, preview_h) = self.options.preview_size;
        self.display.show(&frame.resize(preview_w, preview_h)?)?;

        if self.stats.frames % self.options.stats_interval_frames == 0 {
            let elapsed = self.started.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                self.stats.fps = self.stats.frames as f64 / elapsed;
            }
            tracing::info!("Frames: {}, FPS: {:.1}, TC: {}", self.stats.frames, self.stats.fps, timecode);
        }

        Ok(Some(frame))
    }

    /// Run until quit, then release everything
    pub fn run(mut self) -> Result<CaptureStats> {
        self.timecode.start()?;

        tracing::info!("Showing '{}' via {}", self.name, self.sink.describe());
        println!("Press 'q' to quit\n");

        self.started = Instant::now();
        let result = loop {
            if let Err(e) = self.step() {
                break Err(e);
            }
            if let Some(Command::Quit) = self.display.poll_command(self.options.refresh) {
                break Ok(());
            }
        };

        self.shutdown();
        result.map(|()| self.stats.clone())
    }

    fn shutdown(&mut self) {
        self.timecode.stop();
        self.grabber.release();
        if let Err(e) = self.sink.finish() {
            tracing::error!("Failed to close {}: {}", self.sink.describe(), e);
        }
        self.display.close();
        tracing::info!("Camera '{}' stopped after {} frames", self.name, self.stats.frames);
    }
}
