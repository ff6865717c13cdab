//! Multi-source monitoring loop
//!
//! Every iteration pulls the newest frame from each source, feeds the raw
//! frames to the recording session when one is active, builds the grid and
//! shows it. The loop never waits on a source: a source with nothing new
//! simply contributes its previous frame again, or nothing before its
//! first.

pub mod grid;

use std::time::Instant;

pub use grid::{compose_grid, layout_for, tile_size, GridLayout};

use crate::config::{DisplayConfig, RecordingConfig};
use crate::display::{Command, Display};
use crate::error::{RecordingError, Result};
use crate::recording::{RecordingSession, SessionSummary, WriterFactory};
use crate::video::frame::Frame;
use crate::video::registry::SourceRegistry;

/// Per-source numbers shown by the `s` command
#[derive(Debug, Clone, PartialEq)]
pub struct CompositorSourceStats {
    pub name: String,
    /// Iterations in which the source had a frame
    pub frames_polled: u64,
    /// Frames the acquisition thread received
    pub frames_acquired: u64,
    /// `frames_polled` over time since the loop started
    pub fps: f64,
}

/// Grid display plus recording state machine
pub struct CompositorLoop {
    registry: SourceRegistry,
    display: Box<dyn Display>,
    factory: Box<dyn WriterFactory>,
    recording: RecordingConfig,
    config: DisplayConfig,
    session: Option<RecordingSession>,
    /// Parallel to the registry order
    polled: Vec<u64>,
    started: Instant,
}

impl CompositorLoop {
    pub fn new(
        registry: SourceRegistry,
        display: Box<dyn Display>,
        factory: Box<dyn WriterFactory>,
        recording: RecordingConfig,
        config: DisplayConfig,
    ) -> Self {
        let polled = vec![0; registry.len()];
        Self {
            registry,
            display,
            factory,
            recording,
            config,
            session: None,
            polled,
            started: Instant::now(),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    /// One iteration: poll, record, compose, show
    ///
    /// Returns the grid that was shown, or `None` when no source has
    /// produced a frame yet.
    pub fn tick(&mut self) -> Result<Option<Frame>> {
        let mut frames: Vec<(String, Frame)> = Vec::with_capacity(self.registry.len());

        for (idx, source) in self.registry.iter().enumerate() {
            let Some(frame) = source.get_latest() else {
                continue;
            };
            self.polled[idx] += 1;

            if let Some(session) = self.session.as_mut() {
                session.write(source.name(), &frame);
            }
            frames.push((source.name().to_string(), frame));
        }

        let Some((_, first)) = frames.first() else {
            return Ok(None);
        };

        let tile = tile_size(first, self.config.downscale, self.config.tile_size);
        let named: Vec<(&str, &Frame)> = frames.iter().map(|(name, frame)| (name.as_str(), frame)).collect();
        let grid = compose_grid(&named, layout_for(named.len()), tile, self.is_recording())?;

        self.display.show(&grid)?;
        Ok(Some(grid))
    }

    /// Apply a command; returns `false` when the loop should end
    pub fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Quit => false,
            Command::ToggleRecording => {
                if let Err(e) = self.toggle_recording() {
                    tracing::error!("Recording toggle failed: {}", e);
                }
                true
            }
            Command::Stats => {
                self.print_stats();
                true
            }
        }
    }

    /// Start a session if idle, stop the current one otherwise
    pub fn toggle_recording(&mut self) -> std::result::Result<Option<SessionSummary>, RecordingError> {
        match self.session.take() {
            Some(session) => session.stop().map(Some),
            None => {
                let sizes: Vec<(String, Option<(u32, u32)>)> = self
                    .registry
                    .iter()
                    .map(|source| {
                        let size = source.get_latest().map(|f| (f.width(), f.height()));
                        (source.name().to_string(), size)
                    })
                    .collect();

                let session = RecordingSession::start(
                    &self.recording.root_dir,
                    &self.recording.container,
                    self.recording.fps,
                    self.factory.as_ref(),
                    sizes.iter().map(|(name, size)| (name.as_str(), *size)),
                )?;
                self.session = Some(session);
                Ok(None)
            }
        }
    }

    pub fn stats(&self) -> Vec<CompositorSourceStats> {
        let elapsed = self.started.elapsed().as_secs_f64();
        self.registry
            .iter()
            .zip(&self.polled)
            .map(|(source, &polled)| CompositorSourceStats {
                name: source.name().to_string(),
                frames_polled: polled,
                frames_acquired: source.stats().frames_acquired,
                fps: if elapsed > 0.0 { polled as f64 / elapsed } else { 0.0 },
            })
            .collect()
    }

    pub fn print_stats(&self) {
        println!("\nStatistics:");
        for stats in self.stats() {
            println!(
                "  {}: {} frames ({} received), {:.1} fps",
                stats.name, stats.frames_polled, stats.frames_acquired, stats.fps
            );
        }
    }

    /// Run until `q` or Ctrl+C, then shut down
    pub fn run(mut self) -> Result<()> {
        println!("\nControls:");
        println!("  'r' - Start/Stop recording");
        println!("  's' - Show statistics");
        println!("  'q' - Quit");

        self.started = Instant::now();
        let refresh = self.config.refresh();

        let result = loop {
            if let Err(e) = self.tick() {
                break Err(e);
            }
            if let Some(command) = self.display.poll_command(refresh) {
                if !self.handle(command) {
                    break Ok(());
                }
            }
        };

        self.shutdown();
        result
    }

    /// Stop any session, then every source
    pub fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.stop() {
                tracing::error!("Failed to finish recording: {}", e);
            }
        }
        self.registry.stop_all(self.config.stop_timeout());
        self.display.close();
        tracing::info!("Receiver stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{command_channel, HeadlessDisplay};
    use crate::recording::{FrameWriter, WriterSummary};
    use crate::video::device::TestPatternGrabber;
    use crate::video::frame::{Color, PixelFormat};
    use crate::video::source::FrameSource;
    use parking_lot::Mutex;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct CountingFactory {
        writes: Arc<Mutex<Vec<String>>>,
    }

    struct CountingWriter {
        name: String,
        writes: Arc<Mutex<Vec<String>>>,
        count: u64,
    }

    impl WriterFactory for CountingFactory {
        fn create(&self, path: &Path, _: u32, _: u32, _: u32) -> std::result::Result<Box<dyn FrameWriter>, RecordingError> {
            Ok(Box::new(CountingWriter {
                name: path.file_stem().unwrap().to_string_lossy().to_string(),
                writes: self.writes.clone(),
                count: 0,
            }))
        }
    }

    impl FrameWriter for CountingWriter {
        fn write(&mut self, frame: &Frame) -> std::result::Result<(), RecordingError> {
            // Raw frames: no overlay band
            assert_eq!(frame.pixel(frame.width() / 2, 2), frame.pixel(frame.width() / 2, frame.height() - 1));
            self.writes.lock().push(self.name.clone());
            self.count += 1;
            Ok(())
        }

        fn frames_written(&self) -> u64 {
            self.count
        }

        fn finish(self: Box<Self>) -> std::result::Result<WriterSummary, RecordingError> {
            Ok(WriterSummary {
                path: self.name.clone().into(),
                frames: self.count,
                created: false,
            })
        }
    }

    fn solid_source(name: &str, color: Color, fps: u32) -> FrameSource {
        FrameSource::new(
            name,
            Box::new(TestPatternGrabber::solid(160, 90, fps, color)),
            Duration::from_millis(50),
        )
    }

    fn compositor(names: &[(&str, Color, u32)], root: &Path, factory: CountingFactory) -> CompositorLoop {
        let mut registry = SourceRegistry::new();
        for (name, color, fps) in names {
            let mut source = solid_source(name, *color, *fps);
            source.start().unwrap();
            registry.insert(source).unwrap();
        }
        let (_tx, rx) = command_channel();
        CompositorLoop::new(
            registry,
            Box::new(HeadlessDisplay::new("test", rx)),
            Box::new(factory),
            RecordingConfig {
                root_dir: root.to_path_buf(),
                ..Default::default()
            },
            DisplayConfig::default(),
        )
    }

    fn wait_for_frames(compositor: &CompositorLoop) {
        let start = Instant::now();
        while compositor.registry.iter().any(|s| s.get_latest().is_none()) {
            assert!(start.elapsed() < Duration::from_secs(3), "sources never produced frames");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_two_sources_fill_their_halves() {
        let root = tempfile::tempdir().unwrap();
        let blue = Color::new(0, 0, 255);
        let green = Color::new(0, 255, 0);
        let mut compositor = compositor(
            &[("left", blue, 30), ("right", green, 60)],
            root.path(),
            CountingFactory::default(),
        );
        wait_for_frames(&compositor);

        let grid = compositor.tick().unwrap().unwrap();
        assert_eq!((grid.width(), grid.height()), (160, 45));
        assert_eq!(grid.format(), PixelFormat::Rgb8);
        assert_eq!(grid.pixel(40, 22), blue);
        assert_eq!(grid.pixel(120, 22), green);

        let stats = compositor.stats();
        assert_eq!(stats.len(), 2);
        assert!(stats.iter().all(|s| s.frames_polled == 1));
        compositor.shutdown();
    }

    #[test]
    fn test_no_frames_yet() {
        let root = tempfile::tempdir().unwrap();
        let mut compositor = compositor(&[], root.path(), CountingFactory::default());
        assert!(compositor.tick().unwrap().is_none());
    }

    #[test]
    fn test_recording_writes_raw_frames() {
        let root = tempfile::tempdir().unwrap();
        let factory = CountingFactory::default();
        let mut compositor = compositor(
            &[("a", Color::WHITE, 60), ("b", Color::YELLOW, 60)],
            root.path(),
            factory.clone(),
        );
        wait_for_frames(&compositor);

        assert!(compositor.handle(Command::ToggleRecording));
        assert!(compositor.is_recording());
        assert_eq!(compositor.session().unwrap().writer_count(), 2);

        let grid = compositor.tick().unwrap().unwrap();
        assert_eq!(grid.pixel(40, 40), Color::RED);
        compositor.tick().unwrap();

        let mut writes = factory.writes.lock().clone();
        writes.sort();
        assert_eq!(writes, vec!["a", "a", "b", "b"]);

        assert!(compositor.handle(Command::ToggleRecording));
        assert!(!compositor.is_recording());
        assert!(compositor.handle(Command::Stats));
        assert!(!compositor.handle(Command::Quit));
        compositor.shutdown();
    }

    #[test]
    fn test_run_quits_on_command() {
        let root = tempfile::tempdir().unwrap();
        let mut registry = SourceRegistry::new();
        let mut source = solid_source("only", Color::WHITE, 60);
        source.start().unwrap();
        registry.insert(source).unwrap();

        let (tx, rx) = command_channel();
        let compositor = CompositorLoop::new(
            registry,
            Box::new(HeadlessDisplay::new("test", rx)),
            Box::new(CountingFactory::default()),
            RecordingConfig {
                root_dir: root.path().to_path_buf(),
                ..Default::default()
            },
            DisplayConfig::default(),
        );

        tx.send(Command::ToggleRecording).unwrap();
        tx.send(Command::Quit).unwrap();
        let start = Instant::now();
        compositor.run().unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
