//! Frame display and operator commands
//!
//! The loops only see the [`Display`] trait: show a frame, then poll for a
//! command with a bounded wait. Commands come from single keys typed on
//! the console (headless) or pressed in the preview window, and Ctrl+C is
//! turned into [`Command::Quit`].

pub mod headless;
#[cfg(feature = "window")]
pub mod window;

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::io;
use std::time::Duration;

use crate::error::DisplayError;
use crate::video::frame::Frame;

pub use headless::HeadlessDisplay;
#[cfg(feature = "window")]
pub use window::WindowDisplay;

/// Operator command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    ToggleRecording,
    Stats,
}

impl Command {
    /// Map a key to a command (`q`, `r`, `s`; case-insensitive)
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'q' => Some(Command::Quit),
            'r' => Some(Command::ToggleRecording),
            's' => Some(Command::Stats),
            _ => None,
        }
    }

    pub fn key(self) -> char {
        match self {
            Command::Quit => 'q',
            Command::ToggleRecording => 'r',
            Command::Stats => 's',
        }
    }

    fn label(self) -> &'static str {
        match self {
            Command::Quit => "quit",
            Command::ToggleRecording => "record",
            Command::Stats => "stats",
        }
    }
}

/// Keys the multi-camera receiver understands
pub const GRID_COMMANDS: &[Command] = &[Command::ToggleRecording, Command::Stats, Command::Quit];

/// Keys the single-camera tools understand
pub const CAPTURE_COMMANDS: &[Command] = &[Command::Quit];

/// `r = record, s = stats, q = quit` for the given commands
pub fn command_hint(accepted: &[Command]) -> String {
    accepted
        .iter()
        .map(|c| format!("{} = {}", c.key(), c.label()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Somewhere to show frames and read commands from
pub trait Display {
    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError>;

    /// Wait up to `wait` for a command
    fn poll_command(&mut self, wait: Duration) -> Option<Command>;

    fn close(&mut self) {}
}

/// Channel feeding commands into a display
pub fn command_channel() -> (Sender<Command>, Receiver<Command>) {
    unbounded()
}

/// Turn Ctrl+C into `Command::Quit`
///
/// A second Ctrl+C exits the process immediately.
pub fn spawn_ctrl_c(commands: Sender<Command>) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                tracing::info!("Interrupted, shutting down...");
                let _ = commands.send(Command::Quit);

                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Second interrupt, exiting now");
                    std::process::exit(130);
                }
            });
        })?;

    Ok(())
}

/// Build the display for this build: a window when available, else headless
pub fn open_display(title: &str, commands: Receiver<Command>, use_window: bool) -> Result<Box<dyn Display>, DisplayError> {
    #[cfg(feature = "window")]
    {
        if use_window {
            return Ok(Box::new(WindowDisplay::new(title, commands)));
        }
    }

    if use_window {
        tracing::warn!("Built without the `window` feature, running headless");
    }
    Ok(Box::new(HeadlessDisplay::new(title, commands)))
}
