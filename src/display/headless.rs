//! Console display: frames are counted, commands are typed

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::io::BufRead;
use std::time::Duration;

use crate::display::{command_hint, Command, Display};
use crate::error::DisplayError;
use crate::video::frame::Frame;

/// Display without a window
///
/// Commands arrive on a channel; [`HeadlessDisplay::attach_stdin`] feeds it
/// from console lines (first character of each line).
pub struct HeadlessDisplay {
    title: String,
    commands: Receiver<Command>,
    frames_shown: u64,
    last_size: Option<(u32, u32)>,
}

impl HeadlessDisplay {
    pub fn new(title: &str, commands: Receiver<Command>) -> Self {
        Self {
            title: title.to_string(),
            commands,
            frames_shown: 0,
            last_size: None,
        }
    }

    /// Forward console input to `commands` from a background thread
    ///
    /// Only keys for `accepted` commands are forwarded; anything else
    /// prints the keys that are.
    pub fn attach_stdin(commands: Sender<Command>, accepted: &'static [Command]) -> std::io::Result<()> {
        std::thread::Builder::new()
            .name("stdin-commands".to_string())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    match parse_line(&line, accepted) {
                        Ok(Some(command)) => {
                            if commands.send(command).is_err() {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(key) => println!("Unknown command '{}' ({})", key, command_hint(accepted)),
                    }
                }
            })?;
        Ok(())
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }
}

/// Command for one console line; `Err` carries a key that is not accepted
fn parse_line(line: &str, accepted: &[Command]) -> Result<Option<Command>, char> {
    let Some(key) = line.trim().chars().next() else {
        return Ok(None);
    };
    match Command::from_key(key) {
        Some(command) if accepted.contains(&command) => Ok(Some(command)),
        _ => Err(key),
    }
}

impl Display for HeadlessDisplay {
    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        let size = (frame.width(), frame.height());
        if self.last_size != Some(size) {
            tracing::debug!("{}: {}x{}", self.title, size.0, size.1);
            self.last_size = Some(size);
        }
        self.frames_shown += 1;
        Ok(())
    }

    fn poll_command(&mut self, wait: Duration) -> Option<Command> {
        match self.commands.recv_timeout(wait) {
            Ok(command) => Some(command),
            Err(RecvTimeoutError::Timeout) => None,
            // Every sender gone: nobody can ask us to quit any more
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(wait);
                None
            }
        }
    }
}
