//! Native preview window

use crossbeam_channel::Receiver;
use minifb::{Key, KeyRepeat, Window, WindowOptions};
use std::time::Duration;

use crate::display::{Command, Display};
use crate::error::DisplayError;
use crate::video::frame::{Color, Frame, PixelFormat};

/// Window opened on the first frame and sized to it
pub struct WindowDisplay {
    title: String,
    window: Option<Window>,
    buffer: Vec<u32>,
    commands: Receiver<Command>,
}

impl WindowDisplay {
    pub fn new(title: &str, commands: Receiver<Command>) -> Self {
        Self {
            title: title.to_string(),
            window: None,
            buffer: Vec::new(),
            commands,
        }
    }
}

impl Display for WindowDisplay {
    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        let (width, height) = (frame.width() as usize, frame.height() as usize);

        if self.window.is_none() {
            let window = Window::new(&self.title, width, height, WindowOptions::default())
                .map_err(|e| DisplayError::WindowCreate(e.to_string()))?;
            self.window = Some(window);
        }

        let rgb = frame.to_format(PixelFormat::Rgb8);
        self.buffer.clear();
        self.buffer.extend(
            rgb.data()
                .chunks_exact(3)
                .map(|px| Color::new(px[0], px[1], px[2]).to_u32()),
        );

        if let Some(window) = self.window.as_mut() {
            window
                .update_with_buffer(&self.buffer, width, height)
                .map_err(|e| DisplayError::Update(e.to_string()))?;
        }
        Ok(())
    }

    fn poll_command(&mut self, wait: Duration) -> Option<Command> {
        if let Ok(command) = self.commands.try_recv() {
            return Some(command);
        }
        std::thread::sleep(wait);

        let window = self.window.as_mut()?;
        if !window.is_open() || window.is_key_down(Key::Escape) {
            return Some(Command::Quit);
        }
        window.update();

        window
            .get_keys_pressed(KeyRepeat::No)
            .into_iter()
            .find_map(|key| match key {
                Key::Q => Some(Command::Quit),
                Key::R => Some(Command::ToggleRecording),
                Key::S => Some(Command::Stats),
                _ => None,
            })
    }

    fn close(&mut self) {
        self.window = None;
    }
}
