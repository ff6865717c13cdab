//! Camera Transmitter Application
//!
//! Captures one local camera, stamps name and OSC timecode onto every
//! frame and publishes the stream on the LAN.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lan_camera_relay::{
    capture_loop::{CaptureLoop, CaptureOptions},
    config::AppConfig,
    console,
    display::{command_channel, open_display, spawn_ctrl_c, HeadlessDisplay, CAPTURE_COMMANDS},
    network::VideoSender,
    timecode::TimecodeListener,
    video::{list_cameras, open_camera},
};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
    
    if let Err(e) = run() {
        tracing::error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

fn run() -> Result<()> {
    tracing::info!("Starting LAN Camera Transmitter");
    
    // Optional config path as first argument
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;
    let tool = &config.transmitter;
    
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut out = std::io::stdout();
    
    console::print_banner(&mut out, "CAMERA TRANSMITTER")?;
    let Some(name) = console::prompt_camera_name(&mut input, &mut out)? else {
        return Ok(());
    };
    
    println!("Detecting cameras...");
    let cameras = list_cameras(&tool.camera);
    let Some(camera_id) = console::select_camera(&mut input, &mut out, &cameras)? else {
        return Ok(());
    };
    if let Some(selected) = cameras.iter().find(|c| c.id == camera_id) {
        console::print_selection(
            &mut out,
            selected,
            &name,
            (tool.camera.width, tool.camera.height, tool.camera.fps),
        )?;
    }
    // Release the console before the stdin command reader takes it
    drop(input);
    
    let grabber = open_camera(camera_id, &tool.camera)
        .with_context(|| format!("Failed to open camera {}", camera_id))?;
    
    let sender = VideoSender::start(&name, &config.network).context("Failed to start network stream")?;
    tracing::info!("Stream '{}' started on {}", name, sender.local_addr());
    
    let timecode = TimecodeListener::new(tool.timecode.clone());
    
    let (command_tx, command_rx) = command_channel();
    spawn_ctrl_c(command_tx.clone())?;
    HeadlessDisplay::attach_stdin(command_tx, CAPTURE_COMMANDS)?;
    let display = open_display(&format!("Preview - {}", name), command_rx, config.display.window)?;
    
    let options = CaptureOptions::from_config(&config.display, config.network.read_timeout(), false);
    let stats = CaptureLoop::new(&name, grabber, timecode, Box::new(sender), display, options).run()?;
    
    tracing::info!(
        "Transmitter stopped: {} frames, {:.1} fps, {} read failures",
        stats.frames,
        stats.fps,
        stats.read_failures
    );
    Ok(())
}
