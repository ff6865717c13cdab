//! Multi-Camera Receiver Application
//!
//! Subscribes to named LAN streams, shows them in a grid and records each
//! one to its own file on demand.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lan_camera_relay::{
    compositor::CompositorLoop,
    config::AppConfig,
    console,
    display::{command_channel, open_display, spawn_ctrl_c, HeadlessDisplay, GRID_COMMANDS},
    network::{NetworkGrabber, SourceFinder},
    recording::FfmpegFactory,
    video::{FrameSource, SourceRegistry},
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
    tracing::info!("Starting Multi-Camera Receiver");
    
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;
    
    // Transport must come up or nothing else can work
    let mut finder = SourceFinder::start(&config.network).context("Failed to start source discovery")?;
    
    let mut out = std::io::stdout();
    console::print_banner(&mut out, "MULTI-CAMERA RECEIVER")?;
    
    // Give publishers one announce round before listing them
    std::thread::sleep(config.network.announce_interval());
    
    let names = {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        console::prompt_source_names(&mut input, &mut out, &finder.sources())?
    };
    if names.is_empty() {
        return Ok(());
    }
    
    println!("\nLooking for sources: {}", names.join(", "));
    println!("\nConnecting to sources...");
    
    let network = config.network.clone();
    let registry = SourceRegistry::connect_all(&names, |name| {
        let grabber = NetworkGrabber::connect(name, &finder, &network)?;
        Ok(FrameSource::new(name, Box::new(grabber), network.read_timeout()))
    });
    
    if registry.is_empty() {
        println!("No sources connected!");
        return Ok(());
    }
    println!("\nConnected to {} sources", registry.len());
    
    // Let receivers stabilize
    std::thread::sleep(config.display.stabilize());
    
    let factory = FfmpegFactory::new(&config.recording);
    if !factory.is_available() {
        tracing::warn!(
            "'{}' not found; recording will fail until it is installed",
            config.recording.ffmpeg_path
        );
    }
    
    let (command_tx, command_rx) = command_channel();
    spawn_ctrl_c(command_tx.clone())?;
    HeadlessDisplay::attach_stdin(command_tx, GRID_COMMANDS)?;
    let display = open_display(&config.display.grid_title, command_rx, config.display.window)?;
    
    let compositor = CompositorLoop::new(
        registry,
        display,
        Box::new(factory),
        config.recording.clone(),
        config.display.clone(),
    );
    let result = compositor.run();
    
    finder.stop();
    result?;
    Ok(())
}
